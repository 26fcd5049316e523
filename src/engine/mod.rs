//! The rewriting engine: walker, rewriter, deleter, report, orchestrator.

pub mod deleter;
pub mod diff;
pub mod orchestrator;
pub mod report;
pub mod rewriter;
pub mod walker;

pub use orchestrator::{Orchestrator, RunPhase, RunRequest, run};
