//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use source_rewriter::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, SrwError};

// Rules
pub use crate::rules::{
    ClosedSetRewrite, Hit, ImportRelocation, Matcher, RegexFlags, Replacement, Rule, RuleSet,
    RuleSpec, Transform,
};

// Engine
pub use crate::engine::deleter::DeletionSpec;
pub use crate::engine::report::RunSummary;
pub use crate::engine::rewriter::FileRecord;
pub use crate::engine::{Orchestrator, RunPhase, RunRequest, run};
