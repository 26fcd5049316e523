#![forbid(unsafe_code)]

//! Source Rewriter (srw): ordered pattern-driven rewrites across a source tree.
//!
//! A run has four steps:
//! 1. **Delete** files a rule set has made obsolete
//! 2. **Walk** the tree, pruning excluded directories at descent
//! 3. **Rewrite** each candidate file through the rule chain, writing only on change
//! 4. **Report** per-file and per-rule totals as a [`engine::report::RunSummary`]
//!
//! # Library usage
//!
//! ```rust,no_run
//! use source_rewriter::prelude::*;
//!
//! let rule = Rule::new(
//!     "a-to-b",
//!     Matcher::literal("from '../a/")?,
//!     Replacement::Literal("from '../b/".to_string()),
//! )?;
//! let request = RunRequest::new("src", RuleSet::new(vec![rule])?, [".ts"], ["node_modules"]);
//! let summary = run(request)?;
//! println!("{}", summary.render_human());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod prelude;

pub mod core;
pub mod engine;
pub mod logger;
pub mod rules;
