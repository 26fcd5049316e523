//! Rule model: matchers, replacements, templates, and ordered rule sets.

pub mod closed_set;
pub mod matcher;
pub mod replacement;
pub mod ruleset;
pub mod template;

pub use closed_set::ClosedSetRewrite;
pub use matcher::{Hit, Matcher, RegexFlags};
pub use replacement::{Replacement, ReplacementSpec, Transform};
pub use ruleset::{Rule, RuleDiagnostic, RuleSet, RuleSpec};
pub use template::ImportRelocation;
