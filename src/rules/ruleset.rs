//! Rules and ordered rule sets.

#![allow(missing_docs)]

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SrwError};
use crate::rules::closed_set::ClosedSetRewrite;
use crate::rules::matcher::{Matcher, RegexFlags};
use crate::rules::replacement::{Replacement, ReplacementSpec};
use crate::rules::template::ImportRelocation;

/// One labelled (matcher, replacement) pair.
#[derive(Debug, Clone)]
pub struct Rule {
    id: String,
    description: String,
    matcher: Matcher,
    replacement: Replacement,
}

impl Rule {
    pub fn new(id: impl Into<String>, matcher: Matcher, replacement: Replacement) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(SrwError::InvalidRule {
                rule_id: id,
                details: "rule id must not be empty".to_string(),
            });
        }
        if replacement.needs_captures() && !matcher.has_captures() {
            return Err(SrwError::InvalidRule {
                rule_id: id,
                details: format!(
                    "template replacement needs a capturing matcher, got {}",
                    matcher.kind()
                ),
            });
        }
        Ok(Self {
            id,
            description: String::new(),
            matcher,
            replacement,
        })
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub const fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub const fn replacement(&self) -> &Replacement {
        &self.replacement
    }

    /// Replace every match in `content`.
    ///
    /// `Ok(None)` when nothing matched. On `Err` the caller must keep
    /// `content` as it was: no partial output is produced.
    pub fn apply(&self, content: &str) -> std::result::Result<Option<(String, usize)>, String> {
        let hits = self.matcher.find_all(content)?;
        if hits.is_empty() {
            return Ok(None);
        }
        let mut out = String::with_capacity(content.len());
        let mut last = 0;
        for hit in &hits {
            let range = hit.range();
            out.push_str(&content[last..range.start]);
            self.replacement.render(hit, &mut out)?;
            last = range.end;
        }
        out.push_str(&content[last..]);
        Ok(Some((out, hits.len())))
    }
}

/// A rule that could not be compiled and is off for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleDiagnostic {
    pub rule_id: String,
    pub reason: String,
}

/// Ordered rules; rule `i + 1` sees the output of rule `i`.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    disabled: Vec<RuleDiagnostic>,
}

impl RuleSet {
    /// Build from already-compiled rules. Ids must be unique.
    pub fn new(rules: Vec<Rule>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for rule in &rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(SrwError::DuplicateRule {
                    rule_id: rule.id.clone(),
                });
            }
        }
        Ok(Self {
            rules,
            disabled: Vec::new(),
        })
    }

    /// Compile rule descriptions from configuration.
    ///
    /// Empty or duplicate ids are fatal. A rule that fails to compile is
    /// disabled and reported through [`RuleSet::disabled`]; the others run.
    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for spec in specs {
            let id = spec.id();
            if id.trim().is_empty() {
                return Err(SrwError::InvalidConfig {
                    details: format!("a {} rule has an empty id", spec.kind()),
                });
            }
            if !seen.insert(id) {
                return Err(SrwError::DuplicateRule {
                    rule_id: id.to_string(),
                });
            }
        }

        let mut set = Self::default();
        for spec in specs {
            match spec.build() {
                Ok(rule) => set.rules.push(rule),
                Err(err) => set.disabled.push(RuleDiagnostic {
                    rule_id: spec.id().to_string(),
                    reason: match err {
                        SrwError::InvalidRule { details, .. } => details,
                        other => other.to_string(),
                    },
                }),
            }
        }
        Ok(set)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    /// Rules that failed to compile.
    pub fn disabled(&self) -> &[RuleDiagnostic] {
        &self.disabled
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

fn default_delimiters() -> String {
    "{}".to_string()
}

/// A rule as written in the `[[rules]]` array of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    Literal {
        id: String,
        #[serde(default)]
        description: String,
        needle: String,
        #[serde(default)]
        replacement: ReplacementSpec,
    },
    Regex {
        id: String,
        #[serde(default)]
        description: String,
        pattern: String,
        #[serde(default)]
        flags: RegexFlags,
        #[serde(default)]
        replacement: ReplacementSpec,
        /// Expand `$1` / `${name}` in the replacement text.
        #[serde(default)]
        expand: bool,
    },
    Block {
        id: String,
        #[serde(default)]
        description: String,
        start: String,
        #[serde(default)]
        flags: RegexFlags,
        /// Opening and closing delimiter, e.g. `"{}"`.
        #[serde(default = "default_delimiters")]
        delimiters: String,
        #[serde(default)]
        replacement: ReplacementSpec,
        #[serde(default)]
        expand: bool,
    },
    Marked {
        id: String,
        #[serde(default)]
        description: String,
        start: String,
        end: String,
        #[serde(default)]
        flags: RegexFlags,
        #[serde(default)]
        replacement: ReplacementSpec,
        #[serde(default)]
        expand: bool,
    },
    ImportRelocation {
        id: String,
        #[serde(default)]
        description: String,
        #[serde(flatten)]
        relocation: ImportRelocation,
    },
    ClosedSet {
        id: String,
        #[serde(default)]
        description: String,
        #[serde(flatten)]
        rewrite: ClosedSetRewrite,
    },
}

impl RuleSpec {
    pub fn id(&self) -> &str {
        match self {
            Self::Literal { id, .. }
            | Self::Regex { id, .. }
            | Self::Block { id, .. }
            | Self::Marked { id, .. }
            | Self::ImportRelocation { id, .. }
            | Self::ClosedSet { id, .. } => id,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Literal { description, .. }
            | Self::Regex { description, .. }
            | Self::Block { description, .. }
            | Self::Marked { description, .. }
            | Self::ImportRelocation { description, .. }
            | Self::ClosedSet { description, .. } => description,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Literal { .. } => "literal",
            Self::Regex { .. } => "regex",
            Self::Block { .. } => "block",
            Self::Marked { .. } => "marked",
            Self::ImportRelocation { .. } => "import_relocation",
            Self::ClosedSet { .. } => "closed_set",
        }
    }

    /// Compile into a runnable rule.
    pub fn build(&self) -> Result<Rule> {
        let invalid = |details: String| SrwError::InvalidRule {
            rule_id: self.id().to_string(),
            details,
        };
        let (matcher, replacement) = match self {
            Self::Literal {
                needle,
                replacement,
                ..
            } => (
                Matcher::literal(needle.as_str()).map_err(invalid)?,
                replacement.build(false),
            ),
            Self::Regex {
                pattern,
                flags,
                replacement,
                expand,
                ..
            } => (
                Matcher::regex(pattern, *flags).map_err(invalid)?,
                replacement.build(*expand),
            ),
            Self::Block {
                start,
                flags,
                delimiters,
                replacement,
                expand,
                ..
            } => {
                let mut chars = delimiters.chars();
                let (Some(open), Some(close), None) = (chars.next(), chars.next(), chars.next())
                else {
                    return Err(invalid(format!(
                        "delimiters must be exactly two characters, got {delimiters:?}"
                    )));
                };
                (
                    Matcher::block(start, *flags, open, close).map_err(invalid)?,
                    replacement.build(*expand),
                )
            }
            Self::Marked {
                start,
                end,
                flags,
                replacement,
                expand,
                ..
            } => (
                Matcher::marked(start, end, *flags).map_err(invalid)?,
                replacement.build(*expand),
            ),
            Self::ImportRelocation { relocation, .. } => relocation.build().map_err(invalid)?,
            Self::ClosedSet { rewrite, .. } => rewrite.build().map_err(invalid)?,
        };
        Ok(Rule::new(self.id(), matcher, replacement)?.with_description(self.description()))
    }
}
