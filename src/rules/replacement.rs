//! Replacements: the text-producing half of a rule.

#![allow(missing_docs)]

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::rules::matcher::Hit;

/// Function of a match, for rewrites a fixed string cannot express.
///
/// Returning `Err` marks the rule as failed for the file being rewritten.
pub trait Transform: Send + Sync {
    fn transform(&self, hit: &Hit<'_>) -> Result<String, String>;
}

impl<F> Transform for F
where
    F: Fn(&Hit<'_>) -> Result<String, String> + Send + Sync,
{
    fn transform(&self, hit: &Hit<'_>) -> Result<String, String> {
        self(hit)
    }
}

/// What a matched span is replaced with.
#[derive(Clone)]
pub enum Replacement {
    /// Inserted verbatim.
    Literal(String),
    /// `$1` / `${name}` expanded against the match's capture groups.
    Template(String),
    /// The matched text with every listed needle removed.
    Strip(Vec<String>),
    /// Computed from the match.
    Transform(Arc<dyn Transform>),
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            Self::Template(text) => f.debug_tuple("Template").field(text).finish(),
            Self::Strip(needles) => f.debug_tuple("Strip").field(needles).finish(),
            Self::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}

impl Replacement {
    /// Wrap a closure as a transform replacement.
    pub fn transform<F>(f: F) -> Self
    where
        F: Fn(&Hit<'_>) -> Result<String, String> + Send + Sync + 'static,
    {
        Self::Transform(Arc::new(f))
    }

    /// Whether rendering needs capture groups.
    pub const fn needs_captures(&self) -> bool {
        matches!(self, Self::Template(_))
    }

    /// Append the replacement for `hit` to `out`.
    pub fn render(&self, hit: &Hit<'_>, out: &mut String) -> Result<(), String> {
        match self {
            Self::Literal(text) => out.push_str(text),
            Self::Template(template) => {
                let caps = hit
                    .captures()
                    .ok_or_else(|| "template replacement needs capture groups".to_string())?;
                caps.expand(template, out);
            }
            Self::Strip(needles) => {
                let mut text = hit.as_str().to_string();
                for needle in needles.iter().filter(|n| !n.is_empty()) {
                    text = text.replace(needle.as_str(), "");
                }
                out.push_str(&text);
            }
            Self::Transform(transform) => out.push_str(&transform.transform(hit)?),
        }
        Ok(())
    }
}

/// Replacement as written in a rule file: plain text, or `{ strip = [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplacementSpec {
    Text(String),
    Strip { strip: Vec<String> },
}

impl Default for ReplacementSpec {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl ReplacementSpec {
    /// Build the runtime replacement; `expand` turns text into a template.
    pub fn build(&self, expand: bool) -> Replacement {
        match self {
            Self::Text(text) if expand => Replacement::Template(text.clone()),
            Self::Text(text) => Replacement::Literal(text.clone()),
            Self::Strip { strip } => Replacement::Strip(strip.clone()),
        }
    }
}
