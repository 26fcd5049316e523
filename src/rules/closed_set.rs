//! Closed-set rewrites: drop values from a literal list such as `z.enum([...])`.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::rules::matcher::{Hit, Matcher, RegexFlags};
use crate::rules::replacement::{Replacement, Transform};

/// Removes named values from `call([...])` literal lists and rewrites
/// `|| '<removed>'` fallbacks to `default`.
///
/// Only lists that mention a removed value are touched. Such a list must
/// consist of quoted literals; anything else fails the rule for that file.
/// Surviving elements keep their original text and separators.
///
/// Without `fallback_context`, every `|| '<removed>'` in every scanned file
/// is rewritten, whatever expression sits before the `||`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedSetRewrite {
    /// Callee written before the list, e.g. `z.enum`.
    pub call: String,
    pub remove: Vec<String>,
    /// Replacement value for `|| '<removed>'` fallbacks.
    #[serde(default)]
    pub default: Option<String>,
    /// Text that replaces the whole call when every value is removed.
    #[serde(default)]
    pub empty_replacement: Option<String>,
    /// Regex that must directly precede `||` for a fallback to be rewritten,
    /// e.g. `company_logo:\s*initialData\?\.company_logo`.
    #[serde(default)]
    pub fallback_context: Option<String>,
}

impl ClosedSetRewrite {
    /// Pattern for both the list form and the fallback form.
    pub fn pattern(&self) -> String {
        let removed = self
            .remove
            .iter()
            .map(|value| regex::escape(value))
            .collect::<Vec<_>>()
            .join("|");
        let anchor = if self.call.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
            r"\b"
        } else {
            ""
        };
        let list = format!(
            r#"{anchor}(?P<call>{})\(\s*\[(?P<items>[^\[\]]*['"](?:{removed})['"][^\[\]]*)\](?P<rest>[^()]*)\)"#,
            regex::escape(&self.call)
        );
        if self.default.is_none() {
            return list;
        }
        let context = self
            .fallback_context
            .as_deref()
            .map(|ctx| format!(r"(?:{ctx})\s*"))
            .unwrap_or_default();
        format!(r#"{list}|(?P<or>{context}\|\|\s*)(?P<dq>['"])(?:{removed})['"]"#)
    }

    /// Compile into a matcher and replacement.
    pub fn build(&self) -> Result<(Matcher, Replacement), String> {
        if self.call.trim().is_empty() {
            return Err("closed-set rewrite needs a `call`".to_string());
        }
        if self.remove.is_empty() || self.remove.iter().any(String::is_empty) {
            return Err("closed-set rewrite needs non-empty values to remove".to_string());
        }
        if self.fallback_context.is_some() && self.default.is_none() {
            return Err("closed-set `fallback_context` needs a `default`".to_string());
        }
        let matcher = Matcher::regex(&self.pattern(), RegexFlags::default())?;
        Ok((matcher, Replacement::Transform(std::sync::Arc::new(self.clone()))))
    }

    fn rewrite_list(&self, hit: &Hit<'_>, items: &str) -> Result<String, String> {
        let mut segments: Vec<&str> = items.split(',').collect();
        // Whatever follows a trailing comma, newline and indent included.
        let has_trailing =
            segments.len() > 1 && segments.last().is_some_and(|last| last.trim().is_empty());
        let trailing = if has_trailing { segments.pop() } else { None };
        let lead = segments.first().map_or("", |first| leading_space(first));

        let mut kept = Vec::new();
        for segment in segments {
            let element = segment.trim();
            if element.is_empty() {
                continue;
            }
            let Some(value) = parse_quoted(element) else {
                return Err(format!(
                    "non-literal element {element:?} in {} list",
                    self.call
                ));
            };
            if !self.remove.iter().any(|r| r == value) {
                kept.push(segment);
            }
        }

        if kept.is_empty() {
            return self.empty_replacement.clone().ok_or_else(|| {
                format!(
                    "every value of {:?} was removed and no empty_replacement is set",
                    hit.as_str()
                )
            });
        }

        let mut out = format!("{}([", hit.name("call").unwrap_or(&self.call));
        for (i, segment) in kept.iter().enumerate() {
            if i == 0 {
                out.push_str(lead);
                out.push_str(segment.trim_start());
            } else {
                out.push(',');
                out.push_str(segment);
            }
        }
        if let Some(trailing) = trailing {
            out.push(',');
            out.push_str(trailing);
        }
        out.push(']');
        out.push_str(hit.name("rest").unwrap_or(""));
        out.push(')');
        Ok(out)
    }
}

fn leading_space(segment: &str) -> &str {
    &segment[..segment.len() - segment.trim_start().len()]
}

impl Transform for ClosedSetRewrite {
    fn transform(&self, hit: &Hit<'_>) -> Result<String, String> {
        if let Some(items) = hit.name("items") {
            return self.rewrite_list(hit, items);
        }
        match (&self.default, hit.name("or"), hit.name("dq")) {
            (Some(default), Some(or), Some(dq)) => Ok(format!("{or}{dq}{default}{dq}")),
            _ => Ok(hit.as_str().to_string()),
        }
    }
}

/// Contents of a `'value'` / `"value"` literal.
fn parse_quoted(element: &str) -> Option<&str> {
    let q = element.chars().next()?;
    if q != '\'' && q != '"' {
        return None;
    }
    let inner = element.strip_prefix(q)?.strip_suffix(q)?;
    if inner.contains(q) {
        return None;
    }
    Some(inner)
}
