//! Matchers: the span-finding half of a rule.
//!
//! Every matcher is stateless and reports non-overlapping spans in document
//! order. Structural matchers (`Block`, `Marked`) are always bounded: a block
//! ends at its balanced closing delimiter or at the nearest end marker, never
//! at an arbitrary later point in the file.

#![allow(missing_docs)]

use std::fmt;
use std::ops::Range;

use memchr::memmem;
use regex::{Captures, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Compile-time switches for regex-backed matchers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegexFlags {
    /// `(?i)`: letters match regardless of case.
    pub case_insensitive: bool,
    /// `(?m)`: `^` and `$` match at line boundaries.
    pub multi_line: bool,
    /// `(?s)`: `.` also matches `\n`.
    pub dot_matches_new_line: bool,
}

impl RegexFlags {
    /// Compile `pattern` with these flags.
    ///
    /// Patterns that match the empty string are rejected: they would fire at
    /// every position of every file. Patterns that only match at zero width
    /// inside text (`\b`) get past this check and fail in [`Matcher::find_all`].
    pub fn compile(self, pattern: &str) -> Result<Regex, String> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(self.case_insensitive)
            .multi_line(self.multi_line)
            .dot_matches_new_line(self.dot_matches_new_line)
            .build()
            .map_err(|err| err.to_string())?;
        if regex.is_match("") {
            return Err(format!("pattern {pattern:?} matches the empty string"));
        }
        Ok(regex)
    }
}

/// One matched span plus the capture groups that located it, if any.
#[derive(Debug)]
pub struct Hit<'t> {
    haystack: &'t str,
    range: Range<usize>,
    captures: Option<Captures<'t>>,
}

impl<'t> Hit<'t> {
    /// Byte range of the span within the searched content.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// The matched text.
    pub fn as_str(&self) -> &'t str {
        &self.haystack[self.range.clone()]
    }

    /// Text of a numbered capture group of the locating pattern.
    pub fn get(&self, index: usize) -> Option<&'t str> {
        self.captures
            .as_ref()
            .and_then(|caps| caps.get(index))
            .map(|m| m.as_str())
    }

    /// Text of a named capture group of the locating pattern.
    pub fn name(&self, name: &str) -> Option<&'t str> {
        self.captures
            .as_ref()
            .and_then(|caps| caps.name(name))
            .map(|m| m.as_str())
    }

    pub(crate) fn captures(&self) -> Option<&Captures<'t>> {
        self.captures.as_ref()
    }
}

/// Exact substring matcher.
#[derive(Clone)]
pub struct LiteralMatcher {
    needle: String,
    finder: memmem::Finder<'static>,
}

impl fmt::Debug for LiteralMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiteralMatcher")
            .field("needle", &self.needle)
            .finish_non_exhaustive()
    }
}

/// Start pattern followed by a balanced delimiter pair.
#[derive(Debug, Clone)]
pub struct BlockMatcher {
    start: Regex,
    open: char,
    close: char,
}

/// Start pattern running to the nearest end pattern.
#[derive(Debug, Clone)]
pub struct MarkedMatcher {
    start: Regex,
    end: Regex,
}

/// The span-finding half of a rule.
#[derive(Debug, Clone)]
pub enum Matcher {
    Literal(LiteralMatcher),
    Regex(Regex),
    Block(BlockMatcher),
    Marked(MarkedMatcher),
}

impl Matcher {
    /// Exact, case-sensitive substring match.
    pub fn literal(needle: impl Into<String>) -> Result<Self, String> {
        let needle = needle.into();
        if needle.is_empty() {
            return Err("literal needle must not be empty".to_string());
        }
        let finder = memmem::Finder::new(needle.as_bytes()).into_owned();
        Ok(Self::Literal(LiteralMatcher { needle, finder }))
    }

    /// Regular-expression match.
    pub fn regex(pattern: &str, flags: RegexFlags) -> Result<Self, String> {
        flags.compile(pattern).map(Self::Regex)
    }

    /// `start` followed (after optional whitespace) by `open`, extended to the
    /// balanced `close`.
    pub fn block(start: &str, flags: RegexFlags, open: char, close: char) -> Result<Self, String> {
        if open == close {
            return Err(format!(
                "block delimiters must differ, got {open:?} for both"
            ));
        }
        let start = flags.compile(start)?;
        Ok(Self::Block(BlockMatcher { start, open, close }))
    }

    /// `start` through the nearest following `end`.
    pub fn marked(start: &str, end: &str, flags: RegexFlags) -> Result<Self, String> {
        Ok(Self::Marked(MarkedMatcher {
            start: flags.compile(start)?,
            end: flags.compile(end)?,
        }))
    }

    /// Short label used in listings.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::Regex(_) => "regex",
            Self::Block(_) => "block",
            Self::Marked(_) => "marked",
        }
    }

    /// Whether hits carry capture groups usable by template replacements.
    pub const fn has_captures(&self) -> bool {
        !matches!(self, Self::Literal(_))
    }

    /// Find every non-overlapping span in `haystack`, in order.
    ///
    /// An error means the matcher could not delimit a span it started; the
    /// caller treats the rule as non-matching for this content.
    pub fn find_all<'t>(&self, haystack: &'t str) -> Result<Vec<Hit<'t>>, String> {
        match self {
            Self::Literal(lit) => Ok(lit
                .finder
                .find_iter(haystack.as_bytes())
                .map(|start| Hit {
                    haystack,
                    range: start..start + lit.needle.len(),
                    captures: None,
                })
                .collect()),
            Self::Regex(regex) => {
                let mut hits = Vec::new();
                for caps in regex.captures_iter(haystack) {
                    let Some(range) = caps.get(0).map(|m| m.range()) else {
                        continue;
                    };
                    // Zero-width hits would fire again on every pass.
                    if range.is_empty() {
                        return Err(format!(
                            "pattern {:?} matched the empty string at byte {}",
                            regex.as_str(),
                            range.start
                        ));
                    }
                    hits.push(Hit {
                        haystack,
                        range,
                        captures: Some(caps),
                    });
                }
                Ok(hits)
            }
            Self::Block(block) => block.find_all(haystack),
            Self::Marked(marked) => Ok(marked.find_all(haystack)),
        }
    }
}

impl BlockMatcher {
    fn find_all<'t>(&self, haystack: &'t str) -> Result<Vec<Hit<'t>>, String> {
        let mut hits = Vec::new();
        let mut pos = 0;
        while pos <= haystack.len() {
            let Some(caps) = self.start.captures_at(haystack, pos) else {
                break;
            };
            let Some(head) = caps.get(0) else {
                break;
            };

            let after = &haystack[head.end()..];
            let body_offset = head.end() + (after.len() - after.trim_start().len());
            if !haystack[body_offset..].starts_with(self.open) {
                // Start marker without a block: not a match, keep looking.
                pos = next_boundary(haystack, head.start()).max(head.end());
                continue;
            }

            let Some(close_end) = balanced_end(haystack, body_offset, self.open, self.close) else {
                let line = haystack[..body_offset].matches('\n').count() + 1;
                return Err(format!(
                    "unterminated block: {:?} opened on line {line} has no matching {:?}",
                    self.open, self.close
                ));
            };

            hits.push(Hit {
                haystack,
                range: head.start()..close_end,
                captures: Some(caps),
            });
            pos = close_end;
        }
        Ok(hits)
    }
}

impl MarkedMatcher {
    fn find_all<'t>(&self, haystack: &'t str) -> Vec<Hit<'t>> {
        let mut hits = Vec::new();
        let mut pos = 0;
        while pos <= haystack.len() {
            let Some(caps) = self.start.captures_at(haystack, pos) else {
                break;
            };
            let Some(head) = caps.get(0) else {
                break;
            };
            // No end marker after this start means none after any later start either.
            let Some(tail) = self.end.find_at(haystack, head.end()) else {
                break;
            };
            hits.push(Hit {
                haystack,
                range: head.start()..tail.end(),
                captures: Some(caps),
            });
            pos = tail.end();
        }
        hits
    }
}

/// Byte offset just past the delimiter that balances the `open` at `from`.
fn balanced_end(haystack: &str, from: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, ch) in haystack[from..].char_indices() {
        if ch == open {
            depth += 1;
        } else if ch == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(from + offset + ch.len_utf8());
            }
        }
    }
    None
}

fn next_boundary(haystack: &str, from: usize) -> usize {
    haystack[from..]
        .chars()
        .next()
        .map_or(haystack.len() + 1, |ch| from + ch.len_utf8())
}
