//! Import relocation: one rule for "module X moved to Y" across every depth.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::rules::matcher::{Matcher, RegexFlags};
use crate::rules::replacement::Replacement;

/// Rewrites relative import specifiers of the form `from '<../ x depth><from>'`.
///
/// The keyword spacing and quote style of every occurrence are preserved.
/// With `prefix` the target is a directory and only the leading part of the
/// specifier is rewritten; otherwise the whole specifier must equal `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRelocation {
    pub from: String,
    pub to: String,
    /// Parent-directory depths to match; empty accepts any relative prefix.
    #[serde(default)]
    pub depths: Vec<usize>,
    /// Depth to write instead of the matched one.
    #[serde(default)]
    pub to_depth: Option<usize>,
    #[serde(default)]
    pub prefix: bool,
}

impl ImportRelocation {
    /// Pattern matched by this relocation.
    pub fn pattern(&self) -> String {
        let dots = if self.depths.is_empty() {
            r"(?:\./|(?:\.\./)+)".to_string()
        } else {
            let alternatives: Vec<String> = self.depths.iter().map(|d| depth_pattern(*d)).collect();
            format!("(?:{})", alternatives.join("|"))
        };
        let end = if self.prefix {
            "(?P<end>/)"
        } else {
            r#"(?P<end>["'])"#
        };
        format!(
            r#"(?P<kw>\bfrom\s*)(?P<q>["'])(?P<dots>{dots}){}{end}"#,
            regex::escape(self.from.trim_end_matches('/'))
        )
    }

    /// Capture template producing the relocated specifier.
    pub fn template(&self) -> String {
        let dots = match self.to_depth {
            Some(0) => "./".to_string(),
            Some(depth) => "../".repeat(depth),
            None => "${dots}".to_string(),
        };
        let to = self.to.trim_end_matches('/').replace('$', "$$");
        format!("${{kw}}${{q}}{dots}{to}${{end}}")
    }

    /// Compile into a matcher and replacement.
    pub fn build(&self) -> Result<(Matcher, Replacement), String> {
        if self.from.trim_end_matches('/').is_empty() {
            return Err("import relocation needs a non-empty `from`".to_string());
        }
        if self.to.trim_end_matches('/').is_empty() {
            return Err("import relocation needs a non-empty `to`".to_string());
        }
        let matcher = Matcher::regex(&self.pattern(), RegexFlags::default())?;
        Ok((matcher, Replacement::Template(self.template())))
    }
}

fn depth_pattern(depth: usize) -> String {
    if depth == 0 {
        r"\./".to_string()
    } else {
        format!(r"(?:\.\./){{{depth}}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relocation(from: &str, to: &str, depths: &[usize]) -> ImportRelocation {
        ImportRelocation {
            from: from.to_string(),
            to: to.to_string(),
            depths: depths.to_vec(),
            to_depth: None,
            prefix: false,
        }
    }

    fn rewrite(rule: &ImportRelocation, text: &str) -> (String, usize) {
        let (matcher, replacement) = rule.build().unwrap();
        let hits = matcher.find_all(text).unwrap();
        let mut out = String::new();
        let mut last = 0;
        for hit in &hits {
            out.push_str(&text[last..hit.range().start]);
            replacement.render(hit, &mut out).unwrap();
            last = hit.range().end;
        }
        out.push_str(&text[last..]);
        (out, hits.len())
    }

    #[test]
    fn rewrites_every_listed_depth_and_keeps_quotes() {
        let rule = relocation("lib/api", "lib/api-client", &[1, 2, 3]);
        let text = "import a from '../lib/api';\nimport b from \"../../lib/api\";\nimport c from '../../../lib/api';\n";
        let (out, hits) = rewrite(&rule, text);
        assert_eq!(hits, 3);
        assert_eq!(
            out,
            "import a from '../lib/api-client';\nimport b from \"../../lib/api-client\";\nimport c from '../../../lib/api-client';\n"
        );
    }

    #[test]
    fn unlisted_depth_is_left_alone() {
        let rule = relocation("lib/api", "lib/api-client", &[1]);
        let (out, hits) = rewrite(&rule, "import a from '../../lib/api';");
        assert_eq!(hits, 0);
        assert_eq!(out, "import a from '../../lib/api';");
    }

    #[test]
    fn whole_specifier_does_not_match_longer_paths() {
        let rule = relocation("lib/api", "lib/api-client", &[]);
        let (_, hits) = rewrite(&rule, "import a from '../lib/api/extra';");
        assert_eq!(hits, 0);
    }

    #[test]
    fn prefix_mode_rewrites_directory_only() {
        let rule = ImportRelocation {
            prefix: true,
            ..relocation("a", "b", &[1])
        };
        let (out, hits) = rewrite(&rule, "import x from '../a/mod';\nimport y from '../c/mod';\n");
        assert_eq!(hits, 1);
        assert_eq!(out, "import x from '../b/mod';\nimport y from '../c/mod';\n");
    }

    #[test]
    fn to_depth_rewrites_relative_prefix() {
        let rule = ImportRelocation {
            to_depth: Some(0),
            ..relocation("components/Layout", "components/Layout", &[2])
        };
        let (out, _) = rewrite(&rule, "import L from '../../components/Layout';");
        assert_eq!(out, "import L from './components/Layout';");
    }

    #[test]
    fn dollar_in_target_is_literal() {
        let rule = relocation("old", "$new", &[1]);
        let (out, _) = rewrite(&rule, "import a from '../old';");
        assert_eq!(out, "import a from '../$new';");
    }

    #[test]
    fn empty_paths_rejected() {
        assert!(relocation("", "x", &[]).build().is_err());
        assert!(relocation("x", "/", &[]).build().is_err());
    }
}
