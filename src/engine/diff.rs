//! Unified diffs of rewritten files, for previews.

use similar::TextDiff;

/// Unified diff of `original` against `modified` with three lines of context,
/// labelled `a/<path>` and `b/<path>`. Empty when the two are equal.
pub fn unified_diff(path: &str, original: &str, modified: &str) -> String {
    if original == modified {
        return String::new();
    }
    TextDiff::from_lines(original, modified)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string()
}
