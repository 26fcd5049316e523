//! Apply a rule set to one file's content, and write it back only if it changed.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::errors::{Result, SrwError};
use crate::rules::RuleSet;

/// A rule that failed on one file; its effect on that file was discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFailure {
    pub rule_id: String,
    pub reason: String,
}

/// Result of running a rule chain over some content.
#[derive(Debug, Clone, Default)]
pub struct RewriteOutcome {
    pub content: String,
    /// Matches per rule id; rules without matches are absent.
    pub hits: BTreeMap<String, usize>,
    pub rule_failures: Vec<RuleFailure>,
}

/// Run every rule, in order, each over the output of the previous one.
///
/// Never fails: a failing rule is recorded and leaves the content as the
/// previous rule produced it.
pub fn apply(content: &str, rules: &RuleSet) -> RewriteOutcome {
    let mut current: Option<String> = None;
    let mut hits = BTreeMap::new();
    let mut rule_failures = Vec::new();

    for rule in rules {
        let input = current.as_deref().unwrap_or(content);
        match rule.apply(input) {
            Ok(None) => {}
            Ok(Some((next, count))) => {
                hits.insert(rule.id().to_string(), count);
                current = Some(next);
            }
            Err(reason) => rule_failures.push(RuleFailure {
                rule_id: rule.id().to_string(),
                reason,
            }),
        }
    }

    RewriteOutcome {
        content: current.unwrap_or_else(|| content.to_string()),
        hits,
        rule_failures,
    }
}

/// Everything known about one processed file. Discarded after reporting.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub path: PathBuf,
    pub original_content: String,
    pub new_content: String,
    pub per_rule_hits: BTreeMap<String, usize>,
    pub rule_failures: Vec<RuleFailure>,
    /// Whether new content reached the disk (false for unchanged files and dry runs).
    pub written: bool,
}

impl FileRecord {
    /// Content differs after the rule chain.
    pub fn is_modified(&self) -> bool {
        self.original_content != self.new_content
    }

    pub fn total_hits(&self) -> usize {
        self.per_rule_hits.values().sum()
    }
}

/// Read, rewrite and (unless `dry_run`) store one file.
///
/// Errors are per-file: the file is left as it was.
pub fn rewrite_file(path: &Path, rules: &RuleSet, dry_run: bool) -> Result<FileRecord> {
    let bytes = fs::read(path).map_err(|err| SrwError::io(path, err))?;
    let original_content = String::from_utf8(bytes).map_err(|err| SrwError::Decode {
        path: path.to_path_buf(),
        details: err.utf8_error().to_string(),
    })?;

    let outcome = apply(&original_content, rules);
    let mut record = FileRecord {
        path: path.to_path_buf(),
        original_content,
        new_content: outcome.content,
        per_rule_hits: outcome.hits,
        rule_failures: outcome.rule_failures,
        written: false,
    };

    if record.is_modified() && !dry_run {
        write_atomic(path, record.new_content.as_bytes())?;
        record.written = true;
    }
    Ok(record)
}

/// Replace `path` with `content` through a sibling temp file and a rename.
///
/// The original file's permissions are carried over. A read-only file is
/// refused even when its directory would allow the rename. On failure the
/// original is untouched and the temp file is removed.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let permissions = fs::metadata(path)
        .map_err(|err| SrwError::io(path, err))?
        .permissions();
    if permissions.readonly() {
        return Err(SrwError::PermissionDenied {
            path: path.to_path_buf(),
        });
    }

    let file_name = path.file_name().ok_or_else(|| SrwError::Runtime {
        details: format!("cannot write to {}: no file name", path.display()),
    })?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".srw-tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        drop(file);
        fs::set_permissions(&tmp_path, permissions)?;
        fs::rename(&tmp_path, path)
    })();

    result.map_err(|err| {
        let _ = fs::remove_file(&tmp_path);
        SrwError::io(path, err)
    })
}
