//! Run summary: the contracted output of a run.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::core::errors::SrwError;
use crate::core::paths::display_relative;
use crate::engine::rewriter::FileRecord;
use crate::engine::walker::SkippedDir;
use crate::rules::RuleSet;

/// Entries listed per section in the human rendering.
pub const REPORT_LIST_LIMIT: usize = 30;

/// A file whose content changed, with its per-rule hit counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    /// Root-relative path.
    pub path: PathBuf,
    pub hits: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerFileError {
    pub path: PathBuf,
    pub code: String,
    pub reason: String,
}

/// A rule failure; `path` is absent for rules disabled for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleError {
    pub rule_id: String,
    pub path: Option<PathBuf>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleTotal {
    pub rule_id: String,
    pub hits: usize,
    /// Files in which the rule matched at least once.
    pub files: usize,
}

/// Aggregated result of one run. Read-only once built.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    root: PathBuf,
    dry_run: bool,
    deleted_paths: Vec<PathBuf>,
    modified_files: Vec<FileSummary>,
    total_files_scanned: usize,
    rule_totals: Vec<RuleTotal>,
    errors: Vec<PerFileError>,
    rule_errors: Vec<RuleError>,
    skipped_dirs: Vec<SkippedDir>,
    duration_ms: u64,
}

impl RunSummary {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub const fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Root-relative paths deleted (or that a dry run would delete).
    pub fn deleted_paths(&self) -> &[PathBuf] {
        &self.deleted_paths
    }

    pub fn modified_files(&self) -> &[FileSummary] {
        &self.modified_files
    }

    pub const fn total_files_scanned(&self) -> usize {
        self.total_files_scanned
    }

    pub fn files_modified(&self) -> usize {
        self.modified_files.len()
    }

    /// Per-rule totals in rule-set order, including rules that never matched.
    pub fn rule_totals(&self) -> &[RuleTotal] {
        &self.rule_totals
    }

    /// Total hits for one rule across the run.
    pub fn hits_for(&self, rule_id: &str) -> usize {
        self.rule_totals
            .iter()
            .find(|total| total.rule_id == rule_id)
            .map_or(0, |total| total.hits)
    }

    pub fn errors(&self) -> &[PerFileError] {
        &self.errors
    }

    pub fn rule_errors(&self) -> &[RuleError] {
        &self.rule_errors
    }

    pub fn skipped_dirs(&self) -> &[SkippedDir] {
        &self.skipped_dirs
    }

    pub const fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// True when nothing failed.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.rule_errors.is_empty() && self.skipped_dirs.is_empty()
    }

    /// Plain-text rendering; long lists are cut after [`REPORT_LIST_LIMIT`].
    pub fn render_human(&self) -> String {
        let mut out = String::new();
        let mode = if self.dry_run { " (dry run)" } else { "" };
        let _ = writeln!(out, "Rewrite summary{mode}:");
        let _ = writeln!(out, "  Root: {}", self.root.display());
        let _ = writeln!(out, "  Files scanned: {}", self.total_files_scanned);
        let _ = writeln!(out, "  Files modified: {}", self.modified_files.len());
        let _ = writeln!(out, "  Files deleted: {}", self.deleted_paths.len());
        let _ = writeln!(out, "  Duration: {:.2}s", self.duration().as_secs_f64());

        if !self.deleted_paths.is_empty() {
            let verb = if self.dry_run { "Would delete" } else { "Deleted" };
            let _ = writeln!(out, "\n{verb}:");
            push_limited(&mut out, self.deleted_paths.iter(), |path| {
                path.display().to_string()
            });
        }

        if !self.modified_files.is_empty() {
            let verb = if self.dry_run { "Would modify" } else { "Modified" };
            let _ = writeln!(out, "\n{verb}:");
            push_limited(&mut out, self.modified_files.iter(), |file| {
                let hits: Vec<String> = file
                    .hits
                    .iter()
                    .map(|(rule, count)| format!("{rule} x{count}"))
                    .collect();
                format!("{} ({})", file.path.display(), hits.join(", "))
            });
        }

        let active: Vec<&RuleTotal> = self.rule_totals.iter().filter(|t| t.hits > 0).collect();
        if !active.is_empty() {
            let width = active.iter().map(|t| t.rule_id.len()).max().unwrap_or(0);
            let _ = writeln!(out, "\nRule hits:");
            for total in active {
                let _ = writeln!(
                    out,
                    "  {:<width$}  {} in {} file(s)",
                    total.rule_id, total.hits, total.files
                );
            }
        }

        if !self.errors.is_empty() {
            let _ = writeln!(out, "\nErrors:");
            push_limited(&mut out, self.errors.iter(), |err| {
                format!("[{}] {}: {}", err.code, err.path.display(), err.reason)
            });
        }

        if !self.rule_errors.is_empty() {
            let _ = writeln!(out, "\nRule errors:");
            push_limited(&mut out, self.rule_errors.iter(), |err| match &err.path {
                Some(path) => format!("{} in {}: {}", err.rule_id, path.display(), err.reason),
                None => format!("{} (disabled): {}", err.rule_id, err.reason),
            });
        }

        if !self.skipped_dirs.is_empty() {
            let _ = writeln!(out, "\nSkipped directories:");
            push_limited(&mut out, self.skipped_dirs.iter(), |dir| {
                format!("{}: {}", display_relative(&self.root, &dir.path), dir.reason)
            });
        }

        out
    }
}

fn push_limited<'a, T: 'a>(
    out: &mut String,
    items: impl ExactSizeIterator<Item = &'a T>,
    render: impl Fn(&T) -> String,
) {
    let total = items.len();
    for item in items.take(REPORT_LIST_LIMIT) {
        let _ = writeln!(out, "  {}", render(item));
    }
    if total > REPORT_LIST_LIMIT {
        let _ = writeln!(out, "  ... and {} more", total - REPORT_LIST_LIMIT);
    }
}

/// Accumulates a [`RunSummary`]. Owned by the orchestrator for one run.
#[derive(Debug)]
pub struct SummaryBuilder {
    summary: RunSummary,
}

impl SummaryBuilder {
    pub fn new(root: &Path, dry_run: bool, rules: &RuleSet) -> Self {
        let rule_totals = rules
            .iter()
            .map(|rule| RuleTotal {
                rule_id: rule.id().to_string(),
                hits: 0,
                files: 0,
            })
            .collect();
        let rule_errors = rules
            .disabled()
            .iter()
            .map(|diag| RuleError {
                rule_id: diag.rule_id.clone(),
                path: None,
                reason: diag.reason.clone(),
            })
            .collect();
        Self {
            summary: RunSummary {
                root: root.to_path_buf(),
                dry_run,
                deleted_paths: Vec::new(),
                modified_files: Vec::new(),
                total_files_scanned: 0,
                rule_totals,
                errors: Vec::new(),
                rule_errors,
                skipped_dirs: Vec::new(),
                duration_ms: 0,
            },
        }
    }

    pub fn record_deleted(&mut self, path: &Path) {
        let relative = path.strip_prefix(&self.summary.root).unwrap_or(path);
        self.summary.deleted_paths.push(relative.to_path_buf());
    }

    /// Fold one processed file into the totals.
    pub fn record_file(&mut self, record: &FileRecord) {
        self.summary.total_files_scanned += 1;
        for (rule_id, count) in &record.per_rule_hits {
            if let Some(total) = self
                .summary
                .rule_totals
                .iter_mut()
                .find(|total| &total.rule_id == rule_id)
            {
                total.hits += count;
                total.files += 1;
            }
        }
        let relative = self.relative(&record.path);
        for failure in &record.rule_failures {
            self.summary.rule_errors.push(RuleError {
                rule_id: failure.rule_id.clone(),
                path: Some(relative.clone()),
                reason: failure.reason.clone(),
            });
        }
        if record.is_modified() {
            self.summary.modified_files.push(FileSummary {
                path: relative,
                hits: record.per_rule_hits.clone(),
            });
        }
    }

    /// A file that could not be processed. Still counts as scanned when
    /// `scanned` is set.
    pub fn record_error(&mut self, path: &Path, err: &SrwError, scanned: bool) {
        if scanned {
            self.summary.total_files_scanned += 1;
        }
        let path = self.relative(path);
        self.summary.errors.push(PerFileError {
            path,
            code: err.code().to_string(),
            reason: err.to_string(),
        });
    }

    pub fn finish(mut self, skipped_dirs: Vec<SkippedDir>, duration: Duration) -> RunSummary {
        self.summary.skipped_dirs = skipped_dirs;
        self.summary.duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.summary
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.summary.root)
            .unwrap_or(path)
            .to_path_buf()
    }
}
