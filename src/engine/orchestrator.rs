//! One engine run: delete, walk, rewrite, report.
//!
//! The phase machine only moves forward; an orchestrator is consumed by
//! [`Orchestrator::run`], so it cannot be reused for a second walk.

#![allow(missing_docs)]

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::config::Config;
use crate::core::errors::{Result, SrwError};
use crate::core::paths::{display_relative, resolve_absolute_path};
use crate::engine::deleter::{Deleter, DeletionSpec};
use crate::engine::report::{RunSummary, SummaryBuilder};
use crate::engine::rewriter::{FileRecord, rewrite_file};
use crate::engine::walker::{FileWalker, WalkerConfig};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, sha256_hex};
use crate::rules::RuleSet;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunPhase {
    Idle,
    Deleting,
    Scanning,
    Rewriting,
    Reporting,
    Done,
}

impl RunPhase {
    /// Move to `next`; going back or staying put is an internal error.
    pub fn advance(&mut self, next: Self) -> Result<()> {
        if next <= *self {
            return Err(SrwError::Runtime {
                details: format!("run phase cannot move from {self:?} to {next:?}"),
            });
        }
        *self = next;
        Ok(())
    }
}

/// Everything a run needs, resolved up front.
#[derive(Debug)]
pub struct RunRequest {
    pub root: PathBuf,
    pub rules: RuleSet,
    pub extensions: Vec<String>,
    pub excluded_dirs: BTreeSet<String>,
    pub excluded_suffixes: Vec<String>,
    pub deletion: DeletionSpec,
    pub dry_run: bool,
}

impl RunRequest {
    /// Request with the given essentials and no suffix filter, deletions or dry run.
    pub fn new(
        root: impl Into<PathBuf>,
        rules: RuleSet,
        extensions: impl IntoIterator<Item = impl Into<String>>,
        excluded_dirs: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            root: root.into(),
            rules,
            extensions: extensions.into_iter().map(Into::into).collect(),
            excluded_dirs: excluded_dirs.into_iter().map(Into::into).collect(),
            excluded_suffixes: Vec::new(),
            deletion: DeletionSpec::default(),
            dry_run: false,
        }
    }

    /// Build the rule set and path filters from configuration.
    ///
    /// Rules that fail to compile are disabled, not fatal; they surface as
    /// rule errors in the summary.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            root: config.engine.root.clone(),
            rules: RuleSet::from_specs(&config.rules)?,
            extensions: config.engine.extensions.clone(),
            excluded_dirs: config.excluded_dir_set(),
            excluded_suffixes: config.engine.excluded_suffixes.clone(),
            deletion: DeletionSpec::new(config.deletion.paths.iter().cloned()),
            dry_run: config.engine.dry_run,
        })
    }

    #[must_use]
    pub fn with_deletion(mut self, deletion: DeletionSpec) -> Self {
        self.deletion = deletion;
        self
    }

    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

type Observer<'a> = Box<dyn FnMut(&FileRecord) + 'a>;

/// Drives a single run and owns its summary until it is handed back.
pub struct Orchestrator<'a> {
    phase: RunPhase,
    logger: Option<&'a ActivityLoggerHandle>,
    observer: Option<Observer<'a>>,
    config_hash: String,
}

impl Default for Orchestrator<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Orchestrator<'a> {
    pub const fn new() -> Self {
        Self {
            phase: RunPhase::Idle,
            logger: None,
            observer: None,
            config_hash: String::new(),
        }
    }

    #[must_use]
    pub fn with_logger(mut self, logger: Option<&'a ActivityLoggerHandle>) -> Self {
        self.logger = logger;
        self
    }

    /// Called with every processed file, contents included, before it is folded
    /// into the summary.
    #[must_use]
    pub fn with_observer(mut self, observer: impl FnMut(&FileRecord) + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Recorded in the run-start log event.
    #[must_use]
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    pub const fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Execute the run. Only an invalid root is fatal; everything else is
    /// recorded in the summary.
    pub fn run(mut self, request: RunRequest) -> Result<RunSummary> {
        let started = Instant::now();
        let root = resolve_absolute_path(&request.root);
        check_root(&root)?;

        self.log(ActivityEvent::RunStarted {
            root: root.display().to_string(),
            config_hash: self.config_hash.clone(),
            rules: request.rules.len(),
            dry_run: request.dry_run,
        });
        for diag in request.rules.disabled() {
            self.log(ActivityEvent::RuleFailed {
                rule_id: diag.rule_id.clone(),
                path: None,
                message: diag.reason.clone(),
            });
        }

        let mut summary = SummaryBuilder::new(&root, request.dry_run, &request.rules);

        self.phase.advance(RunPhase::Deleting)?;
        let deletion = Deleter::new(&root, &request.excluded_dirs, request.dry_run)
            .with_logger(self.logger)
            .execute(&request.deletion);
        for path in &deletion.deleted {
            summary.record_deleted(path);
        }
        for (path, err) in &deletion.errors {
            summary.record_error(path, err, false);
        }

        self.phase.advance(RunPhase::Scanning)?;
        let mut walker = FileWalker::new(WalkerConfig {
            root: root.clone(),
            extensions: request.extensions.clone(),
            excluded_dirs: request.excluded_dirs.clone(),
            excluded_suffixes: request.excluded_suffixes.clone(),
            skip_files: deletion.deleted.iter().cloned().collect::<HashSet<_>>(),
        })?;

        self.phase.advance(RunPhase::Rewriting)?;
        for path in walker.by_ref() {
            self.process(&root, &path, &request, &mut summary);
        }
        let skipped_dirs = walker.into_skipped_dirs();
        for dir in &skipped_dirs {
            self.log(ActivityEvent::DirSkipped {
                path: display_relative(&root, &dir.path),
                reason: dir.reason.clone(),
            });
        }

        self.phase.advance(RunPhase::Reporting)?;
        let summary = summary.finish(skipped_dirs, started.elapsed());
        self.log(ActivityEvent::RunCompleted {
            files_scanned: summary.total_files_scanned(),
            files_modified: summary.files_modified(),
            errors: summary.errors().len() + summary.rule_errors().len(),
            duration_ms: u64::try_from(summary.duration().as_millis()).unwrap_or(u64::MAX),
            dry_run: summary.dry_run(),
        });

        self.phase.advance(RunPhase::Done)?;
        Ok(summary)
    }

    fn process(&mut self, root: &Path, path: &Path, request: &RunRequest, summary: &mut SummaryBuilder) {
        let relative = display_relative(root, path);
        match rewrite_file(path, &request.rules, request.dry_run) {
            Ok(record) => {
                for failure in &record.rule_failures {
                    self.log(ActivityEvent::RuleFailed {
                        rule_id: failure.rule_id.clone(),
                        path: Some(relative.clone()),
                        message: failure.reason.clone(),
                    });
                }
                if record.is_modified() {
                    self.log(ActivityEvent::FileRewritten {
                        path: relative,
                        hits: record.per_rule_hits.clone(),
                        sha256_before: sha256_hex(record.original_content.as_bytes()),
                        sha256_after: sha256_hex(record.new_content.as_bytes()),
                        dry_run: request.dry_run,
                    });
                }
                if let Some(observer) = self.observer.as_mut() {
                    observer(&record);
                }
                summary.record_file(&record);
            }
            Err(err) => {
                self.log(ActivityEvent::FileFailed {
                    path: relative,
                    code: err.code().to_string(),
                    message: err.to_string(),
                });
                summary.record_error(path, &err, true);
            }
        }
    }

    fn log(&self, event: ActivityEvent) {
        if let Some(logger) = self.logger {
            logger.send(event);
        }
    }
}

/// The root must be an existing, listable directory.
fn check_root(root: &Path) -> Result<()> {
    let invalid = |details: String| SrwError::InvalidRoot {
        path: root.to_path_buf(),
        details,
    };
    let meta = fs::metadata(root).map_err(|err| invalid(err.to_string()))?;
    if !meta.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }
    fs::read_dir(root).map_err(|err| invalid(err.to_string()))?;
    Ok(())
}

/// Run `request` with no logging or observer.
pub fn run(request: RunRequest) -> Result<RunSummary> {
    Orchestrator::new().run(request)
}
