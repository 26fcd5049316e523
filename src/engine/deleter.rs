//! Removal of files a rule set has made obsolete.
//!
//! Runs once per run, before the walk. Safety checks before each removal:
//! 1. The listed path is relative and has no `..` component
//! 2. It does not pass through an excluded directory
//! 3. Its parent resolves inside the run root (no symlinked escape)
//! 4. It names a regular file, not a directory or symlink
//!
//! A path that does not exist is skipped silently, so repeated runs are no-ops.

#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::core::errors::SrwError;
use crate::core::paths::{check_root_relative, display_relative, excluded_ancestor};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};

/// Exact root-relative paths to remove.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionSpec {
    paths: Vec<PathBuf>,
}

impl DeletionSpec {
    /// Duplicates are dropped; first occurrence wins the ordering.
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut seen = BTreeSet::new();
        let paths = paths
            .into_iter()
            .map(Into::into)
            .filter(|path: &PathBuf| seen.insert(path.clone()))
            .collect();
        Self { paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Outcome of the deletion phase.
#[derive(Debug, Default)]
pub struct DeletionReport {
    /// Absolute paths removed, or that would be removed in a dry run.
    pub deleted: Vec<PathBuf>,
    /// Listed path (as given) and what went wrong with it.
    pub errors: Vec<(PathBuf, SrwError)>,
}

/// Applies a [`DeletionSpec`] under one root.
pub struct Deleter<'a> {
    root: &'a Path,
    excluded_dirs: &'a BTreeSet<String>,
    dry_run: bool,
    logger: Option<&'a ActivityLoggerHandle>,
}

impl<'a> Deleter<'a> {
    pub const fn new(root: &'a Path, excluded_dirs: &'a BTreeSet<String>, dry_run: bool) -> Self {
        Self {
            root,
            excluded_dirs,
            dry_run,
            logger: None,
        }
    }

    #[must_use]
    pub fn with_logger(mut self, logger: Option<&'a ActivityLoggerHandle>) -> Self {
        self.logger = logger;
        self
    }

    pub fn execute(&self, spec: &DeletionSpec) -> DeletionReport {
        let mut report = DeletionReport::default();
        let canonical_root = fs::canonicalize(self.root).unwrap_or_else(|_| self.root.to_path_buf());

        for relative in spec.paths() {
            match self.delete_one(relative, &canonical_root) {
                Ok(Some(path)) => {
                    self.log(ActivityEvent::FileDeleted {
                        path: display_relative(self.root, &path),
                        dry_run: self.dry_run,
                    });
                    report.deleted.push(path);
                }
                Ok(None) => {}
                Err(err) => {
                    self.log(ActivityEvent::FileFailed {
                        path: relative.display().to_string(),
                        code: err.code().to_string(),
                        message: err.to_string(),
                    });
                    report.errors.push((relative.clone(), err));
                }
            }
        }
        report
    }

    fn delete_one(&self, relative: &Path, canonical_root: &Path) -> Result<Option<PathBuf>, SrwError> {
        let refuse = |reason: String| SrwError::DeletionRefused {
            path: relative.to_path_buf(),
            reason,
        };

        check_root_relative(relative).map_err(refuse)?;
        if let Some(dir) = excluded_ancestor(relative, self.excluded_dirs) {
            return Err(refuse(format!("inside excluded directory {dir:?}")));
        }

        let full = self.root.join(relative);
        let meta = match fs::symlink_metadata(&full) {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(SrwError::io(&full, err)),
        };

        if let Some(parent) = full.parent() {
            let resolved = fs::canonicalize(parent).map_err(|err| SrwError::io(parent, err))?;
            if !resolved.starts_with(canonical_root) {
                return Err(refuse("resolves outside the run root".to_string()));
            }
        }
        if meta.file_type().is_symlink() {
            return Err(refuse("is a symbolic link".to_string()));
        }
        if !meta.is_file() {
            return Err(refuse("not a regular file".to_string()));
        }

        if self.dry_run {
            return Ok(Some(full));
        }
        match fs::remove_file(&full) {
            Ok(()) => Ok(Some(full)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(SrwError::io(&full, err)),
        }
    }

    fn log(&self, event: ActivityEvent) {
        if let Some(logger) = self.logger {
            logger.send(event);
        }
    }
}

/// Remove every listed path under `root`. Missing paths are skipped.
pub fn delete(spec: &DeletionSpec, root: &Path) -> DeletionReport {
    Deleter::new(root, &BTreeSet::new(), false).execute(spec)
}
