//! Lazy, deterministic source-tree walker.
//!
//! Directories are listed in full and sorted on entry, then consumed
//! depth-first, so the walk order is stable and unaffected by files being
//! rewritten in place while the walk is in progress. Symlinks are never
//! followed and excluded directories are pruned before descent.

#![allow(missing_docs)]

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::errors::{Result, SrwError};

/// What the walker yields and what it prunes.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    pub root: PathBuf,
    /// Case-sensitive file-name suffixes, e.g. `.ts`.
    pub extensions: Vec<String>,
    /// Directory names never entered, at any depth.
    pub excluded_dirs: BTreeSet<String>,
    /// File-name suffixes never yielded even when an extension matches.
    pub excluded_suffixes: Vec<String>,
    /// Exact paths never yielded.
    pub skip_files: HashSet<PathBuf>,
}

/// A directory the walk could not list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SkippedDir {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug)]
struct Pending {
    path: PathBuf,
    is_dir: bool,
}

/// Single-pass iterator over candidate files under a root.
#[derive(Debug)]
pub struct FileWalker {
    config: WalkerConfig,
    /// Entries still to visit; the next one is on top.
    stack: Vec<Pending>,
    skipped: Vec<SkippedDir>,
}

impl FileWalker {
    /// Validate the root and list it.
    ///
    /// A missing, non-directory or unreadable root is fatal.
    pub fn new(config: WalkerConfig) -> Result<Self> {
        let invalid = |details: String| SrwError::InvalidRoot {
            path: config.root.clone(),
            details,
        };
        let meta = fs::metadata(&config.root).map_err(|err| invalid(err.to_string()))?;
        if !meta.is_dir() {
            return Err(invalid("not a directory".to_string()));
        }
        let mut stack = Vec::new();
        push_listing(&mut stack, &config.root).map_err(|err| invalid(err.to_string()))?;
        Ok(Self {
            config,
            stack,
            skipped: Vec::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Directories skipped so far because they could not be listed.
    pub fn skipped_dirs(&self) -> &[SkippedDir] {
        &self.skipped
    }

    pub fn into_skipped_dirs(self) -> Vec<SkippedDir> {
        self.skipped
    }

    fn is_excluded_dir(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.config.excluded_dirs.contains(name))
    }

    fn is_candidate(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.as_encoded_bytes();
        self.config
            .extensions
            .iter()
            .any(|ext| name.ends_with(ext.as_bytes()))
            && !self
                .config
                .excluded_suffixes
                .iter()
                .any(|suffix| name.ends_with(suffix.as_bytes()))
            && !self.config.skip_files.contains(path)
    }
}

impl Iterator for FileWalker {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        while let Some(entry) = self.stack.pop() {
            if !entry.is_dir {
                if self.is_candidate(&entry.path) {
                    return Some(entry.path);
                }
                continue;
            }
            if self.is_excluded_dir(&entry.path) {
                continue;
            }
            if let Err(err) = push_listing(&mut self.stack, &entry.path) {
                eprintln!(
                    "[SRW-WALK] skipping unreadable directory {}: {err}",
                    entry.path.display()
                );
                self.skipped.push(SkippedDir {
                    path: entry.path,
                    reason: err.to_string(),
                });
            }
        }
        None
    }
}

/// Read `dir` fully and push its entries so the smallest name pops first.
///
/// Symlinks and special files are dropped here.
fn push_listing(stack: &mut Vec<Pending>, dir: &Path) -> std::io::Result<()> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir)? {
        let Ok(entry) = entry else {
            continue;
        };
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_symlink() || !(file_type.is_dir() || file_type.is_file()) {
            continue;
        }
        children.push(Pending {
            path: entry.path(),
            is_dir: file_type.is_dir(),
        });
    }
    children.sort_by(|a, b| b.path.file_name().cmp(&a.path.file_name()));
    stack.extend(children);
    Ok(())
}

/// Walk `root` yielding files whose name ends with one of `extensions`.
pub fn walk(root: &Path, extensions: &[String], excluded_dirs: &BTreeSet<String>) -> Result<FileWalker> {
    FileWalker::new(WalkerConfig {
        root: root.to_path_buf(),
        extensions: extensions.to_vec(),
        excluded_dirs: excluded_dirs.clone(),
        ..WalkerConfig::default()
    })
}
