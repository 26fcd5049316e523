//! Activity logger thread.
//!
//! A dedicated thread owns the [`JsonlWriter`]. The engine sends
//! [`ActivityEvent`]s through a bounded crossbeam channel with `try_send`, so a
//! slow log disk never stalls a run; overflow is counted and reported in the
//! log once the thread catches up.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use sha2::{Digest, Sha256};

use crate::core::errors::{Result, SrwError};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

const CHANNEL_CAPACITY: usize = 1024;

/// Things worth recording about a run.
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    RunStarted {
        root: String,
        config_hash: String,
        rules: usize,
        dry_run: bool,
    },
    FileDeleted {
        path: String,
        dry_run: bool,
    },
    FileRewritten {
        path: String,
        hits: BTreeMap<String, usize>,
        sha256_before: String,
        sha256_after: String,
        dry_run: bool,
    },
    FileFailed {
        path: String,
        code: String,
        message: String,
    },
    RuleFailed {
        rule_id: String,
        path: Option<String>,
        message: String,
    },
    DirSkipped {
        path: String,
        reason: String,
    },
    RunCompleted {
        files_scanned: usize,
        files_modified: usize,
        errors: usize,
        duration_ms: u64,
        dry_run: bool,
    },
    /// Flush and stop the logger thread.
    Shutdown,
}

/// Cloneable, non-blocking sender side of the activity log.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Queue an event; drops it if the channel is full.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the thread to flush and exit. Blocks until the request is queued.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

pub struct ActivityLoggerConfig {
    pub jsonl: JsonlConfig,
    pub channel_capacity: usize,
}

impl Default for ActivityLoggerConfig {
    fn default() -> Self {
        Self {
            jsonl: JsonlConfig::default(),
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

/// Start the logger thread.
pub fn spawn_logger(
    config: ActivityLoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(config.channel_capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: Arc::clone(&dropped),
    };

    let jsonl = config.jsonl;
    let join = thread::Builder::new()
        .name("srw-logger".to_string())
        .spawn(move || logger_thread_main(&rx, jsonl, &dropped))
        .map_err(|err| SrwError::Runtime {
            details: format!("failed to spawn logger thread: {err}"),
        })?;

    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(config);

    while let Ok(event) = rx.recv() {
        let lost = dropped.swap(0, Ordering::Relaxed);
        if lost > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{lost} activity events dropped under back-pressure"));
            jsonl.write_entry(&warn);
        }
        let Some(entry) = to_log_entry(event) else {
            break;
        };
        jsonl.write_entry(&entry);
    }

    jsonl.flush();
    jsonl.fsync();
}

/// Log line for `event`; `Shutdown` has none.
fn to_log_entry(event: ActivityEvent) -> Option<LogEntry> {
    match event {
        ActivityEvent::RunStarted {
            root,
            config_hash,
            rules,
            dry_run,
        } => {
            let mut e = LogEntry::new(EventType::RunStart, Severity::Info);
            e.path = Some(root);
            e.dry_run = Some(dry_run);
            e.details = Some(format!(
                "version={} config_hash={config_hash} rules={rules}",
                env!("CARGO_PKG_VERSION")
            ));
            Some(e)
        }
        ActivityEvent::FileDeleted { path, dry_run } => {
            let mut e = LogEntry::new(EventType::FileDelete, Severity::Info);
            e.path = Some(path);
            e.dry_run = Some(dry_run);
            e.ok = Some(true);
            Some(e)
        }
        ActivityEvent::FileRewritten {
            path,
            hits,
            sha256_before,
            sha256_after,
            dry_run,
        } => {
            let mut e = LogEntry::new(EventType::FileRewrite, Severity::Info);
            e.path = Some(path);
            e.hits = Some(hits);
            e.sha256_before = Some(sha256_before);
            e.sha256_after = Some(sha256_after);
            e.dry_run = Some(dry_run);
            e.ok = Some(true);
            Some(e)
        }
        ActivityEvent::FileFailed {
            path,
            code,
            message,
        } => {
            let mut e = LogEntry::new(EventType::FileFail, Severity::Warning);
            e.path = Some(path);
            e.ok = Some(false);
            e.error_code = Some(code);
            e.error_message = Some(message);
            Some(e)
        }
        ActivityEvent::RuleFailed {
            rule_id,
            path,
            message,
        } => {
            let mut e = LogEntry::new(EventType::RuleFail, Severity::Warning);
            e.rule_id = Some(rule_id);
            e.path = path;
            e.ok = Some(false);
            e.error_code = Some("SRW-2201".to_string());
            e.error_message = Some(message);
            Some(e)
        }
        ActivityEvent::DirSkipped { path, reason } => {
            let mut e = LogEntry::new(EventType::DirSkip, Severity::Warning);
            e.path = Some(path);
            e.details = Some(reason);
            Some(e)
        }
        ActivityEvent::RunCompleted {
            files_scanned,
            files_modified,
            errors,
            duration_ms,
            dry_run,
        } => {
            let mut e = LogEntry::new(EventType::RunComplete, Severity::Info);
            e.files_scanned = Some(files_scanned);
            e.files_modified = Some(files_modified);
            e.duration_ms = Some(duration_ms);
            e.dry_run = Some(dry_run);
            e.ok = Some(errors == 0);
            if errors > 0 {
                e.details = Some(format!("errors={errors}"));
            }
            Some(e)
        }
        ActivityEvent::Shutdown => None,
    }
}

/// Lowercase hex SHA-256 of `content`.
pub fn sha256_hex(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
