//! SRW-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, SrwError>;

/// How far an error propagates within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Aborts the run before any mutation and reaches the caller.
    Fatal,
    /// Recorded against one file; the run continues with the next file.
    PerFile,
    /// Recorded against one rule; the rule is skipped for the affected file.
    Rule,
}

/// Top-level error type for the source rewriter.
#[derive(Debug, Error)]
pub enum SrwError {
    #[error("[SRW-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[SRW-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[SRW-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[SRW-1101] invalid root {path}: {details}")]
    InvalidRoot { path: PathBuf, details: String },

    #[error("[SRW-1201] invalid rule {rule_id}: {details}")]
    InvalidRule { rule_id: String, details: String },

    #[error("[SRW-1202] duplicate rule id: {rule_id}")]
    DuplicateRule { rule_id: String },

    #[error("[SRW-2001] {path} is not valid UTF-8: {details}")]
    Decode { path: PathBuf, details: String },

    #[error("[SRW-2002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SRW-2003] permission denied for {path}")]
    PermissionDenied { path: PathBuf },

    #[error("[SRW-2004] deletion refused for {path}: {reason}")]
    DeletionRefused { path: PathBuf, reason: String },

    #[error("[SRW-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[SRW-2201] rule {rule_id} failed: {details}")]
    RuleFailed { rule_id: String, details: String },

    #[error("[SRW-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl SrwError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "SRW-1001",
            Self::MissingConfig { .. } => "SRW-1002",
            Self::ConfigParse { .. } => "SRW-1003",
            Self::InvalidRoot { .. } => "SRW-1101",
            Self::InvalidRule { .. } => "SRW-1201",
            Self::DuplicateRule { .. } => "SRW-1202",
            Self::Decode { .. } => "SRW-2001",
            Self::Io { .. } => "SRW-2002",
            Self::PermissionDenied { .. } => "SRW-2003",
            Self::DeletionRefused { .. } => "SRW-2004",
            Self::Serialization { .. } => "SRW-2101",
            Self::RuleFailed { .. } => "SRW-2201",
            Self::Runtime { .. } => "SRW-3900",
        }
    }

    /// Propagation class of this error within a run.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Decode { .. }
            | Self::Io { .. }
            | Self::PermissionDenied { .. }
            | Self::DeletionRefused { .. } => ErrorClass::PerFile,
            Self::InvalidRule { .. } | Self::RuleFailed { .. } => ErrorClass::Rule,
            Self::InvalidConfig { .. }
            | Self::MissingConfig { .. }
            | Self::ConfigParse { .. }
            | Self::InvalidRoot { .. }
            | Self::DuplicateRule { .. }
            | Self::Serialization { .. }
            | Self::Runtime { .. } => ErrorClass::Fatal,
        }
    }

    /// Whether this error aborts a run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self.class(), ErrorClass::Fatal)
    }

    /// Convenience constructor for IO errors with a known path.
    ///
    /// Permission failures are folded into [`SrwError::PermissionDenied`].
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { path }
        } else {
            Self::Io { path, source }
        }
    }
}

impl From<serde_json::Error> for SrwError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for SrwError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<toml::ser::Error> for SrwError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Serialization {
            context: "toml",
            details: value.to_string(),
        }
    }
}
