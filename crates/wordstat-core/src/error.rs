//! Error types for scanning operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the walker or the workers was interrupted.
    #[error("Scan interrupted: {reason}")]
    Interrupted { reason: String },

    /// A scan thread could not be started.
    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create an interruption error.
    pub fn interrupted(reason: impl Into<String>) -> Self {
        Self::Interrupted {
            reason: reason.into(),
        }
    }
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// A single read attempt failed (the file was requeued).
    ReadError,
    /// A file kept failing until its retries ran out.
    RetryExhausted,
    /// A directory entry could not be read during traversal.
    WalkError,
    /// A directory was reached a second time through a symlink.
    SymlinkLoop,
}

/// Non-fatal problem encountered during a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a read error warning.
    pub fn read_error(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::new(path, format!("Read error: {error}"), WarningKind::ReadError)
    }

    /// Create a warning for a file that failed on every attempt.
    pub fn retry_exhausted(path: impl Into<PathBuf>, error: &std::io::Error, attempts: u32) -> Self {
        Self::new(
            path,
            format!("Gave up after {attempts} attempt(s): {error}"),
            WarningKind::RetryExhausted,
        )
    }

    /// Create a traversal error warning.
    pub fn walk_error(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::new(path, format!("Walk error: {message}"), WarningKind::WalkError)
    }

    /// Create a symlink loop warning.
    pub fn symlink_loop(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            message: format!("Directory already visited: {}", path.display()),
            path,
            kind: WarningKind::SymlinkLoop,
        }
    }
}
