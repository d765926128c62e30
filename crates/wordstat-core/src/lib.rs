//! Core types for wordstat.
//!
//! This crate provides the plain data structures shared by the scanning
//! engine and the command line: configuration, errors, work items and the
//! final report.

mod config;
mod error;
mod report;
mod task;

pub use config::{
    DEFAULT_EXTENSIONS, DEFAULT_MAX_RETRIES, DEFAULT_WORKERS, ScanConfig, ScanConfigBuilder,
    normalize_extension,
};
pub use error::{ScanError, ScanWarning, WarningKind};
pub use report::{ScanReport, ScanStats, TokenCount, compare_ranked, rank_tokens};
pub use task::FileTask;
