//! Concurrent scanning engine for wordstat.
//!
//! This crate walks a directory tree on one thread while a fixed pool of
//! worker threads reads the discovered files, counts their lines and tallies
//! every token made only of ASCII letters.
//!
//! # Overview
//!
//! - **Streaming traversal** via jwalk: workers start on the first file found
//! - **Work queue** on a crossbeam channel that closes itself once the walk is
//!   done and no task is outstanding
//! - **Requeue on failure** with a per-file retry cap
//! - **Progress updates** via broadcast channels
//!
//! # Example
//!
//! ```rust,no_run
//! use wordstat_scan::{ScanConfig, Scanner};
//!
//! let config = ScanConfig::new("/path/to/source");
//! let report = Scanner::new().scan(&config).unwrap();
//!
//! println!("{} files, {} lines", report.stats.files, report.stats.lines);
//! for entry in report.top(10) {
//!     println!("{}\t{}", entry.token, entry.count);
//! }
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use wordstat_scan::{ScanConfig, Scanner};
//!
//! let scanner = Scanner::new();
//! let mut progress_rx = scanner.subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(progress) = progress_rx.blocking_recv() {
//!         println!("Read {} files", progress.files_processed);
//!     }
//! });
//! ```

mod aggregate;
mod barrier;
mod inode;
mod progress;
mod queue;
mod reader;
mod scanner;
mod tokenize;
mod walker;
mod worker;

pub use aggregate::Aggregator;
pub use barrier::CompletionBarrier;
pub use inode::{DirKey, VisitedDirs};
pub use progress::{PROGRESS_INTERVAL, ScanProgress};
pub use queue::{QueueClosed, QueueStats, WorkQueue};
pub use reader::{ContentReader, FsReader};
pub use scanner::Scanner;
pub use tokenize::{FileTally, is_word, words};
pub use walker::{DirectoryWalker, WalkSummary};
pub use worker::{Worker, WorkerPool, WorkerSummary};

// Re-export core types for convenience
pub use wordstat_core::{
    FileTask, ScanConfig, ScanError, ScanReport, ScanStats, ScanWarning, TokenCount, WarningKind,
};
