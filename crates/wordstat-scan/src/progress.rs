//! Scan progress reporting.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use crate::aggregate::Aggregator;

/// How many processed files between two progress snapshots.
pub const PROGRESS_INTERVAL: u64 = 64;

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Number of files read successfully so far.
    pub files_processed: u64,
    /// Number of files handed to the workers so far.
    pub files_enqueued: u64,
    /// Total bytes read so far.
    pub bytes_read: u64,
    /// Failed attempts that were requeued.
    pub retries: u64,
    /// Last file finished.
    pub current_path: PathBuf,
    /// Time elapsed since scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            files_processed: 0,
            files_enqueued: 0,
            bytes_read: 0,
            retries: 0,
            current_path: PathBuf::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_processed as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Files discovered but not yet read.
    pub fn files_pending(&self) -> u64 {
        self.files_enqueued.saturating_sub(self.files_processed)
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Throttled publisher of progress snapshots shared by the workers.
#[derive(Debug, Clone)]
pub(crate) struct ProgressReporter {
    tx: broadcast::Sender<ScanProgress>,
    start_time: Instant,
    interval: u64,
}

impl ProgressReporter {
    pub fn new(tx: broadcast::Sender<ScanProgress>, start_time: Instant) -> Self {
        Self {
            tx,
            start_time,
            interval: PROGRESS_INTERVAL,
        }
    }

    /// Called after each processed file; publishes every `interval` files.
    pub fn file_done(&self, processed: u64, aggregator: &Aggregator, path: &Path) {
        if processed % self.interval == 0 {
            self.publish(aggregator, path);
        }
    }

    /// Publish a snapshot now. Having no subscribers is not an error.
    pub fn publish(&self, aggregator: &Aggregator, path: &Path) {
        let _ = self.tx.send(snapshot(aggregator, path, self.start_time.elapsed()));
    }
}

fn snapshot(aggregator: &Aggregator, path: &Path, elapsed: Duration) -> ScanProgress {
    ScanProgress {
        files_processed: aggregator.files_processed(),
        files_enqueued: aggregator.files_enqueued(),
        bytes_read: aggregator.bytes_read(),
        retries: aggregator.retries(),
        current_path: path.to_path_buf(),
        elapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_rates() {
        let progress = ScanProgress {
            files_processed: 30,
            files_enqueued: 50,
            elapsed: Duration::from_secs(3),
            ..ScanProgress::new()
        };
        assert!((progress.files_per_second() - 10.0).abs() < f64::EPSILON);
        assert_eq!(progress.files_pending(), 20);
        assert_eq!(ScanProgress::new().files_per_second(), 0.0);
    }

    #[test]
    fn test_reporter_throttles() {
        let (tx, mut rx) = broadcast::channel(16);
        let reporter = ProgressReporter::new(tx, Instant::now());
        let aggregator = Aggregator::new();

        for processed in 1..=PROGRESS_INTERVAL * 2 {
            aggregator.record_file(1);
            reporter.file_done(processed, &aggregator, Path::new("f.c"));
        }

        let first = rx.try_recv().unwrap();
        assert_eq!(first.files_processed, PROGRESS_INTERVAL);
        let second = rx.try_recv().unwrap();
        assert_eq!(second.files_processed, PROGRESS_INTERVAL * 2);
        assert!(rx.try_recv().is_err());
    }
}
