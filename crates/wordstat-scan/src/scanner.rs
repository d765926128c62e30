//! Scan orchestration: one walker, a pool of workers, one barrier.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use wordstat_core::{ScanConfig, ScanError, ScanReport, ScanStats};

use crate::aggregate::Aggregator;
use crate::progress::{ProgressReporter, ScanProgress};
use crate::queue::WorkQueue;
use crate::reader::{ContentReader, FsReader};
use crate::walker::DirectoryWalker;
use crate::worker::{WorkerContext, WorkerPool};

/// Runs a complete walk-and-count over one root.
///
/// Each call to [`scan`](Self::scan) is an independent run with its own
/// queue, aggregator and threads.
pub struct Scanner {
    progress_tx: broadcast::Sender<ScanProgress>,
    reader: Arc<dyn ContentReader>,
}

impl Scanner {
    /// Create a scanner reading from the local filesystem.
    pub fn new() -> Self {
        Self::with_reader(FsReader)
    }

    /// Create a scanner that opens files through `reader`.
    pub fn with_reader(reader: impl ContentReader + 'static) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            progress_tx,
            reader: Arc::new(reader),
        }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Scan `config.root` and return the aggregated report.
    ///
    /// Blocks the calling thread until every worker has exited.
    pub fn scan(&self, config: &ScanConfig) -> Result<ScanReport, ScanError> {
        let start = Instant::now();
        let root = config.root.clone();

        // A missing root is reported before any thread starts.
        std::fs::metadata(&root).map_err(|e| ScanError::io(&root, e))?;

        let config = Arc::new(config.clone());
        let queue = Arc::new(WorkQueue::new());
        let aggregator = Arc::new(Aggregator::new());
        let progress = ProgressReporter::new(self.progress_tx.clone(), start);

        let walker = DirectoryWalker::new(
            Arc::clone(&config),
            Arc::clone(&queue),
            Arc::clone(&aggregator),
        )?;

        let context = WorkerContext {
            queue: Arc::clone(&queue),
            aggregator: Arc::clone(&aggregator),
            reader: Arc::clone(&self.reader),
            progress: progress.clone(),
            max_retries: config.max_retries,
        };
        let pool = match WorkerPool::spawn(config.worker_count(), context) {
            Ok(pool) => pool,
            Err(err) => {
                // Lets any worker that did start drain and exit.
                queue.mark_traversal_complete();
                return Err(err);
            }
        };
        info!(
            root = %root.display(),
            workers = pool.len(),
            "Starting scan"
        );
        let barrier = pool.completion();

        let walker = match walker.spawn() {
            Ok(handle) => handle,
            Err(err) => {
                queue.mark_traversal_complete();
                barrier.wait()?;
                return Err(err);
            }
        };

        let summaries = barrier.wait()?;
        let walk = walker
            .join()
            .map_err(|_| ScanError::interrupted("walker panicked"))?;

        let lines = summaries.iter().map(|s| s.lines_read).sum();
        let failures: Vec<_> = summaries.into_iter().flat_map(|s| s.failures).collect();
        for failure in &failures {
            warn!(path = %failure.path.display(), "File could not be read");
        }
        debug!(
            dequeued = queue.stats().throughput(),
            requeued = queue.stats().requeue_count(),
            "Work queue drained"
        );

        let stats = ScanStats {
            files: aggregator.files_enqueued(),
            lines,
            bytes: aggregator.bytes_read(),
            retries: aggregator.retries(),
            distinct_tokens: aggregator.distinct_tokens() as u64,
            elapsed: start.elapsed(),
        };
        progress.publish(&aggregator, &root);

        info!(
            files = stats.files,
            lines = stats.lines,
            elapsed_ms = stats.elapsed_ms() as u64,
            failures = failures.len(),
            "Scan complete"
        );

        Ok(ScanReport::new(
            root,
            stats,
            aggregator.ranking(),
            failures,
            walk.warnings,
        ))
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("dir1")).unwrap();
        fs::create_dir(root.join("dir1/subdir")).unwrap();

        fs::write(root.join("a.py"), "def main\n    return value\n").unwrap();
        fs::write(root.join("dir1/b.java"), "class Main\npublic static void main\n").unwrap();
        fs::write(root.join("dir1/subdir/c.c"), "int main\n").unwrap();
        fs::write(root.join("dir1/notes.txt"), "main main main main\n").unwrap();

        temp
    }

    #[test]
    fn test_basic_scan() {
        let temp = create_test_tree();
        let report = Scanner::new().scan(&ScanConfig::new(temp.path())).unwrap();

        assert_eq!(report.stats.files, 3);
        assert_eq!(report.stats.lines, 5);
        assert_eq!(report.count_of("main"), Some(3));
        assert_eq!(report.ranking[0].token, "main");
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_ignore_patterns() {
        let temp = create_test_tree();
        let config = ScanConfig::builder()
            .root(temp.path())
            .ignore_patterns(vec!["dir1".to_string()])
            .build()
            .unwrap();

        let report = Scanner::new().scan(&config).unwrap();

        assert_eq!(report.stats.files, 1);
        assert_eq!(report.count_of("class"), None);
    }

    #[test]
    fn test_scanner_is_reusable() {
        let temp = create_test_tree();
        let scanner = Scanner::new();
        let config = ScanConfig::new(temp.path());

        let first = scanner.scan(&config).unwrap();
        let second = scanner.scan(&config).unwrap();

        assert_eq!(first.stats.files, second.stats.files);
        assert_eq!(first.ranking, second.ranking);
    }
}
