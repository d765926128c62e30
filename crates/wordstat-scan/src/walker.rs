//! Single-threaded producer that streams matching files into the work queue.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use globset::GlobSet;
use jwalk::{Parallelism, WalkDir};
use tracing::{debug, error, trace, warn};

use wordstat_core::{FileTask, ScanConfig, ScanError, ScanWarning};

use crate::aggregate::Aggregator;
use crate::inode::VisitedDirs;
use crate::queue::WorkQueue;

/// What the walker found.
#[derive(Debug, Default)]
pub struct WalkSummary {
    /// Files pushed onto the queue.
    pub files_found: u64,
    /// Directories entered (including the root).
    pub dirs_visited: u64,
    /// Non-fatal traversal problems.
    pub warnings: Vec<ScanWarning>,
}

/// Raises the traversal-complete signal when dropped, even on unwind.
struct TraversalGuard<'a>(&'a WorkQueue);

impl Drop for TraversalGuard<'_> {
    fn drop(&mut self) {
        self.0.mark_traversal_complete();
    }
}

/// Recursively discovers files under the configured root.
pub struct DirectoryWalker {
    config: Arc<ScanConfig>,
    queue: Arc<WorkQueue>,
    aggregator: Arc<Aggregator>,
    ignore: GlobSet,
}

impl DirectoryWalker {
    /// Create a walker feeding `queue`.
    pub fn new(
        config: Arc<ScanConfig>,
        queue: Arc<WorkQueue>,
        aggregator: Arc<Aggregator>,
    ) -> Result<Self, ScanError> {
        let ignore = config.ignore_set()?;
        Ok(Self {
            config,
            queue,
            aggregator,
            ignore,
        })
    }

    /// Run the walk on its own thread.
    pub fn spawn(self) -> Result<JoinHandle<WalkSummary>, ScanError> {
        thread::Builder::new()
            .name("wordstat-walker".into())
            .spawn(move || self.run())
            .map_err(|source| ScanError::Spawn {
                name: "walker".into(),
                source,
            })
    }

    /// Walk the tree on the current thread.
    ///
    /// The traversal-complete signal is raised exactly once when this
    /// returns, whatever the outcome.
    pub fn run(self) -> WalkSummary {
        let _complete = TraversalGuard(&self.queue);
        let mut summary = WalkSummary::default();
        let root = self.config.root.clone();

        let metadata = match std::fs::metadata(&root) {
            Ok(m) => m,
            Err(err) => {
                error!(path = %root.display(), error = %err, "Scan root is not accessible");
                summary.warnings.push(ScanWarning::walk_error(&root, &err));
                return summary;
            }
        };

        if metadata.is_file() {
            // An explicitly named file is scanned regardless of its extension.
            self.enqueue(root, &mut summary);
        } else if metadata.is_dir() {
            self.walk_dir(&root, &mut summary);
        } else {
            warn!(path = %root.display(), "Scan root is neither a file nor a directory");
        }

        debug!(
            files = summary.files_found,
            dirs = summary.dirs_visited,
            warnings = summary.warnings.len(),
            "Traversal complete"
        );
        summary
    }

    fn walk_dir(&self, root: &Path, summary: &mut WalkSummary) {
        let visited = Arc::new(VisitedDirs::new());
        let loops = Arc::new(Mutex::new(Vec::new()));
        if self.config.follow_symlinks {
            visited.visit_path(root);
        }

        let walker = WalkDir::new(root)
            .parallelism(Parallelism::Serial)
            .sort(true)
            .skip_hidden(false)
            .follow_links(self.config.follow_symlinks)
            .min_depth(0)
            .max_depth(self.config.max_depth.map(|d| d as usize).unwrap_or(usize::MAX))
            .process_read_dir({
                let ignore = self.ignore.clone();
                let config = Arc::clone(&self.config);
                let visited = Arc::clone(&visited);
                let loops = Arc::clone(&loops);
                move |depth, _path, _state, children| {
                    // The root arrives alone in a batch without a depth; it is
                    // always walked, whatever its name.
                    if depth.is_none() {
                        return;
                    }
                    children.retain(|child| match child {
                        Ok(entry) => {
                            !ignore.is_match(&entry.file_name)
                                && !config.should_skip_hidden(&entry.file_name.to_string_lossy())
                        }
                        Err(_) => true,
                    });
                    if !config.follow_symlinks {
                        return;
                    }
                    for entry in children.iter_mut().flatten() {
                        if entry.file_type.is_dir() && !visited.visit_path(&entry.path()) {
                            entry.read_children_path = None;
                            loops
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .push(entry.path());
                        }
                    }
                }
            });

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    if err.loop_ancestor().is_some() {
                        debug!(path = %path.display(), "Skipped link back to an ancestor");
                        summary.warnings.push(ScanWarning::symlink_loop(path));
                    } else {
                        warn!(path = %path.display(), error = %err, "Failed to read directory entry");
                        summary.warnings.push(ScanWarning::walk_error(path, &err));
                    }
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                summary.dirs_visited += 1;
            } else if file_type.is_file() {
                let path = entry.path();
                if self.config.accepts_file(&path) {
                    self.enqueue(path, summary);
                } else {
                    trace!(path = %path.display(), "Skipping file with unaccepted extension");
                }
            }
        }

        let loops: Vec<PathBuf> =
            std::mem::take(&mut *loops.lock().unwrap_or_else(PoisonError::into_inner));
        for path in loops {
            debug!(path = %path.display(), "Skipped already visited directory");
            summary.warnings.push(ScanWarning::symlink_loop(path));
        }
    }

    fn enqueue(&self, path: PathBuf, summary: &mut WalkSummary) {
        self.aggregator.adjust_file_count(1);
        match self.queue.push(FileTask::new(path)) {
            Ok(()) => summary.files_found += 1,
            Err(closed) => {
                self.aggregator.adjust_file_count(-1);
                warn!(path = %closed.0.path.display(), "Work queue closed before file was queued");
            }
        }
    }
}
