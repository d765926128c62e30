//! Units of work handed from the walker to the workers.

use std::path::{Path, PathBuf};

/// A file waiting to be read, together with how often it has been tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    /// Path of the file.
    pub path: PathBuf,
    /// Number of earlier failed attempts (0 for a freshly discovered file).
    pub attempt: u32,
}

impl FileTask {
    /// Create a task for a newly discovered file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            attempt: 0,
        }
    }

    /// Build the replacement task submitted after this one failed.
    pub fn retry(&self) -> Self {
        Self {
            path: self.path.clone(),
            attempt: self.attempt + 1,
        }
    }

    /// Whether another attempt is allowed under the given cap.
    pub fn can_retry(&self, max_retries: u32) -> bool {
        self.attempt < max_retries
    }

    /// Total attempts made once the current one finishes.
    pub fn attempts(&self) -> u32 {
        self.attempt + 1
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
