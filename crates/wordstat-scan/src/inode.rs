//! Visited-directory tracking for symlink loop protection.

use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use dashmap::DashSet;

/// Identity of a directory independent of the path used to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DirKey {
    /// Device and inode number (Unix).
    Inode { device: u64, inode: u64 },
    /// Canonical path, where inodes are unavailable.
    Canonical(PathBuf),
}

impl DirKey {
    /// Resolve the identity of the directory at `path`, following symlinks.
    #[cfg(unix)]
    pub fn for_dir(path: &Path) -> io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self::Inode {
            device: metadata.dev(),
            inode: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    pub fn for_dir(path: &Path) -> io::Result<Self> {
        std::fs::canonicalize(path).map(Self::Canonical)
    }
}

/// Tracks directories already descended into.
///
/// When symlinks are followed, the same directory can be reached again
/// through a link pointing at one of its ancestors. Each directory is
/// recorded the first time it is entered; later arrivals are skipped.
#[derive(Debug, Default)]
pub struct VisitedDirs {
    seen: DashSet<DirKey>,
}

impl VisitedDirs {
    /// Create a new tracker.
    pub fn new() -> Self {
        Self {
            seen: DashSet::new(),
        }
    }

    /// Record a directory. Returns `true` if this is the first visit.
    pub fn visit(&self, key: DirKey) -> bool {
        self.seen.insert(key)
    }

    /// Resolve and record the directory at `path`.
    ///
    /// Directories whose identity cannot be resolved are treated as new.
    pub fn visit_path(&self, path: &Path) -> bool {
        match DirKey::for_dir(path) {
            Ok(key) => self.visit(key),
            Err(_) => true,
        }
    }

    /// Check if a directory has been seen (without tracking).
    pub fn has_seen(&self, key: &DirKey) -> bool {
        self.seen.contains(key)
    }

    /// Get the number of directories tracked.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if no directories have been tracked.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_visit_new_key() {
        let visited = VisitedDirs::new();
        let key = DirKey::Inode {
            device: 1,
            inode: 12345,
        };

        assert!(visited.visit(key.clone()));
        assert!(!visited.visit(key.clone())); // Second time returns false
        assert!(visited.has_seen(&key));
        assert_eq!(visited.len(), 1);
    }

    #[test]
    fn test_different_devices() {
        let visited = VisitedDirs::new();
        assert!(visited.visit(DirKey::Inode { device: 1, inode: 7 }));
        assert!(visited.visit(DirKey::Inode { device: 2, inode: 7 }));
    }

    #[test]
    fn test_visit_path_same_directory_twice() {
        let temp = TempDir::new().unwrap();
        let visited = VisitedDirs::new();

        assert!(visited.visit_path(temp.path()));
        assert!(!visited.visit_path(&temp.path().join(".")));
    }
}
