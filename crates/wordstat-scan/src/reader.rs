//! Opening file contents for the workers.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Source of file contents.
///
/// Each call returns a fresh reader owned by the calling worker; dropping it
/// releases the underlying handle.
pub trait ContentReader: Send + Sync {
    /// Open the file at `path` for line-by-line reading.
    fn open(&self, path: &Path) -> io::Result<Box<dyn BufRead + Send>>;
}

/// Reads files straight from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsReader;

impl ContentReader for FsReader {
    fn open(&self, path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
        let file = File::open(path)?;
        Ok(Box::new(BufReader::new(file)))
    }
}
