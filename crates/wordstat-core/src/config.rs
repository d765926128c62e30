//! Scan configuration types.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Pool size used when none is configured.
pub const DEFAULT_WORKERS: usize = 4;

/// Retry cap used when none is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Source-code extensions accepted by default.
pub const DEFAULT_EXTENSIONS: &[&str] = &["java", "py", "c", "cpp", "cc", "cs", "sql", "js", "php"];

/// Configuration for a word-frequency scan.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root path to scan (file or directory).
    pub root: PathBuf,

    /// Accepted file extensions, without the leading dot. Empty accepts every file.
    #[builder(default = "default_extensions()")]
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Glob patterns matched against entry names; matches are skipped.
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Number of worker threads (0 = one per available CPU).
    #[builder(default = "DEFAULT_WORKERS")]
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// How many times a file is requeued after a read failure.
    #[builder(default = "DEFAULT_MAX_RETRIES")]
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Follow symbolic links (with visited-directory tracking).
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Include hidden files (starting with .).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Maximum depth to traverse (None = unlimited).
    #[builder(default)]
    #[serde(default)]
    pub max_depth: Option<u32>,
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
}

/// Strip a leading dot and lowercase an extension for comparison.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            None => return Err("Root path is required".to_string()),
            _ => {}
        }

        if let Some(ref extensions) = self.extensions {
            if extensions.iter().any(|ext| normalize_extension(ext).is_empty()) {
                return Err("Extensions cannot be empty".to_string());
            }
        }

        if let Some(ref patterns) = self.ignore_patterns {
            for pattern in patterns {
                Glob::new(pattern).map_err(|e| format!("Invalid ignore pattern `{pattern}`: {e}"))?;
            }
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple config for scanning a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: default_extensions(),
            ignore_patterns: Vec::new(),
            workers: DEFAULT_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
            follow_symlinks: false,
            include_hidden: true,
            max_depth: None,
        }
    }

    /// Resolve the configured pool size to an actual thread count.
    pub fn worker_count(&self) -> usize {
        match self.workers {
            0 => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(DEFAULT_WORKERS),
            n => n,
        }
    }

    /// Check whether a discovered file passes the extension allow-list.
    pub fn accepts_file(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        self.extensions.iter().any(|allowed| normalize_extension(allowed) == ext)
    }

    /// Compile the ignore patterns into a matcher.
    pub fn ignore_set(&self) -> Result<GlobSet, ScanError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignore_patterns {
            let glob = Glob::new(pattern).map_err(|e| ScanError::InvalidConfig {
                message: format!("invalid ignore pattern `{pattern}`: {e}"),
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|e| ScanError::InvalidConfig {
            message: e.to_string(),
        })
    }

    /// Check if hidden files should be skipped.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ScanConfig::builder()
            .root("/home/user")
            .workers(8usize)
            .follow_symlinks(true)
            .build()
            .unwrap();

        assert_eq!(config.root, PathBuf::from("/home/user"));
        assert_eq!(config.workers, 8);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert!(config.follow_symlinks);
        assert_eq!(config.extensions.len(), DEFAULT_EXTENSIONS.len());
    }

    #[test]
    fn test_builder_rejects_missing_root() {
        assert!(ScanConfig::builder().build().is_err());
        assert!(ScanConfig::builder().root("").build().is_err());
    }

    #[test]
    fn test_builder_rejects_bad_glob() {
        let result = ScanConfig::builder()
            .root("/src")
            .ignore_patterns(vec!["[unclosed".to_string()])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_accepts_file() {
        let config = ScanConfig::builder()
            .root("/src")
            .extensions(vec![".RS".to_string(), "toml".to_string()])
            .build()
            .unwrap();

        assert!(config.accepts_file(Path::new("/src/main.rs")));
        assert!(config.accepts_file(Path::new("/src/LIB.RS")));
        assert!(config.accepts_file(Path::new("Cargo.toml")));
        assert!(!config.accepts_file(Path::new("/src/main.py")));
        assert!(!config.accepts_file(Path::new("/src/Makefile")));
    }

    #[test]
    fn test_empty_extensions_accept_everything() {
        let mut config = ScanConfig::new("/src");
        config.extensions.clear();
        assert!(config.accepts_file(Path::new("README")));
        assert!(config.accepts_file(Path::new("notes.txt")));
    }

    #[test]
    fn test_worker_count_auto() {
        let mut config = ScanConfig::new("/src");
        assert_eq!(config.worker_count(), DEFAULT_WORKERS);
        config.workers = 0;
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_ignore_set() {
        let config = ScanConfig::builder()
            .root("/src")
            .ignore_patterns(vec!["target".to_string(), "*.min.js".to_string()])
            .build()
            .unwrap();
        let set = config.ignore_set().unwrap();

        assert!(set.is_match("target"));
        assert!(set.is_match("app.min.js"));
        assert!(!set.is_match("app.js"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: ScanConfig = serde_json::from_str(r#"{"root": "/src"}"#).unwrap();
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert!(config.include_hidden);
        assert_eq!(config.extensions, default_extensions());
    }
}
