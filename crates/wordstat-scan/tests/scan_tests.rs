use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::TempDir;
use wordstat_scan::{
    ContentReader, FsReader, ScanConfig, ScanError, ScanReport, Scanner, WarningKind,
};

/// Fails the first `failures` opens of every path listed, then reads normally.
struct FlakyReader {
    remaining: Mutex<HashMap<PathBuf, u32>>,
    mid_read: bool,
}

impl FlakyReader {
    fn new(paths: &[PathBuf], failures: u32, mid_read: bool) -> Self {
        let remaining = paths.iter().map(|p| (p.clone(), failures)).collect();
        Self {
            remaining: Mutex::new(remaining),
            mid_read,
        }
    }
}

impl ContentReader for FlakyReader {
    fn open(&self, path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
        let should_fail = {
            let mut remaining = self.remaining.lock().unwrap();
            match remaining.get_mut(path) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    true
                }
                _ => false,
            }
        };

        if !should_fail {
            return FsReader.open(path);
        }
        if !self.mid_read {
            return Err(io::Error::other("injected open failure"));
        }
        let data = fs::read(path)?;
        Ok(Box::new(BufReader::new(BrokenAfter { data, pos: 0 })))
    }
}

/// Yields its data, then errors instead of reporting end of file.
struct BrokenAfter {
    data: Vec<u8>,
    pos: usize,
}

impl Read for BrokenAfter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.data.len() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "injected read failure"));
        }
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

fn create_source_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    fs::create_dir_all(root.join("src/main")).unwrap();
    fs::create_dir_all(root.join("db")).unwrap();

    fs::write(
        root.join("src/main/App.java"),
        "public class App\n{\n    public static void main\n}\n",
    )
    .unwrap();
    fs::write(root.join("src/tool.py"), "import os\nprint os\n").unwrap();
    fs::write(root.join("src/lib.c"), "int add\nint sub\n").unwrap();
    fs::write(root.join("db/schema.sql"), "create table users\ncreate index\n").unwrap();
    fs::write(root.join("README.md"), "public public public\n").unwrap();

    temp
}

fn scan_with_workers(root: &Path, workers: usize) -> ScanReport {
    let config = ScanConfig::builder()
        .root(root)
        .workers(workers)
        .build()
        .unwrap();
    Scanner::new().scan(&config).unwrap()
}

#[test]
fn test_single_file_counts() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("Hello.java"), "hello world\nHELLO").unwrap();

    let report = scan_with_workers(temp.path(), 2);

    assert_eq!(report.stats.files, 1);
    assert_eq!(report.stats.lines, 2);
    assert_eq!(report.count_of("hello"), Some(1));
    assert_eq!(report.count_of("world"), Some(1));
    assert_eq!(report.count_of("HELLO"), Some(1));
    assert_eq!(report.ranking.len(), 3);
}

#[test]
fn test_file_root_counts() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("Hello.java");
    fs::write(&file, "hello world\nHELLO").unwrap();

    let report = scan_with_workers(&file, 3);

    assert_eq!(report.root, file);
    assert_eq!(report.stats.files, 1);
    assert_eq!(report.stats.lines, 2);
    assert_eq!(report.count_of("hello"), Some(1));
    assert_eq!(report.count_of("world"), Some(1));
    assert_eq!(report.count_of("HELLO"), Some(1));
    assert_eq!(report.ranking.len(), 3);
}

#[test]
fn test_empty_directory() {
    let temp = TempDir::new().unwrap();

    let report = scan_with_workers(temp.path(), 4);

    assert_eq!(report.stats.files, 0);
    assert_eq!(report.stats.lines, 0);
    assert!(report.ranking.is_empty());
    assert!(report.failures.is_empty());
}

#[test]
fn test_results_independent_of_pool_size() {
    let temp = create_source_tree();

    let single = scan_with_workers(temp.path(), 1);
    let many = scan_with_workers(temp.path(), 4);

    assert_eq!(single.stats.files, 4);
    assert_eq!(single.stats.lines, 10);
    assert_eq!(single.stats.files, many.stats.files);
    assert_eq!(single.stats.lines, many.stats.lines);
    assert_eq!(single.stats.bytes, many.stats.bytes);
    assert_eq!(single.ranking, many.ranking);
}

#[test]
fn test_extension_filter() {
    let temp = create_source_tree();

    let config = ScanConfig::builder()
        .root(temp.path())
        .extensions(vec!["py".to_string(), "sql".to_string()])
        .build()
        .unwrap();
    let report = Scanner::new().scan(&config).unwrap();

    assert_eq!(report.stats.files, 2);
    assert_eq!(report.stats.lines, 4);
    assert_eq!(report.count_of("public"), None);

    // An empty allow-list accepts every file, README included.
    let config = ScanConfig::builder()
        .root(temp.path())
        .extensions(Vec::<String>::new())
        .build()
        .unwrap();
    let report = Scanner::new().scan(&config).unwrap();

    assert_eq!(report.stats.files, 5);
    assert_eq!(report.count_of("public"), Some(5));
}

#[test]
fn test_ranking_and_tie_break() {
    let temp = create_source_tree();
    let report = scan_with_workers(temp.path(), 3);

    let top: Vec<(&str, u64)> = report
        .top(4)
        .iter()
        .map(|entry| (entry.token.as_str(), entry.count))
        .collect();
    assert_eq!(
        top,
        vec![("create", 2), ("int", 2), ("os", 2), ("public", 2)]
    );
}

#[test]
fn test_mixed_tokens_are_not_counted() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("mixed.js"),
        "var x1 = foo(bar);\nlet ok_name = done\n\tdone  again\n",
    )
    .unwrap();

    let report = scan_with_workers(temp.path(), 2);

    assert_eq!(report.stats.lines, 3);
    assert_eq!(report.count_of("var"), Some(1));
    assert_eq!(report.count_of("let"), Some(1));
    assert_eq!(report.count_of("done"), Some(2));
    assert_eq!(report.count_of("again"), Some(1));
    assert_eq!(report.count_of("x1"), None);
    assert_eq!(report.count_of("foo(bar);"), None);
    assert_eq!(report.count_of("ok_name"), None);
    assert_eq!(report.count_of("="), None);
}

#[test]
fn test_transient_open_failure_matches_clean_run() {
    let temp = create_source_tree();
    let clean = scan_with_workers(temp.path(), 2);

    let flaky_paths = vec![
        temp.path().join("src/lib.c"),
        temp.path().join("db/schema.sql"),
    ];
    let config = ScanConfig::builder()
        .root(temp.path())
        .workers(2usize)
        .build()
        .unwrap();
    let report = Scanner::with_reader(FlakyReader::new(&flaky_paths, 1, false))
        .scan(&config)
        .unwrap();

    assert_eq!(report.stats.files, clean.stats.files);
    assert_eq!(report.stats.lines, clean.stats.lines);
    assert_eq!(report.ranking, clean.ranking);
    assert_eq!(report.stats.retries, 2);
    assert!(report.failures.is_empty());
}

#[test]
fn test_failure_mid_read_commits_nothing() {
    let temp = create_source_tree();
    let clean = scan_with_workers(temp.path(), 3);

    let flaky_paths = vec![temp.path().join("src/main/App.java")];
    let config = ScanConfig::builder()
        .root(temp.path())
        .workers(3usize)
        .build()
        .unwrap();
    let report = Scanner::with_reader(FlakyReader::new(&flaky_paths, 1, true))
        .scan(&config)
        .unwrap();

    assert_eq!(report.stats.lines, clean.stats.lines);
    assert_eq!(report.stats.bytes, clean.stats.bytes);
    assert_eq!(report.count_of("public"), Some(2));
    assert_eq!(report.ranking, clean.ranking);
}

#[test]
fn test_permanent_failure_terminates() {
    let temp = create_source_tree();
    let broken = temp.path().join("src/tool.py");

    let config = ScanConfig::builder()
        .root(temp.path())
        .workers(4usize)
        .max_retries(2u32)
        .build()
        .unwrap();
    let report = Scanner::with_reader(FlakyReader::new(&[broken.clone()], u32::MAX, false))
        .scan(&config)
        .unwrap();

    assert_eq!(report.stats.files, 3);
    assert_eq!(report.stats.lines, 8);
    assert_eq!(report.stats.retries, 2);
    assert_eq!(report.count_of("import"), None);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, broken);
    assert_eq!(report.failures[0].kind, WarningKind::RetryExhausted);
    assert!(report.has_failures());
}

#[test]
fn test_missing_root() {
    let temp = TempDir::new().unwrap();
    let config = ScanConfig::new(temp.path().join("does-not-exist"));

    let result = Scanner::new().scan(&config);

    assert!(matches!(result, Err(ScanError::NotFound { .. })));
}

#[test]
fn test_progress_subscription() {
    let temp = create_source_tree();
    let scanner = Scanner::new();
    let mut progress_rx = scanner.subscribe();

    let report = scanner.scan(&ScanConfig::new(temp.path())).unwrap();

    let mut last = None;
    while let Ok(progress) = progress_rx.try_recv() {
        last = Some(progress);
    }
    let last = last.expect("final progress snapshot");
    assert_eq!(last.files_processed, report.stats.files);
    assert_eq!(last.files_enqueued, report.stats.files);
    assert_eq!(last.bytes_read, report.stats.bytes);
}

#[test]
fn test_skip_hidden_under_dotted_root() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join(".workspace").join("project");
    fs::create_dir_all(root.join(".git")).unwrap();
    fs::write(root.join("main.c"), "int main\n").unwrap();
    fs::write(root.join(".hook.py"), "import os\n").unwrap();
    fs::write(root.join(".git/config.py"), "import sys\n").unwrap();

    let config = ScanConfig::builder()
        .root(&root)
        .include_hidden(false)
        .build()
        .unwrap();
    let report = Scanner::new().scan(&config).unwrap();

    assert_eq!(report.stats.files, 1);
    assert_eq!(report.count_of("main"), Some(1));
    assert_eq!(report.count_of("import"), None);
}

#[test]
fn test_skip_hidden_with_dot_root() {
    // Integration tests run from the package directory.
    let config = ScanConfig::builder()
        .root(".")
        .extensions(vec!["rs".to_string()])
        .include_hidden(false)
        .build()
        .unwrap();
    let report = Scanner::new().scan(&config).unwrap();

    assert!(report.stats.files > 0);
    assert!(report.count_of("fn").is_some());
}

#[test]
fn test_ignore_glob_matching_root_name() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("build");
    fs::create_dir_all(root.join("build")).unwrap();
    fs::write(root.join("keep.js"), "var kept\n").unwrap();
    fs::write(root.join("build/out.js"), "var generated\n").unwrap();

    let config = ScanConfig::builder()
        .root(&root)
        .ignore_patterns(vec!["build".to_string()])
        .build()
        .unwrap();
    let report = Scanner::new().scan(&config).unwrap();

    assert_eq!(report.stats.files, 1);
    assert_eq!(report.count_of("kept"), Some(1));
    assert_eq!(report.count_of("generated"), None);
}

#[cfg(unix)]
#[test]
fn test_follow_symlinks() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    let outside = temp.path().join("outside");
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::create_dir_all(&outside).unwrap();
    fs::write(root.join("a.c"), "int alpha\n").unwrap();
    fs::write(root.join("sub/b.py"), "import beta\n").unwrap();
    fs::write(outside.join("c.js"), "var gamma\n").unwrap();
    std::os::unix::fs::symlink(&outside, root.join("ext")).unwrap();
    std::os::unix::fs::symlink(&root, root.join("sub/up")).unwrap();

    let unfollowed = scan_with_workers(&root, 2);
    assert_eq!(unfollowed.stats.files, 2);
    assert_eq!(unfollowed.count_of("gamma"), None);

    let config = ScanConfig::builder()
        .root(&root)
        .workers(2usize)
        .follow_symlinks(true)
        .build()
        .unwrap();
    let report = Scanner::new().scan(&config).unwrap();

    assert_eq!(report.stats.files, 3);
    assert_eq!(report.count_of("alpha"), Some(1));
    assert_eq!(report.count_of("beta"), Some(1));
    assert_eq!(report.count_of("gamma"), Some(1));
    let loops: Vec<_> = report
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::SymlinkLoop)
        .collect();
    assert_eq!(loops.len(), 1);
    assert_eq!(loops[0].path, root.join("sub/up"));
}
