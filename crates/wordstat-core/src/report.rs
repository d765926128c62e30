//! Scan results: counters, token ranking and the final report.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::error::ScanWarning;

/// A token and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCount {
    pub token: String,
    pub count: u64,
}

impl TokenCount {
    pub fn new(token: impl Into<String>, count: u64) -> Self {
        Self {
            token: token.into(),
            count,
        }
    }
}

/// Ranking order: highest count first, ties broken by ascending token bytes.
pub fn compare_ranked(a: &TokenCount, b: &TokenCount) -> Ordering {
    b.count.cmp(&a.count).then_with(|| a.token.cmp(&b.token))
}

/// Rank token counts from most to least frequent.
pub fn rank_tokens<I, S>(counts: I) -> Vec<TokenCount>
where
    I: IntoIterator<Item = (S, u64)>,
    S: Into<String>,
{
    let mut ranking: Vec<TokenCount> = counts
        .into_iter()
        .map(|(token, count)| TokenCount::new(token, count))
        .collect();
    ranking.sort_by(compare_ranked);
    ranking
}

/// Summary counters for a finished scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Files read successfully.
    pub files: u64,
    /// Newline-delimited lines across those files.
    pub lines: u64,
    /// Bytes read from those files.
    pub bytes: u64,
    /// Failed attempts that were requeued.
    pub retries: u64,
    /// Number of distinct all-letter tokens.
    pub distinct_tokens: u64,
    /// Wall-clock duration of the scan.
    pub elapsed: Duration,
}

impl ScanStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Elapsed time in whole milliseconds.
    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }

    /// Throughput in files per second.
    pub fn files_per_second(&self) -> f64 {
        per_second(self.files, self.elapsed)
    }

    /// Throughput in lines per second.
    pub fn lines_per_second(&self) -> f64 {
        per_second(self.lines, self.elapsed)
    }
}

fn per_second(count: u64, elapsed: Duration) -> f64 {
    if elapsed.as_secs_f64() > 0.0 {
        count as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    }
}

/// Complete result of one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// Root path that was scanned.
    pub root: PathBuf,

    /// When this scan finished.
    pub scanned_at: SystemTime,

    /// Summary statistics.
    pub stats: ScanStats,

    /// Every counted token, ranked.
    pub ranking: Vec<TokenCount>,

    /// Files that could not be read within the retry cap.
    pub failures: Vec<ScanWarning>,

    /// Problems encountered while walking the tree.
    pub warnings: Vec<ScanWarning>,
}

impl ScanReport {
    /// Create a new report.
    pub fn new(
        root: PathBuf,
        stats: ScanStats,
        ranking: Vec<TokenCount>,
        failures: Vec<ScanWarning>,
        warnings: Vec<ScanWarning>,
    ) -> Self {
        Self {
            root,
            scanned_at: SystemTime::now(),
            stats,
            ranking,
            failures,
            warnings,
        }
    }

    /// The `n` most frequent tokens.
    pub fn top(&self, n: usize) -> &[TokenCount] {
        &self.ranking[..n.min(self.ranking.len())]
    }

    /// Occurrences of a token, if it was counted at all.
    pub fn count_of(&self, token: &str) -> Option<u64> {
        self.ranking
            .iter()
            .find(|entry| entry.token == token)
            .map(|entry| entry.count)
    }

    /// Check whether any file was given up on.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}
