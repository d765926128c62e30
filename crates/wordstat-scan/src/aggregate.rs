//! Shared aggregation state updated concurrently by the workers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use compact_str::CompactString;
use dashmap::DashMap;
use wordstat_core::{TokenCount, rank_tokens};

/// Token frequencies and file counters shared by the walker and the workers.
///
/// Every update is a single atomic read-modify-write, either on an atomic
/// counter or under the map shard lock for the token's key.
#[derive(Debug, Default)]
pub struct Aggregator {
    frequencies: DashMap<CompactString, u64>,
    files_enqueued: AtomicI64,
    files_processed: AtomicU64,
    bytes_read: AtomicU64,
    retries: AtomicU64,
}

impl Aggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `token`.
    pub fn record_token(&self, token: &str) {
        self.add_token(token, 1);
    }

    /// Add `count` occurrences of `token` in one step.
    pub fn add_token(&self, token: &str, count: u64) {
        if let Some(mut existing) = self.frequencies.get_mut(token) {
            *existing += count;
            return;
        }
        *self.frequencies.entry(CompactString::new(token)).or_insert(0) += count;
    }

    /// Commit the token counts of one fully read file.
    pub fn record_tokens(&self, tokens: HashMap<CompactString, u64>) {
        for (token, count) in tokens {
            *self.frequencies.entry(token).or_insert(0) += count;
        }
    }

    /// Adjust the enqueued-file counter, returning the new value.
    pub fn adjust_file_count(&self, delta: i64) -> i64 {
        self.files_enqueued.fetch_add(delta, Ordering::AcqRel) + delta
    }

    /// Record a successfully processed file, returning how many have been processed.
    pub fn record_file(&self, bytes: u64) -> u64 {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
        self.files_processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record a failed attempt that was requeued.
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Files enqueued minus failed attempts.
    ///
    /// May be transiently off while a retry is between its compensating
    /// decrement and its re-enqueue; exact once the workers have finished.
    pub fn files_enqueued(&self) -> u64 {
        self.files_enqueued.load(Ordering::Acquire).max(0) as u64
    }

    pub fn files_processed(&self) -> u64 {
        self.files_processed.load(Ordering::Relaxed)
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Occurrences of a token so far.
    pub fn frequency(&self, token: &str) -> Option<u64> {
        self.frequencies.get(token).map(|count| *count)
    }

    /// Number of distinct tokens seen.
    pub fn distinct_tokens(&self) -> usize {
        self.frequencies.len()
    }

    /// All tokens ranked by descending count, ties by ascending token.
    pub fn ranking(&self) -> Vec<TokenCount> {
        rank_tokens(
            self.frequencies
                .iter()
                .map(|entry| (entry.key().to_string(), *entry.value())),
        )
    }
}
