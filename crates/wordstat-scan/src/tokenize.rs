//! Line splitting and token filtering.

use std::collections::HashMap;
use std::io::{self, BufRead};

use compact_str::CompactString;

/// Check whether a token consists solely of ASCII letters.
pub fn is_word(token: &[u8]) -> bool {
    !token.is_empty() && token.iter().all(u8::is_ascii_alphabetic)
}

/// Whitespace-delimited tokens of a line that are made of ASCII letters only.
pub fn words(line: &[u8]) -> impl Iterator<Item = &str> {
    line.split(u8::is_ascii_whitespace)
        .filter(|token| is_word(token))
        // all-ASCII slices are always valid UTF-8
        .filter_map(|token| std::str::from_utf8(token).ok())
}

/// Counts gathered from one file before they are committed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileTally {
    /// Newline-delimited lines, including a final unterminated one.
    pub lines: u64,
    /// Bytes consumed.
    pub bytes: u64,
    /// Per-token occurrences within this file.
    pub tokens: HashMap<CompactString, u64>,
}

impl FileTally {
    /// Read a whole stream line by line and tally it.
    ///
    /// Lines are read as raw bytes, so files that are not valid UTF-8 are
    /// still counted; only their all-letter tokens reach the tally.
    pub fn read_from<R: BufRead>(mut reader: R) -> io::Result<Self> {
        let mut tally = Self::default();
        let mut line = Vec::with_capacity(256);

        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line)?;
            if read == 0 {
                break;
            }
            tally.lines += 1;
            tally.bytes += read as u64;
            for word in words(&line) {
                *tally.tokens.entry(CompactString::new(word)).or_insert(0) += 1;
            }
        }

        Ok(tally)
    }

    /// Occurrences of a token in this file.
    pub fn count_of(&self, token: &str) -> u64 {
        self.tokens.get(token).copied().unwrap_or(0)
    }
}
