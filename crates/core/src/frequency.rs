//! Symbol frequency analysis.
//!
//! One pass over a byte stream produces a [`FrequencyTable`]: a fixed
//! 256-entry vector of occurrence counts. The fixed shape is what the
//! distributed path reduces element-wise across ranks.

use crate::error::Result;
use std::io::{ErrorKind, Read};

/// Number of distinct byte symbols.
pub const ALPHABET: usize = 256;

/// Occurrence count for every byte value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: [u64; ALPHABET],
}

impl FrequencyTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            counts: [0; ALPHABET],
        }
    }

    /// Count every byte of `reader` until end of stream.
    ///
    /// The reader is consumed; callers that want to encode the same stream
    /// afterwards must rewind it.
    ///
    /// # Errors
    /// Propagates I/O errors from the reader (interrupted reads are retried).
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut table = Self::new();
        let mut buffer = [0u8; 8192];

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            table.record_all(&buffer[..read]);
        }

        Ok(table)
    }

    /// Count every byte of an in-memory buffer.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut table = Self::new();
        table.record_all(data);
        table
    }

    /// Wrap a raw count vector (e.g., the result of an all-reduce).
    pub fn from_counts(counts: [u64; ALPHABET]) -> Self {
        Self { counts }
    }

    /// Record one occurrence of `symbol`.
    pub fn record(&mut self, symbol: u8) {
        self.counts[usize::from(symbol)] += 1;
    }

    /// Record every byte of `data`.
    pub fn record_all(&mut self, data: &[u8]) {
        for &byte in data {
            self.record(byte);
        }
    }

    /// Occurrences of `symbol`.
    pub fn count(&self, symbol: u8) -> u64 {
        self.counts[usize::from(symbol)]
    }

    /// Raw count vector, indexed by byte value.
    pub fn counts(&self) -> &[u64; ALPHABET] {
        &self.counts
    }

    /// Element-wise sum with another table.
    pub fn merge(&mut self, other: &FrequencyTable) {
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts.iter()) {
            *mine += theirs;
        }
    }

    /// Number of symbols with a non-zero count.
    pub fn distinct_symbols(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Total number of recorded symbols (the message length).
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    /// Non-zero entries in ascending symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
        (0..=u8::MAX)
            .map(move |symbol| (symbol, self.count(symbol)))
            .filter(|&(_, count)| count > 0)
    }

    /// Non-zero entries by descending count, ties by ascending symbol.
    ///
    /// This is the order the canonical builder consumes. The tie-break is
    /// fixed so every rank holding the same counts gets the same list.
    pub fn by_weight(&self) -> Vec<(u8, u64)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        entries
    }
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    #[test]
    fn test_from_bytes() {
        let table = FrequencyTable::from_bytes(b"abracadabra");

        assert_eq!(table.count(b'a'), 5);
        assert_eq!(table.count(b'b'), 2);
        assert_eq!(table.count(b'r'), 2);
        assert_eq!(table.count(b'c'), 1);
        assert_eq!(table.count(b'd'), 1);
        assert_eq!(table.count(b'z'), 0);
        assert_eq!(table.total(), 11);
        assert_eq!(table.distinct_symbols(), 5);
    }

    #[test]
    fn test_from_reader_matches_from_bytes() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i * 7 % 251) as u8).collect();
        let table = FrequencyTable::from_reader(Cursor::new(&data)).unwrap();
        assert_eq!(table, FrequencyTable::from_bytes(&data));
    }

    #[test]
    fn test_empty_stream() {
        let table = FrequencyTable::from_reader(io::empty()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.distinct_symbols(), 0);
        assert!(table.by_weight().is_empty());
    }

    #[test]
    fn test_reader_error_propagates() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(ErrorKind::Other, "disk on fire"))
            }
        }

        let result = FrequencyTable::from_reader(Broken);
        assert!(matches!(result, Err(crate::error::Error::Io(_))));
    }

    #[test]
    fn test_by_weight_breaks_ties_by_symbol() {
        let table = FrequencyTable::from_bytes(b"zzyyxw");
        assert_eq!(
            table.by_weight(),
            vec![(b'y', 2), (b'z', 2), (b'w', 1), (b'x', 1)]
        );
    }

    #[test]
    fn test_merge() {
        let mut left = FrequencyTable::from_bytes(b"aab");
        let right = FrequencyTable::from_bytes(b"bc");
        left.merge(&right);

        assert_eq!(left, FrequencyTable::from_bytes(b"aabbc"));
        assert_eq!(
            left.iter().collect::<Vec<_>>(),
            vec![(b'a', 2), (b'b', 2), (b'c', 1)]
        );
    }
}
