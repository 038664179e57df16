//! Error types for the parhuff codecs.
//!
//! Operations return structured errors rather than panicking. Conditions the
//! format treats as "nothing to decode" (a truncated header, an unmatched bit
//! run) are not errors at all; they surface as empty results.

use thiserror::Error;

/// Top-level error type for all operations in the crate.
///
/// Each variant corresponds to a specific failure domain:
/// - Bit I/O: reading bits past the end of a buffer
/// - Huffman: codebook construction or symbol lookup failures
/// - Group: collective operations that could not complete
/// - I/O: stream failures, propagated unchanged
#[derive(Debug, Error)]
pub enum Error {
    /// Bit I/O operation failed (e.g., reading past end of buffer)
    #[error("bit I/O error: {0}")]
    BitIo(#[from] BitIoError),

    /// Codebook construction or lookup error
    #[error("huffman codec error: {0}")]
    Huffman(#[from] HuffmanError),

    /// Collective operation error
    #[error("group error: {0}")]
    Group(#[from] GroupError),

    /// Stream I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bit-level I/O errors.
#[derive(Debug, Error)]
pub enum BitIoError {
    /// Attempted to read past the end of the buffer
    #[error("unexpected end of bit stream")]
    UnexpectedEof,

    /// Invalid bit count (more than 32 bits in one read)
    #[error("invalid bit count: {0}")]
    InvalidBitCount(usize),
}

/// Codebook construction and lookup errors.
#[derive(Debug, Error)]
pub enum HuffmanError {
    /// Fewer than two distinct symbols; the canonical builder needs a pair to
    /// start from
    #[error("degenerate alphabet: {symbols} distinct symbol(s), need at least 2")]
    DegenerateAlphabet { symbols: usize },

    /// A code would not fit the 24-bit pattern field of the wire record
    #[error("code length {length} exceeds maximum {max}")]
    CodeTooLong { length: usize, max: u8 },

    /// Input byte has no code in the codebook
    #[error("symbol {symbol:#04x} has no code in the codebook")]
    UnknownSymbol { symbol: u8 },

    /// Weights handed to the builder are not in descending order
    #[error("weights must be sorted in descending order (index {index})")]
    UnsortedWeights { index: usize },
}

/// Collective operation errors.
#[derive(Debug, Error)]
pub enum GroupError {
    /// A buffer handed to a collective has the wrong length
    #[error("size mismatch in {operation}: expected {expected}, got {actual}")]
    SizeMismatch {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Root rank is outside the group
    #[error("rank {rank} is outside a group of {size}")]
    RankOutOfRange { rank: usize, size: usize },

    /// Another rank panicked while holding the shared exchange
    #[error("shared exchange poisoned by a panicking rank")]
    Poisoned,

    /// A rank left the group while others were waiting in a collective
    #[error("a rank left the group before the collective completed")]
    Abandoned,

    /// A rank's thread panicked before returning its result
    #[error("rank {0} panicked")]
    RankPanicked(usize),

    /// Group must have at least one rank
    #[error("group size must be at least 1")]
    EmptyGroup,
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
