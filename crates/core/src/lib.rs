//! parhuff-core: canonical Huffman coding that parallelizes across ranks
//!
//! This library provides:
//! - A deterministic canonical Huffman builder: equal frequency tables give
//!   bit-identical codebooks on every rank, with no codebook exchange
//! - A self-describing stream format (header + segmented, bit-packed body)
//! - A distributed encode protocol over a small set of collectives, with an
//!   in-process implementation on threads
//! - A run-length sibling codec sharing the same partitioned protocol
//!
//! # Architecture
//!
//! - `code`: the (pattern, length) code value and its 4-byte wire record
//! - `bitio`: bit-level reading/writing
//! - `frequency`: byte frequency tables
//! - `huffman`: canonical code construction and codebooks
//! - `format`: header and body serialization
//! - `codec`: the whole-buffer codec trait and its Huffman adapter
//! - `rle`: run-length codec
//! - `transport`: collective operations and the in-process group
//! - `distributed`: encode/decode protocols over a group
//! - `stats`: a priori and measured sizes, compression report
//!
//! # Design Principles
//!
//! - **No panics**: All errors are structured and recoverable
//! - **Deterministic**: Tie-breaking and seeded randomness make runs reproducible
//! - **Format-stable**: Any number of ranks produces the single-process bytes

pub mod bitio;
pub mod code;
pub mod codec;
pub mod distributed;
pub mod error;
pub mod format;
pub mod frequency;
pub mod huffman;
pub mod rle;
pub mod stats;
pub mod transport;

// Re-export commonly used types
pub use code::Code;
pub use codec::{Codec, Huffman, Partitioned};
pub use error::{Error, Result};
pub use frequency::FrequencyTable;
pub use huffman::{Codebook, Decoding};
pub use rle::RunLength;
pub use stats::{AprioriStats, EncodingStats, Report};
pub use transport::{GroupContext, LocalGroup, LocalGroupConfig};
