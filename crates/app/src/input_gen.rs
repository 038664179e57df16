//! Synthetic corpus generation.
//!
//! Every rank draws symbols uniformly from a shared alphabet and the
//! coordinator gathers the pieces in rank order. With a 25-letter alphabet
//! this gives a near-flat distribution whose Huffman cost sits just above
//! log2(25) bits per symbol.

use crate::config::MAX_ALPHABET;
use parhuff_core::distributed::COORDINATOR_RANK;
use parhuff_core::transport::GroupContext;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io;
use tracing::debug;

/// Alphabet used when stdin is empty.
pub const DEFAULT_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxy";

/// Validate the alphabet read from stdin.
///
/// A single trailing newline is dropped; empty input selects
/// [`DEFAULT_ALPHABET`].
pub fn parse_alphabet(raw: &[u8]) -> io::Result<Vec<u8>> {
    let trimmed = raw.strip_suffix(b"\n").unwrap_or(raw);
    if trimmed.is_empty() {
        return Ok(DEFAULT_ALPHABET.to_vec());
    }
    if trimmed.len() > MAX_ALPHABET {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "alphabet has {} symbols, at most {MAX_ALPHABET} allowed",
                trimmed.len()
            ),
        ));
    }
    Ok(trimmed.to_vec())
}

/// Draw `count` symbols uniformly from `alphabet`.
pub fn generate_symbols(rng: &mut ChaCha8Rng, alphabet: &[u8], count: usize) -> Vec<u8> {
    if alphabet.is_empty() {
        return Vec::new();
    }
    (0..count)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}

/// Generate `symbols_per_rank` symbols on every rank and gather them.
///
/// The coordinator's `alphabet` is broadcast; other ranks may pass an empty
/// slice. Rank `r` draws from stream `r` of a ChaCha8 generator seeded with
/// `seed`, so the corpus depends only on the seed and the group size.
///
/// # Returns
/// The whole corpus on the coordinator, an empty vector elsewhere.
pub fn generate_corpus<G: GroupContext>(
    group: &mut G,
    alphabet: &[u8],
    symbols_per_rank: usize,
    seed: u64,
) -> parhuff_core::Result<Vec<u8>> {
    let mut shared = if group.rank() == COORDINATOR_RANK {
        alphabet.to_vec()
    } else {
        Vec::new()
    };
    group.broadcast(&mut shared, COORDINATOR_RANK)?;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(group.rank() as u64);
    let piece = generate_symbols(&mut rng, &shared, symbols_per_rank);
    debug!(rank = group.rank(), symbols = piece.len(), "generated piece");

    let sizes = group.gather(piece.len() as u64, COORDINATOR_RANK)?;
    group.gather_variable(&piece, &sizes, COORDINATOR_RANK)
}
