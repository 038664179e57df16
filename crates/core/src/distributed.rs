//! Encoding and decoding across a group of ranks.
//!
//! All ranks run the same function. The coordinator holds the whole input;
//! the others pass an empty slice and an output they never write to.
//!
//! # Huffman Encode
//!
//! ```text
//! coordinator: plan chunk_len ──broadcast──▶ all
//! coordinator: input[..world*chunk_len] ──scatter──▶ one chunk per rank
//! every rank:  local frequencies ──all_reduce_sum──▶ global frequencies
//! every rank:  global codebook (identical everywhere), encode own chunk
//! every rank:  body sizes ──gather──▶ bodies ──gather_variable──▶ coordinator
//! coordinator: header | bodies in rank order | leftover body
//! ```
//!
//! Chunks are whole multiples of [`SEGMENT_SYMBOLS`], so every per-rank body
//! ends on a segment boundary and the concatenation is byte-identical to the
//! body a single process would produce. The coordinator folds the leftover
//! tail into its local frequencies, so the codebook covers every input byte.
//!
//! # Partitioned Codecs
//!
//! [`encode_partitioned`] and [`decode_partitioned`] run the same
//! broadcast/scatter/gather skeleton for any [`Partitioned`] codec, splitting
//! on that codec's record length.

use crate::codec::Partitioned;
use crate::error::{GroupError, Result};
use crate::format::{encode_body, write_header, SEGMENT_SYMBOLS};
use crate::frequency::{FrequencyTable, ALPHABET};
use crate::huffman::Codebook;
use crate::stats::{AprioriStats, EncodingStats};
use crate::transport::GroupContext;
use std::io::Write;
use tracing::debug;

/// Rank that owns the input and writes the output.
pub const COORDINATOR_RANK: usize = 0;

/// How an input is divided among ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// Bytes scattered to each rank
    pub chunk_len: usize,

    /// Trailing bytes processed by the coordinator alone
    pub leftover: usize,
}

impl Partition {
    /// Bytes that go through the scatter.
    pub fn scattered(&self, world: usize) -> usize {
        self.chunk_len * world
    }
}

/// Split `input_len` bytes into `world` equal chunks of whole records.
pub fn plan_partition(input_len: usize, world: usize, record_len: usize) -> Partition {
    let world = world.max(1);
    let record_len = record_len.max(1);
    let chunk_len = input_len / (world * record_len) * record_len;
    Partition {
        chunk_len,
        leftover: input_len - chunk_len * world,
    }
}

/// Broadcast the coordinator's chunk length as an 8-byte little-endian word.
fn share_chunk_len<G: GroupContext>(group: &mut G, planned: usize) -> Result<usize> {
    let mut word = if group.rank() == COORDINATOR_RANK {
        (planned as u64).to_le_bytes().to_vec()
    } else {
        Vec::new()
    };
    group.broadcast(&mut word, COORDINATOR_RANK)?;

    let bytes: [u8; 8] = word
        .as_slice()
        .try_into()
        .map_err(|_| GroupError::SizeMismatch {
            operation: "broadcast",
            expected: 8,
            actual: word.len(),
        })?;
    Ok(u64::from_le_bytes(bytes) as usize)
}

/// Agree on a partition and hand each rank its chunk.
///
/// # Returns
/// This rank's chunk and, on the coordinator, the leftover tail.
fn distribute<'a, G: GroupContext>(
    group: &mut G,
    input: &'a [u8],
    record_len: usize,
) -> Result<(Vec<u8>, &'a [u8])> {
    let world = group.size();
    let is_coordinator = group.rank() == COORDINATOR_RANK;

    let planned = if is_coordinator {
        plan_partition(input.len(), world, record_len).chunk_len
    } else {
        0
    };
    let chunk_len = share_chunk_len(group, planned)?;

    let (scattered, leftover) = if is_coordinator {
        input.split_at((chunk_len * world).min(input.len()))
    } else {
        (&[][..], &[][..])
    };
    let mut chunk = vec![0u8; chunk_len];
    group.scatter(scattered, &mut chunk, COORDINATOR_RANK)?;

    debug!(
        rank = group.rank(),
        chunk_len,
        leftover = leftover.len(),
        "received chunk"
    );
    Ok((chunk, leftover))
}

/// Sizes of the scattered part of the input and the output it produced.
fn scattered_stats(input: &[u8], leftover: &[u8], written: usize) -> EncodingStats {
    EncodingStats {
        input_size: (input.len() - leftover.len()) as u64,
        output_size: written as u64,
    }
}

/// Gather every rank's output at the coordinator, in rank order.
fn collect<G: GroupContext>(group: &mut G, local: &[u8]) -> Result<Vec<u8>> {
    let sizes = group.gather(local.len() as u64, COORDINATOR_RANK)?;
    group.gather_variable(local, &sizes, COORDINATOR_RANK)
}

/// Huffman-encode `input` across the group.
///
/// `input` is only read on the coordinator, and only the coordinator writes
/// to `output`.
///
/// # Returns
/// `Some((apriori, stats))` on the coordinator, `None` on the other ranks.
pub fn encode_huffman<G: GroupContext, W: Write>(
    group: &mut G,
    input: &[u8],
    mut output: W,
) -> Result<Option<(AprioriStats, EncodingStats)>> {
    let (chunk, leftover) = distribute(group, input, SEGMENT_SYMBOLS)?;

    let mut local = FrequencyTable::from_bytes(&chunk);
    local.merge(&FrequencyTable::from_bytes(leftover));
    let mut counts: [u64; ALPHABET] = *local.counts();
    group.all_reduce_sum(&mut counts)?;
    let codebook = Codebook::for_table(&FrequencyTable::from_counts(counts))?;

    let mut body = Vec::new();
    encode_body(&chunk, &codebook, &mut body)?;
    debug!(rank = group.rank(), body_bytes = body.len(), "encoded chunk");

    let gathered = collect(group, &body)?;
    if group.rank() != COORDINATOR_RANK {
        return Ok(None);
    }

    let header = write_header(&mut output, &codebook)?;
    output.write_all(&gathered)?;
    let tail = encode_body(leftover, &codebook, &mut output)?;

    let mut stats = scattered_stats(input, leftover, header + gathered.len());
    stats.merge(EncodingStats {
        input_size: leftover.len() as u64,
        output_size: tail,
    });
    Ok(Some((*codebook.apriori(), stats)))
}

/// Encode `input` with a record codec across the group.
///
/// # Returns
/// `Some(stats)` on the coordinator, `None` elsewhere.
pub fn encode_partitioned<G, C, W>(
    group: &mut G,
    codec: &C,
    input: &[u8],
    mut output: W,
) -> Result<Option<EncodingStats>>
where
    G: GroupContext,
    C: Partitioned,
    W: Write,
{
    let (chunk, leftover) = distribute(group, input, codec.source_record_len())?;

    let mut local = Vec::new();
    codec.encode_buffer(&chunk, &mut local)?;
    let gathered = collect(group, &local)?;
    if group.rank() != COORDINATOR_RANK {
        return Ok(None);
    }

    let mut tail = Vec::new();
    codec.encode_buffer(leftover, &mut tail)?;
    output.write_all(&gathered)?;
    output.write_all(&tail)?;

    let mut stats = scattered_stats(input, leftover, gathered.len());
    stats.merge(EncodingStats {
        input_size: leftover.len() as u64,
        output_size: tail.len() as u64,
    });
    Ok(Some(stats))
}

/// Decode `input` with a record codec across the group.
///
/// # Returns
/// `Some(bytes_written)` on the coordinator, `None` elsewhere.
pub fn decode_partitioned<G, C, W>(
    group: &mut G,
    codec: &C,
    input: &[u8],
    mut output: W,
) -> Result<Option<u64>>
where
    G: GroupContext,
    C: Partitioned,
    W: Write,
{
    let (chunk, leftover) = distribute(group, input, codec.encoded_record_len())?;

    let mut local = Vec::new();
    codec.decode_buffer(&chunk, &mut local)?;
    let gathered = collect(group, &local)?;
    if group.rank() != COORDINATOR_RANK {
        return Ok(None);
    }

    let mut tail = Vec::new();
    codec.decode_buffer(leftover, &mut tail)?;
    output.write_all(&gathered)?;
    output.write_all(&tail)?;
    Ok(Some((gathered.len() + tail.len()) as u64))
}
