//! Integration tests for the parhuff codecs.
//!
//! These drive the public API end to end: frequency analysis -> codebook ->
//! header + body -> decode, single-process and across in-process groups.

use parhuff_core::{
    distributed::{decode_partitioned, encode_huffman, encode_partitioned, COORDINATOR_RANK},
    format::{decode_bytes, encode_bytes, encode_with, SEGMENT_SYMBOLS},
    Code, Codebook, Codec, FrequencyTable, GroupContext, Huffman, LocalGroup, LocalGroupConfig,
    Report, RunLength,
};
use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

/// Uniform draws from `alphabet`, like the command-line generator.
fn corpus(seed: u64, alphabet: &[u8], len: usize) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}

/// Textbook Huffman cost (sum of all merged weights) via a min-heap.
fn reference_cost(table: &FrequencyTable) -> u64 {
    let mut heap: BinaryHeap<Reverse<u64>> = table.iter().map(|(_, c)| Reverse(c)).collect();
    let mut cost = 0;
    while heap.len() > 1 {
        let Reverse(a) = heap.pop().unwrap();
        let Reverse(b) = heap.pop().unwrap();
        cost += a + b;
        heap.push(Reverse(a + b));
    }
    cost
}

fn encode_across(workers: usize, jitter_us: u64, data: &[u8]) -> Vec<u8> {
    let config = LocalGroupConfig::jittered(workers, jitter_us, 1234);
    let mut outputs = LocalGroup::run(config, |group| {
        let input = if group.rank() == COORDINATOR_RANK {
            data
        } else {
            &[][..]
        };
        let mut out = Vec::new();
        encode_huffman(group, input, &mut out)?;
        Ok(out)
    })
    .expect("group encode failed");
    outputs.swap_remove(COORDINATOR_RANK)
}

#[test]
fn test_reference_codebook_scenario() {
    let codes: BTreeMap<u8, Code> = [
        (b'a', Code::new(0b00, 2)),
        (b'b', Code::new(0b01, 2)),
        (b'c', Code::new(0b11, 2)),
        (b'd', Code::new(0b110, 3)),
        (b'e', Code::new(0b0010, 4)),
        (b'f', Code::new(0b01010, 5)),
        (b'g', Code::new(0b011010, 6)),
        (b'h', Code::new(0b111010, 6)),
    ]
    .into_iter()
    .collect();
    let book = Codebook::from_codes(codes);
    assert_eq!(book.body_size_bits(&FrequencyTable::from_bytes(b"abcdefgh")), 30);

    let mut encoded = Vec::new();
    encode_with(b"abcdefgh", &book, &mut encoded).unwrap();
    assert_eq!(decode_bytes(&encoded).unwrap(), b"abcdefgh");
}

#[test]
fn test_empty_stream_scenario() {
    let (encoded, _, _) = encode_bytes(b"").unwrap();
    assert_eq!(encoded, 0u64.to_le_bytes());
    assert!(decode_bytes(&encoded).unwrap().is_empty());
}

#[test]
fn test_all_byte_values() {
    let data: Vec<u8> = (0..=255u8).cycle().take(256 * 5 + 17).collect();
    let (encoded, apriori, _) = encode_bytes(&data).unwrap();

    assert_eq!(apriori.message_length, data.len() as u64);
    assert_eq!(decode_bytes(&encoded).unwrap(), data);
}

#[test]
fn test_report_after_encode() {
    let data = corpus(5, b"abcdefghijklmnopqrstuvwxy", 50_000);
    let mut encoded = Vec::new();
    let (apriori, stats) = Huffman.encode(&data[..], &mut encoded).unwrap();

    let report = Report::new(apriori.as_ref(), &stats);
    // 25 equiprobable symbols cost between log2(25) and log2(25) + 1 bits
    let bits = report.bits_per_symbol().unwrap();
    assert!(bits > 4.64 && bits < 5.0, "bits per symbol {bits}");
    assert!(report.compression_ratio() < 0.65);
    assert!(report.export_text().contains("input_bytes=50000"));
}

#[test]
fn test_group_encode_matches_single_process() {
    let data = corpus(17, b"abcdefghijklmnopqrstuvwxy", 4 * SEGMENT_SYMBOLS + 3_333);
    let (expected, _, _) = encode_bytes(&data).unwrap();

    for workers in [1, 2, 4] {
        let out = encode_across(workers, 0, &data);
        assert_eq!(out, expected, "{workers} workers");
    }
    assert_eq!(decode_bytes(&expected).unwrap(), data);
}

#[test]
fn test_group_encode_with_jitter() {
    let data = corpus(3, b"ACGT", 3 * SEGMENT_SYMBOLS);
    let (expected, _, _) = encode_bytes(&data).unwrap();

    let out = encode_across(3, 300, &data);
    assert_eq!(out, expected);
    assert_eq!(decode_bytes(&out).unwrap(), data);
}

#[test]
fn test_group_encode_single_symbol() {
    let data = vec![b'z'; 2 * SEGMENT_SYMBOLS + 1];
    let out = encode_across(2, 0, &data);
    assert_eq!(decode_bytes(&out).unwrap(), data);
}

#[test]
fn test_rle_across_groups() {
    let mut data = corpus(8, b"aab", 5_000);
    data.extend(std::iter::repeat(b'q').take(700));

    let mut single = Vec::new();
    RunLength.encode(&data[..], &mut single).unwrap();

    for workers in [1, 2, 4] {
        let decoded = LocalGroup::run(LocalGroupConfig::perfect(workers), |group| {
            let is_coordinator = group.rank() == COORDINATOR_RANK;
            let mut encoded = Vec::new();
            let input = if is_coordinator { &data[..] } else { &[][..] };
            encode_partitioned(group, &RunLength, input, &mut encoded)?;

            let mut decoded = Vec::new();
            let input = if is_coordinator { &single[..] } else { &[][..] };
            decode_partitioned(group, &RunLength, input, &mut decoded)?;

            let mut again = Vec::new();
            RunLength.decode(&encoded[..], &mut again)?;
            Ok((decoded, again))
        })
        .unwrap();

        let (from_single, from_group) = &decoded[COORDINATOR_RANK];
        assert_eq!(from_single, &data, "{workers} workers");
        assert_eq!(from_group, &data, "{workers} workers");
    }
}

proptest! {
    #[test]
    fn prop_round_trip(data in prop::collection::vec(any::<u8>(), 0..3_000)) {
        let (encoded, _, stats) = encode_bytes(&data).unwrap();
        prop_assert_eq!(stats.output_size, encoded.len() as u64);
        prop_assert_eq!(decode_bytes(&encoded).unwrap(), data);
    }

    #[test]
    fn prop_round_trip_small_alphabet(data in prop::collection::vec(0u8..5, 0..3_000)) {
        let (encoded, _, _) = encode_bytes(&data).unwrap();
        prop_assert_eq!(decode_bytes(&encoded).unwrap(), data);
    }

    #[test]
    fn prop_optimal_cost(data in prop::collection::vec(any::<u8>(), 2..2_000)) {
        let table = FrequencyTable::from_bytes(&data);
        prop_assume!(table.distinct_symbols() >= 2);

        let book = Codebook::from_frequencies(&table).unwrap();
        prop_assert_eq!(book.apriori().body_size_bits, reference_cost(&table));
    }

    #[test]
    fn prop_prefix_free(data in prop::collection::vec(any::<u8>(), 2..2_000)) {
        let table = FrequencyTable::from_bytes(&data);
        prop_assume!(table.distinct_symbols() >= 2);

        let book = Codebook::from_frequencies(&table).unwrap();
        let codes: Vec<Code> = book.iter().map(|(_, code)| code).collect();
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                prop_assert!(!a.is_prefix_of(*b) && !b.is_prefix_of(*a), "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn prop_order_independent(mut data in prop::collection::vec(any::<u8>(), 0..1_000), seed in any::<u64>()) {
        let forward = Codebook::for_table(&FrequencyTable::from_bytes(&data)).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for i in (1..data.len()).rev() {
            data.swap(i, rng.gen_range(0..=i));
        }
        let shuffled = Codebook::for_table(&FrequencyTable::from_bytes(&data)).unwrap();
        prop_assert_eq!(forward, shuffled);
    }
}
