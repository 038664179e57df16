//! Byte-level run-length coding.
//!
//! Each run becomes a two-byte record `(count, byte)` with `count` in
//! `1..=255`; longer runs are split. There is no header, so any slice of
//! whole records decodes on its own.

use crate::codec::{Codec, Partitioned};
use crate::error::Result;
use crate::stats::AprioriStats;

/// Longest run a single record can hold.
pub const MAX_RUN: usize = u8::MAX as usize;

/// Bytes per encoded record.
pub const RECORD_LEN: usize = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunLength;

impl Codec for RunLength {
    fn name(&self) -> &'static str {
        "rle"
    }

    fn encode_buffer(&self, input: &[u8], out: &mut Vec<u8>) -> Result<Option<AprioriStats>> {
        let mut rest = input;
        while let Some(&byte) = rest.first() {
            let run = rest
                .iter()
                .take(MAX_RUN)
                .take_while(|&&b| b == byte)
                .count();
            out.push(run as u8);
            out.push(byte);
            rest = &rest[run..];
        }
        Ok(None)
    }

    /// A trailing odd byte is not a record and is ignored.
    fn decode_buffer(&self, input: &[u8], out: &mut Vec<u8>) -> Result<()> {
        for record in input.chunks_exact(RECORD_LEN) {
            out.extend(std::iter::repeat(record[1]).take(usize::from(record[0])));
        }
        Ok(())
    }
}

impl Partitioned for RunLength {
    fn source_record_len(&self) -> usize {
        1
    }

    fn encoded_record_len(&self) -> usize {
        RECORD_LEN
    }
}
