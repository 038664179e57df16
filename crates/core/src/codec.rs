//! Common shape of the byte codecs.
//!
//! A [`Codec`] turns a whole input into a whole output and back. Codecs whose
//! output is a plain sequence of fixed-size records also implement
//! [`Partitioned`], which lets the distributed layer split input on record
//! boundaries and concatenate per-rank results.

use crate::error::Result;
use crate::format;
use crate::frequency::FrequencyTable;
use crate::huffman::Codebook;
use crate::stats::{AprioriStats, EncodingStats};
use std::io::{Cursor, Read, Write};

/// Whole-buffer encoder/decoder.
pub trait Codec {
    /// Short name for logs and the command line.
    fn name(&self) -> &'static str;

    /// Encode `input`, appending to `out`.
    ///
    /// # Returns
    /// The a priori model cost, for codecs that have a model.
    fn encode_buffer(&self, input: &[u8], out: &mut Vec<u8>) -> Result<Option<AprioriStats>>;

    /// Decode `input`, appending to `out`.
    fn decode_buffer(&self, input: &[u8], out: &mut Vec<u8>) -> Result<()>;

    /// Encode a stream. The input is read into memory first.
    fn encode<R: Read, W: Write>(
        &self,
        mut input: R,
        mut output: W,
    ) -> Result<(Option<AprioriStats>, EncodingStats)>
    where
        Self: Sized,
    {
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;

        let mut encoded = Vec::new();
        let apriori = self.encode_buffer(&data, &mut encoded)?;
        output.write_all(&encoded)?;

        Ok((
            apriori,
            EncodingStats {
                input_size: data.len() as u64,
                output_size: encoded.len() as u64,
            },
        ))
    }

    /// Decode a stream.
    ///
    /// # Returns
    /// Number of bytes written.
    fn decode<R: Read, W: Write>(&self, mut input: R, mut output: W) -> Result<u64>
    where
        Self: Sized,
    {
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;

        let mut decoded = Vec::new();
        self.decode_buffer(&data, &mut decoded)?;
        output.write_all(&decoded)?;
        Ok(decoded.len() as u64)
    }
}

/// A codec whose streams split cleanly on fixed-size records.
///
/// Encoding any run of whole source records, and decoding any run of whole
/// encoded records, is independent of what surrounds it.
pub trait Partitioned: Codec {
    /// Input bytes per record on the encode side.
    fn source_record_len(&self) -> usize;

    /// Input bytes per record on the decode side.
    fn encoded_record_len(&self) -> usize;
}

/// Canonical Huffman coding with the segmented body format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Huffman;

impl Codec for Huffman {
    fn name(&self) -> &'static str {
        "huffman"
    }

    fn encode_buffer(&self, input: &[u8], out: &mut Vec<u8>) -> Result<Option<AprioriStats>> {
        let codebook = Codebook::for_table(&FrequencyTable::from_bytes(input))?;
        format::encode_with(input, &codebook, out)?;
        Ok(Some(*codebook.apriori()))
    }

    fn decode_buffer(&self, input: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let mut cursor = Cursor::new(input);
        let decoding = format::read_header(&mut cursor)?;
        if decoding.is_empty() {
            return Ok(());
        }
        let body = input
            .get(cursor.position() as usize..)
            .unwrap_or_default();
        format::decode_body(&decoding, body, out)
    }
}
