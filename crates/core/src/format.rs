//! Header and body serialization.
//!
//! # Stream Format
//!
//! ```text
//! +----------------------------+
//! | alphabet_size (8)          |  u64 little-endian
//! +----------------------------+
//! | symbol (1) | code (4)      |  repeated alphabet_size times,
//! | ...                        |  ascending symbol order
//! +----------------------------+
//! | segment                    |  descriptor + codes + padding,
//! | segment                    |  each byte-aligned and holding at most
//! | ...                        |  SEGMENT_SYMBOLS symbols
//! +----------------------------+
//! ```
//!
//! # Padding Descriptor
//!
//! Every segment starts with a short descriptor telling the decoder how many
//! bits at the very end of the stream are padding. With a longest code of
//! five bits or more the descriptor is two bits wide: `0` means "no explicit
//! padding", `d` means `4 + d` padding bits. Slack that the descriptor cannot
//! express is filled with the leading bits of the longest code, which are a
//! proper prefix of a codeword and therefore never decode.
//!
//! Codebooks whose longest code is four bits or less can leave slack that is
//! neither expressible in two bits nor fillable with a prefix. They use a
//! three-bit descriptor holding the padding count directly. The decoder
//! derives the width from its decoding table, so nothing extra is stored.
//!
//! # Segments
//!
//! Bodies are cut into segments of [`SEGMENT_SYMBOLS`] symbols. A segment
//! boundary lands on a byte boundary, so bodies produced for consecutive
//! slices of the input concatenate into the body of the whole input. This
//! is what lets parallel workers encode independently.

use crate::bitio::{BitReader, BitWriter};
use crate::code::{Code, CODE_RECORD_SIZE, MAX_CODE_LENGTH};
use crate::error::{HuffmanError, Result};
use crate::frequency::FrequencyTable;
use crate::huffman::{Codebook, Decoding};
use crate::stats::{AprioriStats, EncodingStats};
use std::io::{Cursor, ErrorKind, Read, Seek, Write};
use tracing::trace;

/// Symbols per body segment.
pub const SEGMENT_SYMBOLS: usize = 10_000;

/// Size of the alphabet-size field.
const COUNT_SIZE: usize = 8;

/// Size of one header entry: symbol byte plus code record.
const ENTRY_SIZE: usize = 1 + CODE_RECORD_SIZE;

/// Serialized header size for an alphabet of `symbols` entries.
pub fn header_size(symbols: usize) -> usize {
    COUNT_SIZE + symbols * ENTRY_SIZE
}

/// Write the header for `codebook`.
///
/// # Returns
/// Number of bytes written.
pub fn write_header<W: Write>(mut out: W, codebook: &Codebook) -> Result<usize> {
    out.write_all(&(codebook.len() as u64).to_le_bytes())?;
    for (symbol, code) in codebook.iter() {
        out.write_all(&[symbol])?;
        out.write_all(&code.to_bytes())?;
    }
    Ok(header_size(codebook.len()))
}

/// Read a header and build its decoding table.
///
/// A header that ends early, or declares more than 256 symbols, yields an
/// empty table: there is nothing to decode.
///
/// # Errors
/// I/O errors other than a premature end of stream.
pub fn read_header<R: Read>(mut input: R) -> Result<Decoding> {
    let mut count = [0u8; COUNT_SIZE];
    if !read_full(&mut input, &mut count)? {
        return Ok(Decoding::new());
    }
    let symbols = u64::from_le_bytes(count);
    if symbols > 256 {
        return Ok(Decoding::new());
    }

    let mut decoding = Decoding::new();
    for _ in 0..symbols {
        let mut entry = [0u8; ENTRY_SIZE];
        if !read_full(&mut input, &mut entry)? {
            return Ok(Decoding::new());
        }
        let code = Code::from_bytes([entry[1], entry[2], entry[3], entry[4]]);
        decoding.insert(code, entry[0]);
    }
    Ok(decoding)
}

/// `read_exact`, reporting a short read as `false` instead of an error.
fn read_full<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<bool> {
    match input.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Descriptor width for a codebook whose longest code has `longest` bits.
pub fn descriptor_width(longest: u8) -> u8 {
    if longest >= 5 {
        2
    } else {
        3
    }
}

/// Descriptor for a segment costing `body_size_bits`, and the slack it must
/// absorb.
pub fn padding_descriptor(body_size_bits: u64, longest: Code) -> (Code, u8) {
    let width = descriptor_width(longest.length());
    let leftover = ((body_size_bits + u64::from(width)) % 8) as u8;
    let slack = (8 - leftover) % 8;

    let value = if width == 3 {
        slack
    } else if slack == 0 || longest.length() > slack {
        0
    } else {
        (slack - 4) & 0b11
    };
    (Code::new(u32::from(value), width), slack)
}

/// Padding bit count announced by a descriptor read off the wire.
pub fn padding_size(descriptor: Code) -> u8 {
    let value = descriptor.pattern() as u8;
    match descriptor.length() {
        2 if value == 0 => 0,
        2 => 4 + value,
        _ => value,
    }
}

/// Encode one segment: descriptor, codes, padding.
///
/// `body_size_bits` is the a priori bit cost of `symbols`. The writer must be
/// on a byte boundary and is left on one.
///
/// # Errors
/// `HuffmanError::UnknownSymbol` if a byte has no code.
pub fn encode_segment(
    symbols: &[u8],
    codebook: &Codebook,
    body_size_bits: u64,
    writer: &mut BitWriter,
) -> Result<()> {
    debug_assert_eq!(writer.pending_bits(), 0);
    let longest = codebook.longest();
    let (descriptor, slack) = padding_descriptor(body_size_bits, longest);

    writer.write_code(descriptor);
    for &symbol in symbols {
        let code = codebook
            .code(symbol)
            .ok_or(HuffmanError::UnknownSymbol { symbol })?;
        writer.write_code(code);
    }

    if writer.pending_bits() == 0 {
        return Ok(());
    }
    let needed = 8 - writer.pending_bits();
    debug_assert_eq!(needed, slack, "a priori bit count disagrees with input");
    let fill = if longest.length() > needed {
        longest.prefix(needed)
    } else {
        Code::new(0, needed)
    };
    writer.write_code(fill);
    Ok(())
}

/// Encode `input` as a sequence of segments.
///
/// Each segment's descriptor is derived from that segment's own bit cost.
///
/// # Returns
/// Number of body bytes written.
pub fn encode_body<W: Write>(input: &[u8], codebook: &Codebook, mut out: W) -> Result<u64> {
    let mut writer = BitWriter::with_capacity(input.len() / 2 + 1);

    for segment in input.chunks(SEGMENT_SYMBOLS) {
        let bits = codebook.body_size_bits(&FrequencyTable::from_bytes(segment));
        trace!(symbols = segment.len(), bits, "encoding segment");
        encode_segment(segment, codebook, bits, &mut writer)?;
    }

    let bytes = writer.finish();
    out.write_all(&bytes)?;
    Ok(bytes.len() as u64)
}

/// Write header and body for `input` under a given codebook.
pub fn encode_with<W: Write>(
    input: &[u8],
    codebook: &Codebook,
    mut out: W,
) -> Result<EncodingStats> {
    let header = write_header(&mut out, codebook)?;
    let body = encode_body(input, codebook, &mut out)?;
    Ok(EncodingStats {
        input_size: input.len() as u64,
        output_size: header as u64 + body,
    })
}

/// Encode a whole stream: frequency pass, rewind, header, body.
pub fn encode<R: Read + Seek, W: Write>(
    mut input: R,
    out: W,
) -> Result<(AprioriStats, EncodingStats)> {
    let table = FrequencyTable::from_reader(&mut input)?;
    let codebook = Codebook::for_table(&table)?;

    input.rewind()?;
    let mut data = Vec::with_capacity(table.total() as usize);
    input.read_to_end(&mut data)?;

    let stats = encode_with(&data, &codebook, out)?;
    Ok((*codebook.apriori(), stats))
}

/// Encode an in-memory buffer.
pub fn encode_bytes(data: &[u8]) -> Result<(Vec<u8>, AprioriStats, EncodingStats)> {
    let mut out = Vec::new();
    let (apriori, stats) = encode(Cursor::new(data), &mut out)?;
    Ok((out, apriori, stats))
}

/// Decode a body against `decoding`, appending symbols to `out`.
///
/// Bit runs that never match a code are dropped; a run that reaches the
/// maximum code length without matching is discarded and matching restarts.
pub fn decode_body(decoding: &Decoding, body: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let Some(longest) = decoding.keys().map(|code| code.length()).max() else {
        return Ok(());
    };
    let width = usize::from(descriptor_width(longest));
    let mut reader = BitReader::new(body);
    let total = reader.bit_len();

    while reader.bits_remaining() >= width {
        let mut descriptor = Code::EMPTY;
        for _ in 0..width {
            descriptor = descriptor.push(reader.read_bit()?);
        }
        // Only the final segment reaches the last byte, so its padding is
        // the only one this bound ever cuts.
        let end = total.saturating_sub(usize::from(padding_size(descriptor)));

        let mut current = Code::EMPTY;
        let mut emitted = 0;
        while reader.position() < end && emitted < SEGMENT_SYMBOLS {
            if current.length() == MAX_CODE_LENGTH {
                current = Code::EMPTY;
            }
            current = current.push(reader.read_bit()?);
            if let Some(&symbol) = decoding.get(&current) {
                out.push(symbol);
                current = Code::EMPTY;
                emitted += 1;
            }
        }
        reader.align_to_byte();
    }
    Ok(())
}

/// Decode a whole stream.
///
/// # Returns
/// Number of bytes written. An empty or truncated header writes nothing.
pub fn decode<R: Read, W: Write>(mut input: R, mut out: W) -> Result<u64> {
    let decoding = read_header(&mut input)?;
    if decoding.is_empty() {
        return Ok(0);
    }

    let mut body = Vec::new();
    input.read_to_end(&mut body)?;

    let mut decoded = Vec::with_capacity(body.len() * 2);
    decode_body(&decoding, &body, &mut decoded)?;
    out.write_all(&decoded)?;
    Ok(decoded.len() as u64)
}

/// Decode an in-memory buffer.
pub fn decode_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    decode(data, &mut out)?;
    Ok(out)
}
