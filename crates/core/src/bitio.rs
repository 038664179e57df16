//! Bit-level I/O for the encoded body.
//!
//! Bytes are filled most-significant bit first. Codes are written in wire
//! order, pattern bit 0 first, so the first bit of a code lands in the
//! highest free position of the current byte.
//!
//! # Padding Rules
//! - BitWriter: [`BitWriter::finish`] pads an incomplete byte with trailing
//!   zeros; the body encoder pads explicitly before that happens
//! - BitReader: caller decides how many trailing bits are padding
//!
//! # Example
//! ```
//! use parhuff_core::bitio::{BitReader, BitWriter};
//! use parhuff_core::code::Code;
//!
//! let mut writer = BitWriter::new();
//! writer.write_code(Code::new(0b110, 3)); // bits 0, 1, 1
//! writer.write_code(Code::new(0b01, 2));  // bits 1, 0
//! let bytes = writer.finish();
//! assert_eq!(bytes, vec![0b0111_0000]);
//!
//! let mut reader = BitReader::new(&bytes);
//! assert_eq!(reader.read_bits(5).unwrap(), 0b01110);
//! ```

use crate::code::Code;
use crate::error::{BitIoError, Result};

/// Accumulates bits MSB-first into a byte buffer.
///
/// # Invariants
/// - `bit_count` is always < 8
/// - unused low bits of `bit_buffer` are zero
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    /// Completed bytes
    bytes: Vec<u8>,
    /// Accumulator for the current partial byte
    bit_buffer: u8,
    /// Number of bits in bit_buffer (0-7)
    bit_count: u8,
}

impl BitWriter {
    /// Create a new BitWriter with empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with room for `bytes` output bytes.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            ..Self::default()
        }
    }

    /// Write a single bit.
    pub fn write_bit(&mut self, bit: bool) {
        self.bit_buffer |= u8::from(bit) << (7 - self.bit_count);
        self.bit_count += 1;

        if self.bit_count == 8 {
            self.bytes.push(self.bit_buffer);
            self.bit_buffer = 0;
            self.bit_count = 0;
        }
    }

    /// Write every bit of `code` in wire order.
    pub fn write_code(&mut self, code: Code) {
        for bit in code.bits() {
            self.write_bit(bit);
        }
    }

    /// Bits waiting in the accumulator (0-7).
    pub fn pending_bits(&self) -> u8 {
        self.bit_count
    }

    /// Return the number of complete bytes written so far.
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Return the total number of bits written (including partial byte).
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8 + self.bit_count as usize
    }

    /// Finish writing and return the output bytes.
    ///
    /// A partial byte is flushed with its unused bits zeroed.
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            self.bytes.push(self.bit_buffer);
        }
        self.bytes
    }
}

/// Reads bits MSB-first from a byte buffer.
///
/// # Invariants
/// - `bit_position` never exceeds `data.len() * 8`
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    /// Source data
    data: &'a [u8],
    /// Current bit position (0 = MSB of first byte)
    bit_position: usize,
}

impl<'a> BitReader<'a> {
    /// Create a new BitReader for the given data.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            bit_position: 0,
        }
    }

    /// Read a single bit.
    ///
    /// # Errors
    /// `BitIoError::UnexpectedEof` once the buffer is exhausted.
    pub fn read_bit(&mut self) -> Result<bool> {
        let byte = self
            .data
            .get(self.bit_position / 8)
            .ok_or(BitIoError::UnexpectedEof)?;
        let bit = (byte >> (7 - self.bit_position % 8)) & 1 == 1;
        self.bit_position += 1;
        Ok(bit)
    }

    /// Read up to 32 bits, first bit read ends up most significant.
    ///
    /// # Errors
    /// - `BitIoError::InvalidBitCount` if count > 32
    /// - `BitIoError::UnexpectedEof` if not enough bits remain
    pub fn read_bits(&mut self, count: usize) -> Result<u32> {
        if count > 32 {
            return Err(BitIoError::InvalidBitCount(count).into());
        }
        if count > self.bits_remaining() {
            return Err(BitIoError::UnexpectedEof.into());
        }

        let mut value = 0u32;
        for _ in 0..count {
            value = (value << 1) | u32::from(self.read_bit()?);
        }
        Ok(value)
    }

    /// Skip the rest of the current byte. No-op on a byte boundary.
    pub fn align_to_byte(&mut self) {
        self.bit_position = self.bit_position.div_ceil(8) * 8;
    }

    /// Return the number of bits remaining in the buffer.
    pub fn bits_remaining(&self) -> usize {
        self.data.len() * 8 - self.bit_position
    }

    /// Return the current bit position.
    pub fn position(&self) -> usize {
        self.bit_position
    }

    /// Total bits in the underlying buffer.
    pub fn bit_len(&self) -> usize {
        self.data.len() * 8
    }

    /// Check if we're at the end of the buffer.
    pub fn is_empty(&self) -> bool {
        self.bit_position >= self.data.len() * 8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_bits_msb_first() {
        let mut writer = BitWriter::new();
        for &bit in &[true, false, true, true, false, false, true, false] {
            writer.write_bit(bit);
        }
        assert_eq!(writer.pending_bits(), 0);
        assert_eq!(writer.finish(), vec![0b1011_0010]);
    }

    #[test]
    fn test_code_written_low_bit_first() {
        let mut writer = BitWriter::new();
        writer.write_code(Code::new(0b0010, 4)); // wire order 0, 1, 0, 0
        writer.write_code(Code::new(0b1111, 4));
        assert_eq!(writer.finish(), vec![0b0100_1111]);
    }

    #[test]
    fn test_partial_byte_padding() {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        assert_eq!(writer.pending_bits(), 1);
        assert_eq!(writer.bit_len(), 1);
        assert_eq!(writer.byte_len(), 0);
        assert_eq!(writer.finish(), vec![0b1000_0000]);
    }

    #[test]
    fn test_code_across_byte_boundary() {
        let mut writer = BitWriter::new();
        writer.write_code(Code::new(0, 6));
        writer.write_code(Code::new(0b1111, 4));
        assert_eq!(writer.bit_len(), 10);
        assert_eq!(writer.finish(), vec![0b0000_0011, 0b1100_0000]);
    }

    #[test]
    fn test_read_bits() {
        let data = [0b1011_0010, 0xFF];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert!(reader.read_bit().unwrap());
        assert_eq!(reader.position(), 4);
        assert_eq!(reader.bits_remaining(), 12);
        assert_eq!(reader.read_bits(0).unwrap(), 0);
    }

    #[test]
    fn test_align_to_byte() {
        let data = [0x00, 0xFF];
        let mut reader = BitReader::new(&data);

        reader.align_to_byte();
        assert_eq!(reader.position(), 0);

        reader.read_bit().unwrap();
        reader.align_to_byte();
        assert_eq!(reader.position(), 8);
        assert!(reader.read_bit().unwrap());
    }

    #[test]
    fn test_read_past_end() {
        let data = [0b1010_1010];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_bits(8).unwrap(), 0b1010_1010);
        assert!(reader.is_empty());
        assert!(reader.read_bit().is_err());
        assert!(reader.read_bits(1).is_err());
    }

    #[test]
    fn test_invalid_bit_count() {
        let data = [0u8; 8];
        let mut reader = BitReader::new(&data);
        assert!(matches!(
            reader.read_bits(33),
            Err(crate::error::Error::BitIo(BitIoError::InvalidBitCount(33)))
        ));
    }
}
