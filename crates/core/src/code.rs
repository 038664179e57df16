//! Prefix-code value type.
//!
//! A [`Code`] is a bit pattern plus an explicit length. Bit 0 of the pattern
//! is the first bit on the wire; appending a bit with [`Code::with_zero`] or
//! [`Code::with_one`] sets position `length` and bumps the length, leaving the
//! bits already present untouched.
//!
//! # Wire Record
//!
//! ```text
//! +---------------------------+-----------+
//! | pattern (24 bits, LE)     | length(1) |
//! +---------------------------+-----------+
//! ```

use std::cmp::Ordering;
use std::fmt;

/// Longest code the 24-bit pattern field can carry.
pub const MAX_CODE_LENGTH: u8 = 24;

/// Size of one serialized code record in bytes.
pub const CODE_RECORD_SIZE: usize = 4;

/// A bit pattern of up to [`MAX_CODE_LENGTH`] bits.
///
/// # Invariants
/// - bits of `pattern` at or above `length` are zero
///
/// Equality and ordering compare `(pattern, length)` lexicographically, so
/// `0b0` of length 1 and `0b00` of length 2 are distinct codes.
#[derive(Clone, Copy, Default, Hash)]
pub struct Code {
    pattern: u32,
    length: u8,
}

fn low_mask(length: u8) -> u32 {
    1u32.checked_shl(u32::from(length))
        .map_or(u32::MAX, |bit| bit - 1)
}

impl Code {
    /// The zero-length code, starting point for every construction.
    pub const EMPTY: Code = Code {
        pattern: 0,
        length: 0,
    };

    /// Create a code from its pattern and length, clearing stray high bits.
    pub fn new(pattern: u32, length: u8) -> Self {
        Self {
            pattern: pattern & low_mask(length),
            length,
        }
    }

    pub fn pattern(self) -> u32 {
        self.pattern
    }

    pub fn length(self) -> u8 {
        self.length
    }

    pub fn is_empty(self) -> bool {
        self.length == 0
    }

    /// Append a `0` bit.
    pub fn with_zero(self) -> Self {
        debug_assert!(self.length < 32);
        Self {
            pattern: self.pattern,
            length: self.length + 1,
        }
    }

    /// Append a `1` bit.
    pub fn with_one(self) -> Self {
        debug_assert!(self.length < 32);
        Self {
            pattern: self.pattern | (1 << self.length),
            length: self.length + 1,
        }
    }

    /// Append a bit given as a bool.
    pub fn push(self, bit: bool) -> Self {
        if bit {
            self.with_one()
        } else {
            self.with_zero()
        }
    }

    /// Bits in wire order (pattern bit 0 first).
    pub fn bits(self) -> impl Iterator<Item = bool> {
        (0..self.length).map(move |i| (self.pattern >> i) & 1 == 1)
    }

    /// The first `length` bits of this code.
    pub fn prefix(self, length: u8) -> Self {
        Self::new(self.pattern, length.min(self.length))
    }

    /// True if `self` is a prefix of `other` (every code is a prefix of
    /// itself).
    pub fn is_prefix_of(self, other: Code) -> bool {
        self.length <= other.length && other.prefix(self.length) == self
    }

    /// Serialize into the 4-byte wire record.
    pub fn to_bytes(self) -> [u8; CODE_RECORD_SIZE] {
        let p = self.pattern.to_le_bytes();
        [p[0], p[1], p[2], self.length]
    }

    /// Parse a 4-byte wire record.
    pub fn from_bytes(bytes: [u8; CODE_RECORD_SIZE]) -> Self {
        let pattern = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]);
        Self::new(pattern, bytes[3])
    }
}

impl PartialEq for Code {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Code {}

impl PartialOrd for Code {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Code {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.pattern, self.length).cmp(&(other.pattern, other.length))
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code({self})")
    }
}

/// Renders the pattern most-significant bit first, the way code tables are
/// usually written down (`0b110` of length 3 prints as `110`).
impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.length == 0 {
            return f.write_str("ε");
        }
        write!(
            f,
            "{:0width$b}",
            self.pattern,
            width = usize::from(self.length)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_zero_and_one() {
        let code = Code::EMPTY.with_one().with_zero().with_one();
        assert_eq!(code, Code::new(0b101, 3));

        let code = Code::EMPTY.with_zero().with_one().with_one();
        assert_eq!(code, Code::new(0b110, 3));
        assert_eq!(code.bits().collect::<Vec<_>>(), vec![false, true, true]);
    }

    #[test]
    fn test_length_distinguishes_codes() {
        assert_ne!(Code::new(0, 1), Code::new(0, 2));
        assert!(Code::new(0, 1) < Code::new(0, 2));
        assert!(Code::new(0b01, 2) < Code::new(0b10, 2));
        assert!(Code::new(0b1, 5) < Code::new(0b10, 2));
    }

    #[test]
    fn test_new_clears_high_bits() {
        assert_eq!(Code::new(0b1111, 2), Code::new(0b11, 2));
        assert_eq!(Code::new(u32::MAX, 24).pattern(), 0x00FF_FFFF);
    }

    #[test]
    fn test_prefix() {
        let code = Code::new(0b011010, 6);
        assert!(Code::new(0b010, 3).is_prefix_of(code));
        assert!(code.is_prefix_of(code));
        assert!(!Code::new(0b110, 3).is_prefix_of(code));
        assert!(!code.is_prefix_of(Code::new(0b010, 3)));
        assert_eq!(code.prefix(2), Code::new(0b10, 2));
    }

    #[test]
    fn test_record_bytes() {
        let code = Code::new(0x12_3456, 21);
        assert_eq!(code.to_bytes(), [0x56, 0x34, 0x12, 21]);
        assert_eq!(Code::from_bytes(code.to_bytes()), code);

        let short = Code::new(0b110, 3);
        assert_eq!(short.to_bytes(), [0b110, 0, 0, 3]);
    }

    #[test]
    fn test_display() {
        assert_eq!(Code::new(0b0010, 4).to_string(), "0010");
        assert_eq!(Code::EMPTY.to_string(), "ε");
    }
}
