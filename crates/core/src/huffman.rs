//! Canonical Huffman code construction.
//!
//! # Algorithm
//!
//! Weights come in sorted descending. Repeatedly pop the two smallest
//! (the tail), and insert their sum after every weight that is `>=` it,
//! recording the insertion index. Once two weights remain they get the codes
//! `0` and `1`. Then unwind the recorded indices in reverse: remove the code
//! at the index, append its `0` and `1` children to the end of the list.
//!
//! Because the sorted order and every insertion index are fixed by the
//! weights alone, two processes holding equal frequency tables derive
//! bit-identical codebooks without talking to each other. The resulting code
//! lengths are those of textbook Huffman coding.

use crate::code::{Code, MAX_CODE_LENGTH};
use crate::error::{HuffmanError, Result};
use crate::frequency::FrequencyTable;
use crate::stats::AprioriStats;
use std::collections::BTreeMap;
use tracing::debug;

/// Inverse of a codebook: code to symbol.
pub type Decoding = BTreeMap<Code, u8>;

/// Build codes for `weights`, which must be sorted in descending order.
///
/// The returned codes are index-aligned with `weights`.
///
/// # Errors
/// - `HuffmanError::DegenerateAlphabet` for fewer than two weights
/// - `HuffmanError::UnsortedWeights` if the input is not descending
/// - `HuffmanError::CodeTooLong` if any code would exceed 24 bits
pub fn canonical_codes(weights: &[u64]) -> Result<Vec<Code>> {
    if weights.len() < 2 {
        return Err(HuffmanError::DegenerateAlphabet {
            symbols: weights.len(),
        }
        .into());
    }
    if let Some(index) = weights.windows(2).position(|w| w[0] < w[1]) {
        return Err(HuffmanError::UnsortedWeights { index: index + 1 }.into());
    }

    // Reduce: each step merges the tail pair and remembers where the sum went.
    let mut working = weights.to_vec();
    let mut splits = Vec::with_capacity(weights.len() - 2);
    while working.len() > 2 {
        let tail = working.len() - 2;
        let merged = working[tail].saturating_add(working[tail + 1]);
        working.truncate(tail);
        let at = working.partition_point(|&w| w >= merged);
        working.insert(at, merged);
        splits.push(at);
    }

    // Unwind: split the merged entry's code into its two children.
    let mut codes = Vec::with_capacity(weights.len());
    codes.push(Code::EMPTY.with_zero());
    codes.push(Code::EMPTY.with_one());
    while let Some(at) = splits.pop() {
        let parent = codes.remove(at);
        if parent.length() >= MAX_CODE_LENGTH {
            return Err(HuffmanError::CodeTooLong {
                length: usize::from(parent.length()) + 1,
                max: MAX_CODE_LENGTH,
            }
            .into());
        }
        codes.push(parent.with_zero());
        codes.push(parent.with_one());
    }

    Ok(codes)
}

/// Symbol-to-code mapping for one encoding session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codebook {
    codes: BTreeMap<u8, Code>,
    apriori: AprioriStats,
    longest: Code,
}

impl Codebook {
    /// Build the canonical codebook for a table with at least two symbols.
    ///
    /// # Errors
    /// See [`canonical_codes`].
    pub fn from_frequencies(table: &FrequencyTable) -> Result<Self> {
        let entries = table.by_weight();
        let weights: Vec<u64> = entries.iter().map(|&(_, count)| count).collect();
        let codes = canonical_codes(&weights)?;

        let mut apriori = AprioriStats::default();
        for (&(_, count), &code) in entries.iter().zip(codes.iter()) {
            apriori.body_size_bits += count * u64::from(code.length());
            apriori.message_length += count;
        }
        // The least frequent symbol always sits at the deepest level.
        let longest = codes.last().copied().unwrap_or(Code::EMPTY);

        debug!(
            symbols = entries.len(),
            longest = longest.length(),
            body_bits = apriori.body_size_bits,
            "built canonical codebook"
        );

        Ok(Self {
            codes: entries.iter().map(|&(s, _)| s).zip(codes).collect(),
            apriori,
            longest,
        })
    }

    /// Codebook for any table, including the degenerate ones the builder
    /// rejects: no symbols gives an empty codebook, a single symbol gets the
    /// one-bit code `0`.
    pub fn for_table(table: &FrequencyTable) -> Result<Self> {
        let entries = table.by_weight();
        match entries.as_slice() {
            [] => Ok(Self::from_codes(BTreeMap::new())),
            [(symbol, count)] => {
                let code = Code::EMPTY.with_zero();
                Ok(Self {
                    codes: BTreeMap::from([(*symbol, code)]),
                    apriori: AprioriStats {
                        body_size_bits: *count,
                        message_length: *count,
                    },
                    longest: code,
                })
            }
            _ => Self::from_frequencies(table),
        }
    }

    /// Wrap an explicit code table. Apriori stats are unknown and left zero.
    ///
    /// Without weights, the padding code is the first code of maximal length
    /// in symbol order.
    pub fn from_codes(codes: BTreeMap<u8, Code>) -> Self {
        let longest = codes
            .values()
            .copied()
            .fold(Code::EMPTY, |best, code| {
                if code.length() > best.length() {
                    code
                } else {
                    best
                }
            });
        Self {
            codes,
            apriori: AprioriStats::default(),
            longest,
        }
    }

    pub fn code(&self, symbol: u8) -> Option<Code> {
        self.codes.get(&symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Entries in ascending symbol order (the header order).
    pub fn iter(&self) -> impl Iterator<Item = (u8, Code)> + '_ {
        self.codes.iter().map(|(&s, &c)| (s, c))
    }

    /// Code of the least frequent symbol (last in weight order), which has
    /// maximal length; used to fill trailing padding.
    pub fn longest(&self) -> Code {
        self.longest
    }

    pub fn apriori(&self) -> &AprioriStats {
        &self.apriori
    }

    /// Bit cost of encoding the symbols counted in `table` with this
    /// codebook. Symbols without a code contribute nothing.
    pub fn body_size_bits(&self, table: &FrequencyTable) -> u64 {
        table
            .iter()
            .filter_map(|(symbol, count)| {
                self.code(symbol).map(|c| count * u64::from(c.length()))
            })
            .sum()
    }

    /// Build the decoding table.
    pub fn decoding(&self) -> Decoding {
        self.codes.iter().map(|(&s, &c)| (c, s)).collect()
    }
}
