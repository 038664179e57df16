//! Encoding statistics and the compression report.
//!
//! Two figures are collected per run:
//! - [`AprioriStats`]: the theoretical cost of the body, known as soon as the
//!   codebook exists
//! - [`EncodingStats`]: bytes actually read and written
//!
//! [`Report`] turns them into the numbers printed after an encode. It never
//! feeds back into encoding.

use std::io::{self, Write};

/// Theoretical body cost, computed from the codebook before encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AprioriStats {
    /// Σ count × code length over the alphabet
    pub body_size_bits: u64,

    /// Σ count, i.e. the number of symbols in the message
    pub message_length: u64,
}

/// Measured sizes of one encode run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodingStats {
    /// Bytes consumed from the input
    pub input_size: u64,

    /// Bytes written to the output, header included
    pub output_size: u64,
}

impl EncodingStats {
    /// Accumulate another run's sizes into this one.
    pub fn merge(&mut self, other: EncodingStats) {
        self.input_size += other.input_size;
        self.output_size += other.output_size;
    }
}

/// Human-readable compression figures derived from the stats.
#[derive(Debug, Clone, Copy)]
pub struct Report {
    apriori: Option<AprioriStats>,
    encoding: EncodingStats,
}

impl Report {
    /// Build a report. `apriori` is absent for codecs without a model (RLE).
    pub fn new(apriori: Option<&AprioriStats>, encoding: &EncodingStats) -> Self {
        Self {
            apriori: apriori.copied(),
            encoding: *encoding,
        }
    }

    /// Theoretical bits per symbol (`body_size_bits / message_length`).
    ///
    /// `None` without apriori stats or for an empty message.
    pub fn bits_per_symbol(&self) -> Option<f64> {
        let apriori = self.apriori?;
        if apriori.message_length == 0 {
            return None;
        }
        Some(apriori.body_size_bits as f64 / apriori.message_length as f64)
    }

    /// Realized ratio (`output_size / input_size`).
    ///
    /// Returns 0.0 if nothing was read.
    pub fn compression_ratio(&self) -> f64 {
        if self.encoding.input_size == 0 {
            0.0
        } else {
            self.encoding.output_size as f64 / self.encoding.input_size as f64
        }
    }

    /// Write a human-readable summary.
    pub fn write_summary<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "=== Compression ===")?;
        writeln!(out, "Input:  {} bytes", self.encoding.input_size)?;
        writeln!(out, "Output: {} bytes", self.encoding.output_size)?;
        if let Some(bits) = self.bits_per_symbol() {
            writeln!(out, "Cost:   {bits:.4} bits/symbol")?;
        }
        writeln!(out, "Ratio:  {:.4}", self.compression_ratio())?;
        Ok(())
    }

    /// Export as `key=value` lines (for parsing/testing).
    pub fn export_text(&self) -> String {
        let mut text = format!(
            "input_bytes={}\n\
             output_bytes={}\n\
             compression_ratio={:.4}\n",
            self.encoding.input_size,
            self.encoding.output_size,
            self.compression_ratio(),
        );
        if let Some(bits) = self.bits_per_symbol() {
            text.push_str(&format!("bits_per_symbol={bits:.4}\n"));
        }
        text
    }
}
