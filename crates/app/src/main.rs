//! parhuff: command-line front end.
//!
//! Reads a file or stdin, runs the selected command over an in-process group
//! of worker ranks, writes the result to stdout and the compression report to
//! stderr.
//!
//! Exit status: 0 on success, 2 on a usage error, 1 when the run fails.

mod config;
mod input_gen;

use config::{CodecKind, Command, Config};
use parhuff_core::distributed::{
    decode_partitioned, encode_huffman, encode_partitioned, COORDINATOR_RANK,
};
use parhuff_core::format::SEGMENT_SYMBOLS;
use parhuff_core::{
    AprioriStats, Codec, EncodingStats, GroupContext, Huffman, LocalGroup, Report, RunLength,
};
use std::io::{self, Read, Write};
use std::process::ExitCode;
use tracing::{debug, info};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Run with --help for usage.");
            return ExitCode::from(2);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_writer(io::stderr)
        .init();

    if config.print_config {
        config.print();
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

fn run(config: &Config) -> parhuff_core::Result<()> {
    let input = read_input(config)?;
    info!(
        command = ?config.command,
        codec = %config.codec,
        workers = config.workers,
        input_bytes = input.len(),
        "starting"
    );

    let (output, summary) = match config.command {
        Command::Generate => (generate(config, &input)?, None),
        Command::Encode => {
            let (output, apriori, stats) = encode(config, &input)?;
            (output, Some((apriori, stats)))
        }
        Command::Decode => (decode(config, &input)?, None),
    };

    let mut stdout = io::stdout().lock();
    stdout.write_all(&output)?;
    stdout.flush()?;
    info!(output_bytes = output.len(), "done");

    if let Some((apriori, stats)) = summary {
        if config.print_stats {
            Report::new(apriori.as_ref(), &stats).write_summary(io::stderr().lock())?;
        }
    }
    Ok(())
}

/// Whole input: the named file, or stdin.
fn read_input(config: &Config) -> io::Result<Vec<u8>> {
    match &config.input_file {
        Some(path) => std::fs::read(path),
        None => {
            let mut data = Vec::new();
            io::stdin().lock().read_to_end(&mut data)?;
            Ok(data)
        }
    }
}

/// The coordinator's slice of the input: everything on rank 0, nothing
/// elsewhere.
fn coordinator_view(rank: usize, input: &[u8]) -> &[u8] {
    if rank == COORDINATOR_RANK {
        input
    } else {
        &[]
    }
}

fn generate(config: &Config, raw_alphabet: &[u8]) -> parhuff_core::Result<Vec<u8>> {
    let alphabet = input_gen::parse_alphabet(raw_alphabet)?;
    let symbols_per_rank = config.parts * SEGMENT_SYMBOLS;
    debug!(alphabet = alphabet.len(), symbols_per_rank, "generating corpus");

    let mut pieces = LocalGroup::run(config.group(), |group| {
        let alphabet = coordinator_view(group.rank(), &alphabet);
        input_gen::generate_corpus(group, alphabet, symbols_per_rank, config.seed)
    })?;
    Ok(pieces.swap_remove(COORDINATOR_RANK))
}

fn encode(
    config: &Config,
    input: &[u8],
) -> parhuff_core::Result<(Vec<u8>, Option<AprioriStats>, EncodingStats)> {
    let mut results = LocalGroup::run(config.group(), |group| {
        let local = coordinator_view(group.rank(), input);
        let mut output = Vec::new();
        let summary = match config.codec {
            CodecKind::Huffman => {
                encode_huffman(group, local, &mut output)?.map(|(a, s)| (Some(a), s))
            }
            CodecKind::RunLength => {
                encode_partitioned(group, &RunLength, local, &mut output)?.map(|s| (None, s))
            }
        };
        Ok((output, summary))
    })?;

    let (output, summary) = results.swap_remove(COORDINATOR_RANK);
    let (apriori, stats) = summary.unwrap_or_default();
    Ok((output, apriori, stats))
}

fn decode(config: &Config, input: &[u8]) -> parhuff_core::Result<Vec<u8>> {
    match config.codec {
        CodecKind::Huffman => {
            // Segment boundaries are only found by decoding, so one rank does it all.
            if config.workers > 1 {
                info!("huffman decoding runs on the coordinator alone");
            }
            let mut output = Vec::new();
            Huffman.decode(input, &mut output)?;
            Ok(output)
        }
        CodecKind::RunLength => {
            let mut results = LocalGroup::run(config.group(), |group| {
                let local = coordinator_view(group.rank(), input);
                let mut output = Vec::new();
                decode_partitioned(group, &RunLength, local, &mut output)?;
                Ok(output)
            })?;
            Ok(results.swap_remove(COORDINATOR_RANK))
        }
    }
}
