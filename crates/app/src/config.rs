//! Configuration for the parhuff command line.
//!
//! Handles parsing command-line arguments and filling in defaults. The only
//! randomized default is the seed; it is printed by `--print-config` so any
//! run can be repeated.

use parhuff_core::transport::LocalGroupConfig;
use std::fmt;
use std::path::PathBuf;
use tracing::Level;

/// Longest alphabet `generate` accepts.
pub const MAX_ALPHABET: usize = 25;

/// What to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Write a synthetic corpus drawn from an alphabet read on stdin
    Generate,
    /// Compress the input to stdout
    Encode,
    /// Decompress the input to stdout
    Decode,
}

/// Which codec `encode`/`decode` use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    Huffman,
    RunLength,
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecKind::Huffman => write!(f, "huffman"),
            CodecKind::RunLength => write!(f, "rle"),
        }
    }
}

/// Complete configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub command: Command,

    /// Input file path (None = stdin)
    pub input_file: Option<PathBuf>,

    pub codec: CodecKind,

    // === Group ===
    /// Number of in-process ranks
    pub workers: usize,

    /// Upper bound of the per-collective delay, microseconds (0 = none)
    pub jitter_us: u64,

    /// Seed for the corpus generator and the jitter
    pub seed: u64,

    // === Generate ===
    /// Segments each rank generates
    pub parts: usize,

    // === Behavior ===
    /// Log verbosity on stderr
    pub log_level: Level,

    /// Whether to print the resolved configuration
    pub print_config: bool,

    /// Whether to print the compression report after encoding
    pub print_stats: bool,
}

impl Config {
    /// Parse configuration from command-line arguments (program name
    /// excluded).
    ///
    /// The first positional argument is the command; a second one names the
    /// input file (`-` means stdin).
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        let mut command: Option<Command> = None;
        let mut input_file: Option<PathBuf> = None;
        let mut codec = CodecKind::Huffman;
        let mut workers: usize = 1;
        let mut jitter_us: u64 = 0;
        let mut seed: Option<u64> = None;
        let mut parts: usize = 1;
        let mut log_level = Level::WARN;
        let mut print_config = false;
        let mut print_stats = true;

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--codec" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--codec requires a name".to_string());
                    }
                    codec = match args[i].as_str() {
                        "huffman" => CodecKind::Huffman,
                        "rle" => CodecKind::RunLength,
                        other => return Err(format!("unknown codec: {other}")),
                    };
                }
                "--workers" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--workers requires a number".to_string());
                    }
                    workers = args[i].parse().map_err(|_| "invalid workers")?;
                    if workers == 0 {
                        return Err("--workers must be at least 1".to_string());
                    }
                }
                "--jitter-us" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--jitter-us requires a number".to_string());
                    }
                    jitter_us = args[i].parse().map_err(|_| "invalid jitter-us")?;
                }
                "--seed" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--seed requires a number".to_string());
                    }
                    seed = Some(args[i].parse().map_err(|_| "invalid seed")?);
                }
                "--parts" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--parts requires a number".to_string());
                    }
                    parts = args[i].parse().map_err(|_| "invalid parts")?;
                }
                "--log-level" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--log-level requires a level".to_string());
                    }
                    log_level = args[i]
                        .parse()
                        .map_err(|_| format!("invalid log level: {}", args[i]))?;
                }
                "--print-config" => {
                    print_config = true;
                }
                "--no-stats" => {
                    print_stats = false;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => {
                    return Err(format!("unknown argument: {flag}"));
                }
                positional => {
                    if command.is_none() {
                        command = Some(match positional {
                            "generate" => Command::Generate,
                            "encode" => Command::Encode,
                            "decode" => Command::Decode,
                            other => return Err(format!("unknown command: {other}")),
                        });
                    } else if input_file.is_none() && positional != "-" {
                        input_file = Some(PathBuf::from(positional));
                    } else if positional != "-" {
                        return Err(format!("unexpected argument: {positional}"));
                    }
                }
            }
            i += 1;
        }

        let command = command.ok_or("missing command (generate, encode or decode)")?;
        if command == Command::Generate && input_file.is_some() {
            return Err("generate reads its alphabet from stdin, not a file".to_string());
        }

        // Explicit or time-based
        let seed = seed.unwrap_or_else(|| {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0)
        });

        Ok(Config {
            command,
            input_file,
            codec,
            workers,
            jitter_us,
            seed,
            parts,
            log_level,
            print_config,
            print_stats,
        })
    }

    /// Group settings for the in-process transport.
    pub fn group(&self) -> LocalGroupConfig {
        LocalGroupConfig::jittered(self.workers, self.jitter_us, self.seed)
    }

    /// Print the configuration in human-readable form (stderr; stdout carries
    /// codec data).
    pub fn print(&self) {
        eprintln!("=== Configuration ===");
        eprintln!("Command:    {:?}", self.command);
        eprintln!(
            "Input:      {}",
            self.input_file
                .as_ref()
                .map_or("(stdin)".to_string(), |p| p.display().to_string())
        );
        eprintln!("Codec:      {}", self.codec);
        eprintln!();
        eprintln!("=== Group ===");
        eprintln!("Workers:    {}", self.workers);
        eprintln!("Jitter:     {} us", self.jitter_us);
        eprintln!("Seed:       {}", self.seed);
        if self.command == Command::Generate {
            eprintln!("Parts:      {} per worker", self.parts);
        }
        eprintln!("Log level:  {}", self.log_level);
        eprintln!();
    }
}

fn print_help() {
    println!("parhuff: canonical Huffman and run-length coding across worker ranks");
    println!();
    println!("USAGE:");
    println!("    parhuff generate [OPTIONS] < ALPHABET");
    println!("    parhuff encode [PATH] [OPTIONS]");
    println!("    parhuff decode [PATH] [OPTIONS]");
    println!();
    println!("    PATH omitted or '-' reads stdin. Output goes to stdout.");
    println!();
    println!("OPTIONS:");
    println!("    --codec <NAME>          huffman or rle (default: huffman)");
    println!("    --workers <N>           Number of ranks (default: 1)");
    println!("    --jitter-us <N>         Random delay before each collective (default: 0)");
    println!("    --seed <N>              Random seed (default: time-based)");
    println!("    --parts <N>             generate: segments per worker (default: 1)");
    println!();
    println!("    --log-level <LEVEL>     error, warn, info, debug or trace (default: warn)");
    println!("    --print-config          Print resolved configuration");
    println!("    --no-stats              Don't print the compression report");
    println!("    --help, -h              Print this help");
    println!();
    println!("EXAMPLES:");
    println!("    echo -n abcdefghijklmnopqrstuvwxy | parhuff generate --workers 4 > corpus");
    println!("    parhuff encode corpus --workers 4 > corpus.huf");
    println!("    parhuff decode corpus.huf > corpus.out");
    println!("    parhuff encode --codec rle < corpus > corpus.rle");
    println!();
}
