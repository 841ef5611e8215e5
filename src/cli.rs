// CLI-specific types and structures
// This module contains the command-line interface definitions and validation

use anyhow::{bail, Result};
use clap::Parser;

use crate::loader::InputMode;

pub const USAGE_HINT: &str = "Run 'xmload --help' for usage.";

#[derive(Parser, Debug)]
#[command(name = "xmload")]
#[command(about = "Load XML files into a document sink as generic JSON-like documents")]
#[command(
    long_about = "Load XML files into a document sink as generic JSON-like documents\n\nEach XML document is parsed into an in-memory tree and converted into an\nordered field map: attributes and single-text children become string\nfields, repeated names become arrays, and stray text collects under\n'_text'. Directories are walked and their files loaded concurrently.\n\nMODES:\n  --files  (default)  each input file is one XML document\n  --lines             each line of each input file is one XML document\n\nCOMMON EXAMPLES:\n  xmload data/ --url file://docs.jsonl\n  xmload --lines events.log\n  xmload a.xml b.xml --threads 4"
)]
#[command(version)]
pub struct Cli {
    /// Files or directories to load (directories are expanded while loading)
    pub paths: Vec<String>,

    /// Treat each input file as one XML document (default)
    #[arg(long = "files", help_heading = "Input Options", conflicts_with = "lines")]
    pub files: bool,

    /// Treat each line of each input file as one XML document
    #[arg(long = "lines", help_heading = "Input Options")]
    pub lines: bool,

    /// Destination URL for the converted documents: '-' for JSON lines on
    /// stdout, or file://<path> for a JSON lines file
    #[arg(long = "url", default_value = "-", help_heading = "Output Options")]
    pub url: String,

    /// Number of load threads (defaults to the sink's concurrency hint)
    #[arg(long = "threads", help_heading = "Processing Options")]
    pub threads: Option<usize>,

    /// Seconds to wait for a single write acknowledgment before treating
    /// the write as failed
    #[arg(
        long = "ack-timeout",
        default_value = "30",
        help_heading = "Processing Options"
    )]
    pub ack_timeout: u64,
}

impl Cli {
    pub fn input_mode(&self) -> InputMode {
        if self.lines {
            InputMode::Lines
        } else {
            InputMode::Files
        }
    }
}

/// Validate CLI arguments for early error detection
pub fn validate_cli_args(cli: &Cli) -> Result<()> {
    if cli.paths.is_empty() {
        bail!("Must supply at least 1 file or directory to load.");
    }

    if let Some(threads) = cli.threads {
        if threads == 0 {
            bail!("Thread count must be greater than 0");
        }
        if threads > 1000 {
            bail!("Thread count too high (max 1000)");
        }
    }

    if cli.ack_timeout == 0 {
        bail!("Ack timeout must be greater than 0");
    }

    Ok(())
}
