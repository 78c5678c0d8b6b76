//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Time log preprocessor.
///
/// Validates raw daily activity logs, converts them into back-to-back
/// intervals, and checks the converted files.
#[derive(Debug, Parser)]
#[command(name = "tl", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the validation and conversion pipeline over a file or directory.
    ///
    /// Without stage flags every stage runs.
    Preprocess {
        /// A source log, or a directory searched recursively for `.txt` logs.
        path: PathBuf,

        /// Check source logs against the line grammar.
        #[arg(long)]
        validate_source: bool,

        /// Convert source logs into day blocks.
        #[arg(long)]
        convert: bool,

        /// Check converted files.
        #[arg(long)]
        validate_output: bool,

        /// Require every day of each month that appears.
        #[arg(long)]
        enable_day_check: bool,

        /// Root for converted files (default: `Processed_<name>` next to the input).
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Convert one source log and print the result.
    Convert {
        /// The source log.
        file: PathBuf,

        /// Year to stamp on dates (default: from a `YYYY` parent directory).
        #[arg(long)]
        year: Option<i32>,

        /// Emit one JSON object per day instead of day blocks.
        #[arg(long)]
        json: bool,
    },

    /// Validate one file and print any errors.
    Validate {
        /// The file to check.
        file: PathBuf,

        /// Treat the file as converted output rather than a source log.
        #[arg(long)]
        output: bool,

        /// Require every day of each month that appears (converted output only).
        #[arg(long, requires = "output")]
        enable_day_check: bool,
    },
}
