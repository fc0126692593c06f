//! Command-line interface definitions for docmill.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! The CLI follows standard conventions with global options (verbosity, JSON errors) and
//! subcommands for different operations.
//!
//! # Example
//!
//! ```bash
//! # Ingest a directory tree into ./extracted
//! docmill run ~/documents --output ./extracted
//!
//! # Re-run from scratch, discarding all prior state
//! docmill run ~/documents --output ./extracted --reset
//!
//! # Show registry counts for a previous run
//! docmill status --cache ./extracted/.docmill.db
//!
//! # Verbose mode for debugging
//! docmill -v run ~/documents --output ./extracted
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Resumable, deduplicated document-to-Markdown ingestion pipeline.
///
/// docmill mirrors an input directory tree into an output tree of extracted
/// Markdown text, routing each file to a format-specific extraction strategy
/// and caching results by BLAKE3 content hash so identical files are only
/// ever processed once.
#[derive(Debug, Parser)]
#[command(name = "docmill")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit fatal errors as JSON on stderr (for scripting)
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for docmill.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest a directory tree, extracting text into a mirrored output tree
    Run(RunArgs),
    /// Show registry statistics for a previous or in-progress run
    Status(StatusArgs),
}

/// Arguments for the run subcommand.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Input directory to ingest
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output directory for extracted Markdown (mirrors the input tree)
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Per-file extraction timeout in seconds
    #[arg(long, value_name = "SECS", default_value = "60")]
    pub timeout: u64,

    /// Number of threads for content hashing during the scan phase
    #[arg(long, value_name = "N", default_value = "4")]
    pub scan_threads: usize,

    /// Path to the registry/cache database
    ///
    /// If not specified, a default platform-specific path derived from the
    /// output directory is used.
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// Discard all registry and cache state before running
    #[arg(long)]
    pub reset: bool,

    /// Glob patterns to ignore (can be specified multiple times)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// OCR language passed to the engine (e.g. "eng", "spa")
    #[arg(long, value_name = "LANG", default_value = "eng")]
    pub ocr_lang: String,
}

/// Arguments for the status subcommand.
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Path to the registry/cache database
    #[arg(long, value_name = "PATH")]
    pub cache: PathBuf,

    /// Emit statistics as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}
