//! Command-line interface definitions for trackdupe.
//!
//! # Example
//!
//! ```bash
//! # Scan with the default algorithms (spectral + byte_hash), resuming if possible
//! trackdupe scan ~/Music
//!
//! # Fast exact-copy pass over a 500-file sample
//! trackdupe scan ~/Music -a byte_hash --sample 500 --seed 7
//!
//! # Preview, then execute, a quarantine cleanup
//! trackdupe scan ~/Music --cleanup preview
//! trackdupe scan ~/Music --cleanup execute --quarantine-dir /tmp
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::ConfigOverrides;
use crate::fingerprint::Algorithm;

/// Audio duplicate finder.
///
/// trackdupe fingerprints audio files with one or more algorithms, groups
/// identical fingerprints and ranks each group by format, size and age.
/// Scans run in resumable batches; cleanup moves duplicates to a quarantine
/// folder and never deletes.
#[derive(Debug, Parser)]
#[command(name = "trackdupe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a directory for duplicate audio files
    Scan(ScanArgs),
    /// List fingerprint algorithms and whether they are available
    Algorithms,
    /// Print the effective configuration
    Config,
}

/// What to do with duplicates after the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CleanupArg {
    /// Report what would be moved
    Preview,
    /// Move duplicates into a quarantine folder
    Execute,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Algorithm to run (repeatable; default: spectral and byte_hash)
    #[arg(short, long = "algorithm", value_enum, value_name = "ALG")]
    pub algorithms: Vec<Algorithm>,

    /// Files per batch
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Worker threads (default: CPU count, at most 8)
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Ignore any existing checkpoint and start over
    #[arg(long)]
    pub no_resume: bool,

    /// Checkpoint file location
    #[arg(long, value_name = "PATH")]
    pub checkpoint: Option<PathBuf>,

    /// Batches between checkpoint writes
    #[arg(long, value_name = "N")]
    pub checkpoint_interval: Option<usize>,

    /// Keep the checkpoint file after a completed scan
    #[arg(long)]
    pub keep_checkpoint: bool,

    /// Process at most N files (after sampling)
    #[arg(long, value_name = "N")]
    pub max_files: Option<usize>,

    /// Fingerprint a random sample of N files
    #[arg(long = "sample", value_name = "N")]
    pub sample_size: Option<usize>,

    /// Seed for --sample
    #[arg(long, value_name = "N", requires = "sample_size")]
    pub seed: Option<u64>,

    /// Per-file time limit in seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// JSON report location
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Also export duplicate groups as CSV
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Clean up duplicates after the scan
    #[arg(long, value_enum, value_name = "MODE")]
    pub cleanup: Option<CleanupArg>,

    /// Algorithm whose groups drive the cleanup (default: byte_hash if run, else the first)
    #[arg(long, value_enum, value_name = "ALG", requires = "cleanup")]
    pub cleanup_algorithm: Option<Algorithm>,

    /// Directory the quarantine folder is created in
    #[arg(long, value_name = "DIR")]
    pub quarantine_dir: Option<PathBuf>,

    /// Glob patterns to ignore (can be specified multiple times)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Follow symbolic links during the walk
    #[arg(long)]
    pub follow_symlinks: bool,
}

impl ScanArgs {
    /// Flags that were given, as the top configuration layer.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            algorithms: (!self.algorithms.is_empty()).then(|| self.algorithms.clone()),
            batch_size: self.batch_size,
            worker_count: self.workers,
            resume: self.no_resume.then_some(false),
            checkpoint_path: self.checkpoint.clone(),
            checkpoint_interval: self.checkpoint_interval,
            keep_checkpoint: self.keep_checkpoint.then_some(true),
            max_files: self.max_files,
            sample_size: self.sample_size,
            sample_seed: self.seed,
            ignore_patterns: (!self.ignore_patterns.is_empty()).then(|| self.ignore_patterns.clone()),
            skip_hidden: self.skip_hidden.then_some(true),
            follow_symlinks: self.follow_symlinks.then_some(true),
            timeout_secs: self.timeout_secs,
            report_path: self.report.clone(),
            quarantine_dir: self.quarantine_dir.clone(),
        }
    }
}
