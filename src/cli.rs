//! Command-line interface definitions for gen-readme.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! Global options (verbosity, config file, error format) apply to every subcommand.
//!
//! # Example
//!
//! ```bash
//! # Scan the notes folder and regenerate affected README files
//! gen-readme scan ~/notes
//!
//! # Limit depth, exclude a directory, print the summary as JSON
//! gen-readme scan ~/notes --depth 2 --exclude drafts --output json
//!
//! # Keep the READMEs current while editing
//! gen-readme watch ~/notes
//!
//! # Manage the persisted exclusion list
//! gen-readme exclude add node_modules
//! gen-readme exclude list
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{Config, StalePolicy};
use crate::readme::RootLayout;

/// Incremental README generator for notes repositories.
///
/// gen-readme hashes every file below a root, remembers the digests in a
/// SQLite database and regenerates the README.md index of each directory
/// whose contents changed since the previous run.
#[derive(Debug, Parser)]
#[command(name = "gen-readme")]
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

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print errors as JSON objects on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a directory and regenerate README files for changed directories
    Scan(ScanArgs),
    /// Scan once, then rescan whenever files change
    Watch(WatchArgs),
    /// Manage the exclusion list
    #[command(subcommand)]
    Exclude(ExcludeCommand),
    /// Show skipped files and recent events from the hash database
    Report(ReportArgs),
}

/// Arguments for the scan subcommand.
#[derive(Debug, Clone, Args)]
pub struct ScanArgs {
    /// Root directory (defaults to `default_folder` from the config, then
    /// the current directory)
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Maximum depth below the root (0 = root files only, -1 = unlimited)
    #[arg(short, long, value_name = "N", allow_negative_numbers = true)]
    pub depth: Option<i64>,

    /// Number of worker threads for walking and hashing
    #[arg(short, long, value_name = "N", value_parser = parse_positive)]
    pub workers: Option<usize>,

    /// Path to the hash database
    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// Additional directory patterns to exclude (can be specified multiple times)
    #[arg(short, long = "exclude", value_name = "PATTERN")]
    pub exclude_patterns: Vec<String>,

    /// Hash records buffered per database transaction
    #[arg(long, value_name = "N", value_parser = parse_positive)]
    pub batch_size: Option<usize>,

    /// Report what would change without writing README files or the database
    #[arg(long)]
    pub dry_run: bool,

    /// Custom README template file
    #[arg(long, value_name = "FILE")]
    pub template: Option<PathBuf>,

    /// Remove database records for files that no longer exist
    #[arg(long)]
    pub prune_stale: bool,

    /// Layout of the root README
    #[arg(long, value_enum, value_name = "LAYOUT")]
    pub root_layout: Option<RootLayout>,

    /// Summary output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,
}

impl ScanArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(depth) = self.depth {
            config.max_depth = depth;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(ref db) = self.db {
            config.database = Some(db.clone());
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(ref template) = self.template {
            config.template = Some(template.clone());
        }
        if self.prune_stale {
            config.stale_policy = StalePolicy::Prune;
        }
        if let Some(layout) = self.root_layout {
            config.root_layout = layout;
        }
        for pattern in &self.exclude_patterns {
            if !config.excluded_dirs.contains(pattern) {
                config.excluded_dirs.push(pattern.clone());
            }
        }
    }
}

/// Arguments for the watch subcommand.
#[derive(Debug, Clone, Args)]
pub struct WatchArgs {
    /// Quiet period after the last filesystem event before rescanning
    #[arg(long, value_name = "MS", default_value = "500")]
    pub debounce_ms: u64,

    /// Scan options
    #[command(flatten)]
    pub scan: ScanArgs,
}

/// Exclusion list management.
#[derive(Debug, Subcommand)]
pub enum ExcludeCommand {
    /// Add a pattern
    Add {
        /// Glob pattern matched against directory paths and names
        pattern: String,
    },
    /// Remove a pattern
    Remove {
        /// Pattern to remove
        pattern: String,
    },
    /// Replace a pattern
    Modify {
        /// Existing pattern
        old: String,
        /// Replacement pattern
        new: String,
    },
    /// List the patterns
    List,
}

/// Arguments for the report subcommand.
#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Path to the hash database
    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// Number of recent events to show
    #[arg(long, value_name = "N", default_value = "20")]
    pub events: usize,

    /// Forget the recorded skipped files after showing them
    #[arg(long)]
    pub clear_skipped: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Output format for summaries and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a strictly positive integer.
///
/// # Errors
///
/// Returns an error for zero, negative or non-numeric input.
pub fn parse_positive(s: &str) -> Result<usize, String> {
    let n: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: '{s}'"))?;
    if n == 0 {
        return Err("Value must be at least 1".to_string());
    }
    Ok(n)
}
