//! gen-readme - incremental README generator
//!
//! Scans a notes repository, detects changed files by content hash and
//! regenerates the `README.md` index of every directory whose contents
//! changed since the previous run.

pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod readme;
pub mod scanner;
pub mod signal;
pub mod store;
pub mod watch;

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use yansi::Paint;

use crate::cli::{Cli, Commands, ExcludeCommand, OutputFormat, ReportArgs, ScanArgs, WatchArgs};
use crate::config::{Config, ConfigError};
use crate::error::ExitCode;
use crate::pipeline::{Pipeline, PipelineError, RunSummary};
use crate::progress::Progress;
use crate::readme::ReadmeOutcome;
use crate::store::HashStore;

/// Run the application with parsed arguments.
///
/// # Errors
///
/// Returns configuration, database and interruption errors; map them to a
/// process exit code with [`ExitCode::for_error`].
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    match cli.command {
        Commands::Scan(ref args) => run_scan(&cli, args),
        Commands::Watch(ref args) => run_watch(&cli, args),
        Commands::Exclude(ref command) => run_exclude(cli.config.as_deref(), command),
        Commands::Report(ref args) => run_report(&cli, args),
    }
}

fn build_pipeline(cli: &Cli, args: &ScanArgs, flag: Arc<AtomicBool>) -> Result<Pipeline> {
    let mut config = Config::load(cli.config.as_deref())?;
    args.apply(&mut config);
    let root = config
        .scan_root(args.path.as_deref())
        .context("Cannot determine the scan root")?;

    let mut pipeline = Pipeline::new(&root, config)?
        .with_dry_run(args.dry_run)
        .with_shutdown_flag(flag);

    let show_progress = !cli.quiet && !args.no_progress && args.output == OutputFormat::Text;
    if show_progress {
        pipeline = pipeline.with_progress_callback(Arc::new(Progress::new(false)));
    }
    Ok(pipeline)
}

fn run_scan(cli: &Cli, args: &ScanArgs) -> Result<ExitCode> {
    let handler = signal::install_handler()?;
    let pipeline = build_pipeline(cli, args, handler.get_flag())?;

    let summary = pipeline.run()?;
    print_summary(&summary, args.output, cli.quiet)?;

    Ok(if summary.has_skipped() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    })
}

fn run_watch(cli: &Cli, args: &WatchArgs) -> Result<ExitCode> {
    let handler = signal::install_handler()?;
    let flag = handler.get_flag();
    let pipeline = build_pipeline(cli, &args.scan, Arc::clone(&flag))?;

    let output = args.scan.output;
    let quiet = cli.quiet;
    watch::watch(
        &pipeline,
        Duration::from_millis(args.debounce_ms),
        &flag,
        |result| match result {
            Ok(summary) => {
                if let Err(e) = print_summary(&summary, output, quiet) {
                    log::error!("Cannot print summary: {}", e);
                }
            }
            Err(PipelineError::Interrupted) => {}
            Err(e) => log::error!("Scan failed: {}", e),
        },
    )?;

    Ok(if handler.is_shutdown_requested() {
        ExitCode::Interrupted
    } else {
        ExitCode::Success
    })
}

fn print_summary(summary: &RunSummary, output: OutputFormat, quiet: bool) -> Result<()> {
    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        OutputFormat::Text => {
            if quiet {
                return Ok(());
            }
            for readme in &summary.readmes {
                let verb = match (readme.outcome, summary.dry_run) {
                    (ReadmeOutcome::Unchanged, _) => continue,
                    (ReadmeOutcome::Created, false) => "Created",
                    (ReadmeOutcome::Updated, false) => "Updated",
                    (ReadmeOutcome::Created, true) => "Would create",
                    (ReadmeOutcome::Updated, true) => "Would update",
                };
                println!("{} {}", verb.green(), readme.path.display());
            }
            if summary.pruned > 0 {
                println!("Pruned {} stale records", summary.pruned);
            }
            print!("{}", summary.metrics.render());
            if summary.has_skipped() {
                println!(
                    "{} files were skipped; run `gen-readme report` for details",
                    summary.metrics.files_skipped.yellow()
                );
            }
        }
    }
    Ok(())
}

fn run_exclude(config_file: Option<&Path>, command: &ExcludeCommand) -> Result<ExitCode> {
    let path = match config_file {
        Some(p) => p.to_path_buf(),
        None => Config::config_path()?,
    };

    let message = match command {
        ExcludeCommand::List => {
            let config = Config::load(config_file)?;
            for pattern in config.exclusions() {
                println!("{pattern}");
            }
            return Ok(ExitCode::Success);
        }
        ExcludeCommand::Add { pattern } => {
            edit_config(&path, |c| c.add_exclusion(pattern))?;
            format!("Added exclusion '{}'", pattern.trim())
        }
        ExcludeCommand::Remove { pattern } => {
            edit_config(&path, |c| c.remove_exclusion(pattern))?;
            format!("Removed exclusion '{}'", pattern.trim())
        }
        ExcludeCommand::Modify { old, new } => {
            edit_config(&path, |c| c.modify_exclusion(old, new))?;
            format!("Replaced exclusion '{}' with '{}'", old.trim(), new.trim())
        }
    };

    log::info!("{} in {}", message, path.display());
    println!("{message}");
    Ok(ExitCode::Success)
}

/// Load the config file alone, apply `edit` and write it back.
fn edit_config<F>(path: &Path, edit: F) -> Result<(), ConfigError>
where
    F: FnOnce(&mut Config) -> Result<(), ConfigError>,
{
    let mut config = Config::load_file(path)?;
    edit(&mut config)?;
    config.save(path)
}

fn run_report(cli: &Cli, args: &ReportArgs) -> Result<ExitCode> {
    let db = match args.db {
        Some(ref db) => db.clone(),
        None => Config::load(cli.config.as_deref())?.database_path(),
    };
    if !db.exists() {
        println!("No hash database at {}", db.display());
        return Ok(ExitCode::Success);
    }

    let store = HashStore::open(&db)
        .with_context(|| format!("Cannot open hash database {}", db.display()))?;
    let skipped = store.skipped_files()?;
    let events = store.recent_events(args.events)?;

    match args.output {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "database": db,
                "records": store.record_count()?,
                "skipped": skipped,
                "events": events,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("{} {}", "Database:".bold(), db.display());
            println!("Stored hashes: {}", store.record_count()?);

            println!("\n{} ({})", "Skipped files".bold(), skipped.len());
            for entry in &skipped {
                println!("  {}: {}", entry.path, entry.reason.yellow());
            }

            println!("\n{} ({})", "Recent events".bold(), events.len());
            for event in &events {
                println!("  {} {:<7} {}", event.timestamp, event.kind, event.message);
            }
        }
    }

    if args.clear_skipped {
        let cleared = store.clear_skipped()?;
        log::info!("Cleared {} skipped file records", cleared);
    }

    Ok(ExitCode::Success)
}
