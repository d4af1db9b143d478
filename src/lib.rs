//! trackdupe - audio duplicate finder
//!
//! Fingerprints audio files with interchangeable algorithms (byte-prefix
//! hash, spectral features, optional Chromaprint), groups equal
//! fingerprints, ranks each group by format, size and age, and can move the
//! lower-ranked copies into a quarantine folder. Scans run in parallel
//! batches and checkpoint their progress so an interrupted run resumes.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use trackdupe::fingerprint::{Capabilities, FingerprintOptions, Fingerprinter};
//! use trackdupe::scan::{Orchestrator, ScanOptions};
//!
//! let engine = Arc::new(Fingerprinter::new(FingerprintOptions::default(), Capabilities::detect()));
//! let outcome = Orchestrator::new(ScanOptions::default(), engine).run(Path::new("/music"))?;
//! for (algorithm, groups) in outcome.duplicate_groups() {
//!     println!("{algorithm}: {} groups", groups.len());
//! }
//! # Ok::<(), trackdupe::scan::OrchestratorError>(())
//! ```

pub mod actions;
pub mod checkpoint;
pub mod cli;
pub mod collaborators;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod output;
pub mod progress;
pub mod report;
pub mod scan;
pub mod scanner;
pub mod signal;

use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use yansi::Paint;

use crate::actions::{CleanupMode, CleanupReport};
use crate::cli::{CleanupArg, Cli, Commands, ScanArgs};
use crate::config::{Config, ConfigOverrides};
use crate::duplicates::DuplicateGroup;
use crate::error::ExitCode;
use crate::fingerprint::{Algorithm, Capabilities, FingerprintEngine, Fingerprinter};
use crate::output::{write_summary, CsvOutput, JsonOutput};
use crate::progress::Progress;
use crate::report::ScanReport;
use crate::scan::{Orchestrator, ScanOutcome};

/// Run the parsed command and return the process exit code.
///
/// Only fatal errors come back as `Err`; a scan with per-file failures is
/// `Ok(ExitCode::PartialSuccess)`.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    log::debug!("Log level: {}", logging::current_level_name());
    if cli.no_color || !io::stdout().is_terminal() {
        yansi::disable();
    }

    match cli.command {
        Commands::Scan(ref args) => run_scan(args, cli.config.as_deref(), cli.quiet),
        Commands::Algorithms => {
            list_algorithms(&mut io::stdout().lock(), &Capabilities::detect())?;
            Ok(ExitCode::Success)
        }
        Commands::Config => {
            let config = Config::load(cli.config.as_deref(), &ConfigOverrides::default())
                .context("Failed to load configuration")?;
            print!("{}", config.to_toml().context("Failed to render configuration")?);
            Ok(ExitCode::Success)
        }
    }
}

fn run_scan(args: &ScanArgs, config_file: Option<&Path>, quiet: bool) -> Result<ExitCode> {
    let config = Config::load(config_file, &args.overrides()).context("Failed to load configuration")?;

    let capabilities = Capabilities::detect();
    let algorithms = capabilities.resolve(&config.algorithms);
    if algorithms.is_empty() {
        let requested: Vec<&str> = config.algorithms.iter().map(|a| a.as_str()).collect();
        bail!("None of the requested algorithms is available: {}", requested.join(", "));
    }

    let handler = signal::install_handler().context("Failed to install Ctrl+C handler")?;
    let engine: Arc<dyn FingerprintEngine> =
        Arc::new(Fingerprinter::new(config.fingerprint_options(), capabilities));
    let orchestrator = Orchestrator::new(config.scan_options(algorithms), engine)
        .with_shutdown_flag(handler.get_flag())
        .with_progress_callback(Arc::new(Progress::new(quiet)));

    let outcome = orchestrator
        .run(&args.path)
        .with_context(|| format!("Scan of {} failed", args.path.display()))?;
    let groups = outcome.duplicate_groups();

    let cleanup = match args.cleanup {
        Some(_) if outcome.interrupted => {
            log::warn!("Scan was interrupted; skipping cleanup");
            None
        }
        Some(mode) => Some(run_cleanup(
            &outcome,
            &groups,
            args.cleanup_algorithm,
            mode,
            &config.quarantine_dir,
        )?),
        None => None,
    };

    let report = ScanReport::build(&outcome, &groups, cleanup.as_ref());
    let exit_code = ExitCode::for_scan(outcome.interrupted, report.overall.total_errors, report.total_groups());

    JsonOutput::new(&report, exit_code)
        .write_file(&config.report_path)
        .with_context(|| format!("Failed to write report to {}", config.report_path.display()))?;
    log::info!("Report written to {}", config.report_path.display());

    if let Some(path) = &args.csv {
        CsvOutput::new(&groups)
            .write_file(path)
            .with_context(|| format!("Failed to write CSV to {}", path.display()))?;
        log::info!("Duplicate groups exported to {}", path.display());
    }

    if !quiet {
        let mut stdout = io::stdout().lock();
        write_summary(&mut stdout, &report)?;
        writeln!(stdout, "\nReport: {}", config.report_path.display())?;
    }

    Ok(exit_code)
}

fn run_cleanup(
    outcome: &ScanOutcome,
    groups: &BTreeMap<Algorithm, Vec<DuplicateGroup>>,
    requested: Option<Algorithm>,
    mode: CleanupArg,
    quarantine_root: &Path,
) -> Result<CleanupReport> {
    let Some(algorithm) = cleanup_algorithm(requested, &outcome.algorithms) else {
        bail!(
            "Cleanup algorithm '{}' was not part of this scan",
            requested.map_or("none", Algorithm::as_str)
        );
    };
    let plan = actions::plan(groups.get(&algorithm).into_iter().flatten());
    let mode = match mode {
        CleanupArg::Preview => CleanupMode::DryRun,
        CleanupArg::Execute => CleanupMode::Live,
    };
    log::info!(
        "Cleanup ({:?}) using {} groups: {} files planned",
        mode,
        algorithm,
        plan.total_files()
    );
    actions::execute(&plan, quarantine_root, mode).context("Cleanup failed")
}

/// The algorithm whose groups drive a cleanup: the requested one if it ran,
/// else `byte_hash` if it ran, else the first that ran.
#[must_use]
pub fn cleanup_algorithm(requested: Option<Algorithm>, active: &[Algorithm]) -> Option<Algorithm> {
    match requested {
        Some(algorithm) => active.contains(&algorithm).then_some(algorithm),
        None if active.contains(&Algorithm::ByteHash) => Some(Algorithm::ByteHash),
        None => active.first().copied(),
    }
}

fn list_algorithms<W: Write>(out: &mut W, capabilities: &Capabilities) -> io::Result<()> {
    for algorithm in Algorithm::ALL {
        let name = format!("{:<10}", algorithm.as_str());
        let status = if capabilities.is_available(algorithm) {
            format!("{:<12}", "available").green().to_string()
        } else {
            format!("{:<12}", "unavailable").red().to_string()
        };
        writeln!(out, "{} {} {}", name.bold(), status, algorithm.description())?;
    }
    Ok(())
}
