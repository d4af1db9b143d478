//! Logging setup for trackdupe.
//!
//! Uses the `log` facade with an `env_logger` backend. The level comes from,
//! in priority order:
//!
//! 1. `RUST_LOG` (if set)
//! 2. `--quiet` (errors only) or `--verbose` (debug / trace)
//! 3. info
//!
//! Decoder crates are chatty at info level about container quirks, so they
//! are capped at `warn` unless `RUST_LOG` says otherwise.
//!
//! ```rust,no_run
//! use trackdupe::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("visible with -v");
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Modules whose output is capped at `warn` when the level comes from CLI flags.
const NOISY_MODULES: &[&str] = &["symphonia", "symphonia_core", "symphonia_bundle_mp3"];

/// Initialize logging from CLI verbosity flags.
///
/// Safe to call more than once; later calls are ignored by `env_logger`.
pub fn init_logging(verbose: u8, quiet: bool) {
    let use_env = env::var("RUST_LOG").is_ok();
    let mut builder = Builder::new();

    if use_env {
        builder.parse_default_env();
    } else {
        let level = determine_level(verbose, quiet);
        builder.filter_level(level);
        for module in NOISY_MODULES {
            builder.filter_module(module, level.min(LevelFilter::Warn));
        }
    }

    configure_format(&mut builder, verbose);

    if builder.try_init().is_ok() {
        if use_env {
            log::debug!("Logging configured from RUST_LOG={:?}", env::var("RUST_LOG").ok());
        } else {
            log::debug!("Logging initialized at level {:?}", determine_level(verbose, quiet));
        }
    }
}

fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Debug builds get a timestamp (and the module path with `-v`); release builds
/// print level and message only.
fn configure_format(builder: &mut Builder, verbose: u8) {
    #[cfg(debug_assertions)]
    {
        builder.format(move |buf, record| {
            let timestamp = buf.timestamp_seconds();
            let level = record.level();
            let style = buf.default_level_style(level);
            if verbose >= 1 {
                writeln!(
                    buf,
                    "{} {style}{:<5}{style:#} [{}] {}",
                    timestamp,
                    level,
                    record.module_path().unwrap_or("unknown"),
                    record.args()
                )
            } else {
                writeln!(buf, "{} {style}{:<5}{style:#} {}", timestamp, level, record.args())
            }
        });
    }

    #[cfg(not(debug_assertions))]
    {
        let _ = verbose;
        builder.format(|buf, record| {
            let level = record.level();
            let style = buf.default_level_style(level);
            writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
        });
    }
}

/// Name of the currently active maximum level.
pub fn current_level_name() -> &'static str {
    match log::max_level() {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}
