//! Logging setup
//!
//! Two outputs share one `tracing` registry: the console, filtered by the
//! CLI verbosity flags, and an append-only log file written through a
//! non-blocking worker. The file keeps at least info-level detail even when
//! the console is quiet.

use std::fs::OpenOptions;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Filter directives for a verbosity level
pub fn verbosity_directives(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "mineduc_harvest=info,warn",
        1 => "mineduc_harvest=debug,info",
        2 => "mineduc_harvest=trace,debug",
        _ => "trace",
    }
}

/// Installs the console and file subscribers
///
/// # Arguments
///
/// * `verbose` - Number of `-v` flags
/// * `quiet` - Only errors on the console
/// * `log_path` - Log file, appended to across runs
///
/// # Returns
///
/// * `Ok(WorkerGuard)` - Keep alive until exit so buffered lines are flushed
/// * `Err(io::Error)` - The log file could not be opened
pub fn setup_logging(verbose: u8, quiet: bool, log_path: &Path) -> std::io::Result<WorkerGuard> {
    let file = OpenOptions::new().create(true).append(true).open(log_path)?;
    let (file_writer, guard) = tracing_appender::non_blocking(file);

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_filter(EnvFilter::new(verbosity_directives(verbose, quiet)));

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(false)
        .with_filter(EnvFilter::new(verbosity_directives(verbose, false)));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
