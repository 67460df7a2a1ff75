//! Mineduc-Harvest main entry point
//!
//! This is the command-line interface for the Mineduc-Harvest school
//! registry scraper.

use clap::Parser;
use mineduc_harvest::config::{load_config_with_hash, render_config, Config};
use mineduc_harvest::crawler::{CrawlOptions, CrawlScope};
use mineduc_harvest::logging::setup_logging;
use mineduc_harvest::{ScraperError, StopSignal, TerminationOutcome};
use std::path::{Path, PathBuf};

/// Mineduc-Harvest: a resumable scraper for Chile's school registry
///
/// Walks every region and comuna of the registry's advanced search in a
/// browser, extracts each school's detail page, and exports the records as
/// CSV. Interrupted crawls can be resumed from their checkpoint.
#[derive(Parser, Debug)]
#[command(name = "mineduc-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable scraper for Chile's school registry", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Resume from a checkpoint (the configured checkpoint path if no value)
    #[arg(long, value_name = "CHECKPOINT", num_args = 0..=1, conflicts_with = "pilot")]
    resume: Option<Option<PathBuf>>,

    /// Crawl only the first region and its first comuna
    #[arg(long)]
    pilot: bool,

    /// Validate config and print it without launching a browser
    #[arg(long, conflicts_with_all = ["stats", "resume", "pilot"])]
    dry_run: bool,

    /// Show statistics from the latest export and exit
    #[arg(long, conflicts_with_all = ["dry_run", "resume", "pilot"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load and validate configuration
    let (config, config_hash) = load_config_with_hash(cli.config.as_deref())?;

    // Setup logging based on verbosity
    let _log_guard = setup_logging(cli.verbose, cli.quiet, Path::new(&config.output.log_path))?;
    match &cli.config {
        Some(path) => tracing::info!(
            "Configuration loaded from {} (hash: {})",
            path.display(),
            config_hash
        ),
        None => tracing::info!("Using built-in configuration (hash: {})", config_hash),
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, &config_hash)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        let resume = cli
            .resume
            .map(|path| path.unwrap_or_else(|| PathBuf::from(&config.output.checkpoint_path)));
        let scope = if cli.pilot {
            CrawlScope::Pilot
        } else {
            CrawlScope::Full
        };
        handle_crawl(config, resume, scope, !cli.headed).await?;
    }

    Ok(())
}

/// Handles the --dry-run mode: prints the effective configuration
fn handle_dry_run(config: &Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Mineduc-Harvest Dry Run ===\n");
    println!("{}", render_config(config)?);

    println!("✓ Configuration is valid (hash: {})", config_hash);
    println!(
        "✓ Would extract {} fields per school from {}",
        config.fields.len(),
        config.site.base_url
    );

    Ok(())
}

/// Handles the --stats mode: shows coverage of the latest export
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use mineduc_harvest::output::{load_statistics, print_statistics};
    use mineduc_harvest::storage::JsonCheckpointStore;

    let store = JsonCheckpointStore::new(&config.output.checkpoint_path);
    let stats = load_statistics(&config.output, &store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
///
/// The crawl blocks on browser calls, so it runs on the blocking pool while
/// this task waits for either its completion or Ctrl-C.
async fn handle_crawl(
    config: Config,
    resume: Option<PathBuf>,
    scope: CrawlScope,
    headless: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match (&resume, scope) {
        (Some(path), _) => tracing::info!("Resuming crawl from {}", path.display()),
        (None, CrawlScope::Pilot) => tracing::info!("Starting pilot crawl"),
        (None, CrawlScope::Full) => tracing::info!("Starting full crawl"),
    }

    let stop = StopSignal::new();
    let options = CrawlOptions {
        resume,
        scope,
        stop: stop.clone(),
    };

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current step");
            stop.trigger();
        }
    });

    let result =
        tokio::task::spawn_blocking(move || mineduc_harvest::run(config, options, headless))
            .await
            .map_err(|e| ScraperError::Join(e.to_string()))?;
    interrupt.abort();

    match result {
        Ok(report) => {
            let counters = report.counters;
            tracing::info!(
                "Crawl {} after {:.1}s: {} records, {} schools failed, {} comunas skipped, {} regions skipped",
                report.outcome,
                report.elapsed.as_secs_f64(),
                report.records.len(),
                counters.schools_failed,
                counters.comunas_skipped,
                counters.regions_skipped
            );
            if let Some(path) = &report.export_path {
                tracing::info!("Records written to {}", path.display());
            }
            if report.outcome == TerminationOutcome::Interrupted {
                tracing::info!("Run again with --resume to continue");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
