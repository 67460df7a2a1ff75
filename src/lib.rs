//! Mineduc-Harvest: a resumable scraper for Chile's school registry
//!
//! This crate drives a browser through the registry's advanced search
//! (region → comuna → school), extracts each school's detail page into a
//! record, and exports the records as CSV. Progress is checkpointed so an
//! interrupted crawl can resume where it stopped.

pub mod browser;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod logging;
pub mod model;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Mineduc-Harvest operations
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser error: {0}")]
    Driver(#[from] browser::DriverError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] storage::CheckpointError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: state::CrawlPhase,
        to: state::CrawlPhase,
    },

    #[error("Crawl task failed: {0}")]
    Join(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// Result type alias for Mineduc-Harvest operations
pub type Result<T> = std::result::Result<T, ScraperError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use browser::{ChromeDriver, DomDriver, DriverResult};
pub use config::Config;
pub use crawler::{CrawlOptions, CrawlReport, CrawlScope, Crawler};
pub use model::{Column, SchoolRecord};
pub use output::OutputResult;
pub use state::{CrawlPhase, StopSignal, TerminationOutcome};
pub use storage::CheckpointResult;

/// Launches Chrome and runs a crawl to completion
///
/// Blocks for the whole crawl; call it from a blocking context.
pub fn run(config: Config, options: CrawlOptions, headless: bool) -> Result<CrawlReport> {
    let driver = ChromeDriver::launch(&config.browser, headless)?;
    crawler::crawl(driver, config, options)
}
