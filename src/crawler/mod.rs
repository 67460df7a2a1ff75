//! Crawler module for walking the registry's search hierarchy
//!
//! This module contains the core crawling logic, including:
//! - Site navigation (regions, comunas, result lists)
//! - The crawl controller with checkpointing and resume
//! - Overall crawl coordination

mod coordinator;
mod navigator;

pub use coordinator::{CrawlCounters, CrawlOptions, CrawlReport, CrawlScope, Crawler};
pub use navigator::SiteNavigator;

use crate::browser::DomDriver;
use crate::config::Config;
use crate::ScraperError;

/// Runs a complete crawl with the given driver
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Load the resume checkpoint, if one was requested
/// 2. Walk every region and comuna (or only the first of each in pilot scope)
/// 3. Extract each school's detail page
/// 4. Checkpoint and export on schedule
/// 5. Write the final export, or preserve progress on early termination
///
/// # Arguments
///
/// * `driver` - An open browser session, released when the crawl ends
/// * `config` - The crawler configuration
/// * `options` - Resume source, scope, and stop signal
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl completed or was interrupted
/// * `Err(ScraperError)` - Crawl failed
pub fn crawl<D: DomDriver>(
    driver: D,
    config: Config,
    options: CrawlOptions,
) -> Result<CrawlReport, ScraperError> {
    Crawler::new(driver, config, options)?.run()
}
