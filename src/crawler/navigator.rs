//! Site navigation for the registry's advanced-search page
//!
//! Every step of the region → comuna → result-list walk is a method here.
//! Option lists and result links are read as snapshots and filtered by the
//! pure `parse_*` helpers, so the filtering rules are testable without a
//! browser.

use crate::browser::{DomDriver, DriverError, DriverResult, ElementSnapshot, Locator, Readiness};
use crate::config::SiteConfig;
use crate::model::{Comuna, Region, SchoolReference};
use crate::ConfigError;
use regex::Regex;
use std::thread;
use std::time::{Duration, Instant};

const DEFAULT_WAIT: Duration = Duration::from_secs(10);
const OPTION_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Drives the search form of the registry site
#[derive(Debug, Clone)]
pub struct SiteNavigator {
    site: SiteConfig,
    code_pattern: Regex,
    all_label: String,
    wait_timeout: Duration,
}

impl SiteNavigator {
    pub fn new(site: SiteConfig) -> Result<Self, ConfigError> {
        let code_pattern = Regex::new(&site.code_pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("code-pattern '{}': {}", site.code_pattern, e))
        })?;
        let all_label = site.all_option_label.to_lowercase();

        Ok(Self {
            site,
            code_pattern,
            all_label,
            wait_timeout: DEFAULT_WAIT,
        })
    }

    /// Sets how long to wait for a region's comunas to load
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Loads the search page and waits for the region selector
    pub fn open_search_page(&self, driver: &mut dyn DomDriver) -> DriverResult<()> {
        driver.navigate(&self.site.base_url)?;
        driver.wait_until(&Locator::css(&self.site.region_select), Readiness::Interactive)
    }

    /// Lists the selectable regions, without the synthetic "all" option
    pub fn regions(&self, driver: &mut dyn DomDriver) -> DriverResult<Vec<Region>> {
        driver.wait_until(&Locator::css(&self.site.region_select), Readiness::Interactive)?;
        let options = driver.find_elements(&Locator::css(self.site.region_options()), &["value"])?;
        let regions = self.parse_regions(&options);
        tracing::info!("Found {} regions", regions.len());
        Ok(regions)
    }

    /// Chooses a region and waits for its comunas to load
    pub fn select_region(&self, driver: &mut dyn DomDriver, region: &Region) -> DriverResult<()> {
        driver.select_option(&Locator::css(&self.site.region_select), &region.id)?;
        self.wait_for_comunas(driver).map(|_| ())
    }

    /// Lists the comunas of the selected region, without the "all" option
    pub fn comunas(&self, driver: &mut dyn DomDriver) -> DriverResult<Vec<Comuna>> {
        let comunas = self.wait_for_comunas(driver)?;
        tracing::info!("Found {} comunas", comunas.len());
        Ok(comunas)
    }

    /// Polls the comuna options until a real comuna is listed
    ///
    /// The comuna control is on the page before a region is chosen and only
    /// holds the "all" option until the region's list arrives.
    fn wait_for_comunas(&self, driver: &mut dyn DomDriver) -> DriverResult<Vec<Comuna>> {
        driver.wait_until(&Locator::css(&self.site.comuna_select), Readiness::Present)?;

        let options = Locator::css(self.site.comuna_options());
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            let comunas = self.parse_comunas(&driver.find_elements(&options, &["value"])?);
            if !comunas.is_empty() {
                return Ok(comunas);
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout {
                    locator: options.to_string(),
                    seconds: self.wait_timeout.as_secs(),
                });
            }
            thread::sleep(OPTION_POLL_INTERVAL);
        }
    }

    /// Chooses a comuna and submits the search
    pub fn search_comuna(&self, driver: &mut dyn DomDriver, comuna: &Comuna) -> DriverResult<()> {
        let select = Locator::css(&self.site.comuna_select);
        let button = Locator::css(&self.site.search_button);

        driver.wait_until(&select, Readiness::Interactive)?;
        driver.select_option(&select, &comuna.id)?;
        driver.wait_until(&button, Readiness::Interactive)?;
        driver.click(&button)
    }

    /// Reads the school links of the rendered result list
    pub fn school_references(
        &self,
        driver: &mut dyn DomDriver,
    ) -> DriverResult<Vec<SchoolReference>> {
        driver.wait_until(&Locator::css(&self.site.results_table), Readiness::Present)?;
        let links = driver.find_elements(&Locator::css(&self.site.result_links), &["onclick"])?;
        let references = self.parse_references(&links);
        tracing::info!("Found {} schools on this page", references.len());
        Ok(references)
    }

    /// Keeps options with a value, dropping the "all" option by value or label
    pub fn parse_regions(&self, options: &[ElementSnapshot]) -> Vec<Region> {
        options
            .iter()
            .filter_map(|option| {
                let value = option.attribute("value").unwrap_or_default().trim();
                if value.is_empty()
                    || value.to_lowercase() == self.all_label
                    || option.text.to_lowercase() == self.all_label
                {
                    return None;
                }
                Some(Region {
                    id: value.to_string(),
                    display_name: option.text.clone(),
                })
            })
            .collect()
    }

    /// Keeps options with a real value whose label does not mention "all"
    pub fn parse_comunas(&self, options: &[ElementSnapshot]) -> Vec<Comuna> {
        options
            .iter()
            .filter_map(|option| {
                let value = option.attribute("value").unwrap_or_default().trim();
                if value.is_empty()
                    || value == self.site.all_comuna_value
                    || option.text.to_lowercase().contains(&self.all_label)
                {
                    return None;
                }
                Some(Comuna {
                    id: value.to_string(),
                    display_name: option.text.clone(),
                })
            })
            .collect()
    }

    /// Turns result links into detail-page references
    ///
    /// Only links whose `onclick` carries the detail-form marker count; the
    /// school code is the first capture group of the code pattern.
    pub fn parse_references(&self, links: &[ElementSnapshot]) -> Vec<SchoolReference> {
        links
            .iter()
            .filter_map(|link| link.attribute("onclick"))
            .filter(|onclick| onclick.contains(&self.site.link_marker))
            .filter_map(|onclick| {
                let code = self.code_pattern.captures(onclick)?.get(1)?.as_str();
                Some(SchoolReference {
                    code: code.to_string(),
                    url: self.site.detail_url(code),
                })
            })
            .collect()
    }
}
