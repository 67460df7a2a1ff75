//! Field extraction from school detail pages
//!
//! This module turns a loaded detail page into a [`SchoolRecord`]:
//! - Each column is described declaratively by a [`FieldSpec`]
//! - Lookup strategies are tried in order; the first match wins
//! - A field nobody can find is recorded as absent with a warning
//! - Collapsed sections are expanded before the fields that need them
//!
//! Only an unreachable page fails a school; missing fields never do.

mod page;
mod strategy;

pub use page::{normalize_text, DetailPage};
pub use strategy::{FieldSpec, LookupStrategy};

use crate::browser::{DomDriver, DriverResult, Locator, Readiness};
use crate::config::Config;
use crate::model::{Column, SchoolRecord, SchoolReference};

/// Extracts one field from a parsed page
///
/// Tries every strategy of `spec` in order. Absence is a normal outcome: it is
/// logged as a warning and reported as `None`.
pub fn extract_field(page: &DetailPage, spec: &FieldSpec) -> Option<String> {
    for (index, strategy) in spec.strategies.iter().enumerate() {
        if let Some(value) = strategy.apply(page) {
            tracing::debug!(
                "{}: '{}' via strategy {} ({})",
                spec.column,
                value,
                index + 1,
                strategy.describe()
            );
            return Some(value);
        }
        tracing::trace!("{}: no match for {}", spec.column, strategy.describe());
    }

    tracing::warn!("Could not extract {} from {}", spec.column, page.url());
    None
}

/// Loads detail pages and fills school records
pub struct SchoolExtractor {
    fields: Vec<FieldSpec>,
    ready: Locator,
}

impl SchoolExtractor {
    pub fn new(fields: Vec<FieldSpec>, ready: Locator) -> Self {
        Self { fields, ready }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.fields.clone(),
            Locator::css(config.browser.detail_ready.clone()),
        )
    }

    /// Loads a school's detail page and extracts every field
    ///
    /// # Arguments
    ///
    /// * `driver` - The browser session
    /// * `reference` - The school to load
    /// * `region` / `comuna` - Crawl context copied into the record
    ///
    /// # Returns
    ///
    /// * `Ok(SchoolRecord)` - Best-effort record, possibly with absent fields
    /// * `Err(DriverError)` - The page could not be loaded at all
    pub fn extract(
        &self,
        driver: &mut dyn DomDriver,
        reference: &SchoolReference,
        region: &str,
        comuna: &str,
    ) -> DriverResult<SchoolRecord> {
        driver.navigate(&reference.url)?;
        driver.wait_until(&self.ready, Readiness::Present)?;

        let mut page = DetailPage::capture(driver, &reference.url)?;
        let mut record = SchoolRecord::new(region, comuna, &reference.url);
        let mut expanded: Vec<&Locator> = Vec::new();

        for field in &self.fields {
            if let Some(trigger) = &field.expand {
                if !expanded.contains(&trigger) {
                    expanded.push(trigger);
                    if let Some(refreshed) = expand_section(driver, trigger, &reference.url)? {
                        page = refreshed;
                    }
                }
            }

            record.set(field.column, extract_field(&page, field));
        }

        let found = self
            .fields
            .iter()
            .filter(|field| record.has(field.column))
            .count();
        tracing::info!(
            "Extracted {} (code {}): {}/{} fields | phone: {} | enrollment: {}",
            record.name.as_deref().unwrap_or("<unnamed>"),
            reference.code,
            found,
            self.fields.len(),
            display_or_na(&record, Column::Phone),
            display_or_na(&record, Column::TotalEnrollment),
        );

        Ok(record)
    }
}

/// Clicks an expand trigger and re-captures the page
///
/// A trigger that cannot be clicked means the section is already open; the
/// current snapshot is kept. Only a lost session is an error.
fn expand_section(
    driver: &mut dyn DomDriver,
    trigger: &Locator,
    url: &str,
) -> DriverResult<Option<DetailPage>> {
    match driver.click(trigger) {
        Ok(()) => match DetailPage::capture(driver, url) {
            Ok(page) => Ok(Some(page)),
            Err(e) if e.is_session_lost() => Err(e),
            Err(e) => {
                tracing::debug!("Keeping previous snapshot of {}: {}", url, e);
                Ok(None)
            }
        },
        Err(e) if e.is_session_lost() => Err(e),
        Err(e) => {
            tracing::debug!("No {} on {} ({}); assuming expanded", trigger, url, e);
            Ok(None)
        }
    }
}

fn display_or_na(record: &SchoolRecord, column: Column) -> &str {
    match record.value(column) {
        "" => "N/A",
        value => value,
    }
}
