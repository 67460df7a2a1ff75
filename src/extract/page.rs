//! Parsed snapshot of a school's detail page

use crate::browser::{DomDriver, DriverResult};
use scraper::Html;

/// A detail page captured from the driver and parsed for lookups
pub struct DetailPage {
    url: String,
    document: Html,
}

impl DetailPage {
    /// Parses HTML captured from `url`
    pub fn parse(url: &str, html: &str) -> Self {
        Self {
            url: url.to_string(),
            document: Html::parse_document(html),
        }
    }

    /// Captures the driver's current page
    pub fn capture(driver: &mut dyn DomDriver, url: &str) -> DriverResult<Self> {
        let html = driver.page_source()?;
        Ok(Self::parse(url, &html))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn document(&self) -> &Html {
        &self.document
    }
}

/// Joins text fragments and collapses whitespace runs
pub fn normalize_text<'a>(fragments: impl Iterator<Item = &'a str>) -> String {
    let joined: String = fragments.collect();
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}
