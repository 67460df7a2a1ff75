//! DOM driver abstraction
//!
//! The crawl only needs a handful of browser primitives: navigate, find
//! elements, click, wait for a readiness condition, and read element text or
//! attributes. They are expressed by the [`DomDriver`] trait so the controller
//! can run against a real browser ([`ChromeDriver`]) or an in-memory site.
//!
//! Element reads are returned as [`ElementSnapshot`] values rather than live
//! handles, which keeps the trait free of borrow-bound element types.

mod chrome;

pub use chrome::ChromeDriver;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Errors raised by a DOM driver
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out after {seconds}s waiting for {locator}")]
    Timeout { locator: String, seconds: u64 },

    #[error("Element not found: {locator}")]
    ElementNotFound { locator: String },

    #[error("Script error: {0}")]
    Script(String),

    #[error("Browser session is closed")]
    SessionClosed,
}

impl DriverError {
    /// Returns true if the browser session can no longer be used
    pub fn is_session_lost(&self) -> bool {
        matches!(self, Self::SessionClosed | Self::Launch(_))
    }
}

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// How to find an element on the current page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "by", content = "value")]
pub enum Locator {
    /// CSS selector
    Css(String),

    /// Anchor whose text contains the given string
    LinkText(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn link_text(text: impl Into<String>) -> Self {
        Self::LinkText(text.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(selector) => write!(f, "css `{}`", selector),
            Self::LinkText(text) => write!(f, "link text `{}`", text),
        }
    }
}

/// Condition an element must meet before a wait returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Element exists in the DOM
    Present,

    /// Element exists and accepts interaction
    Interactive,
}

/// Text and attributes read from one element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSnapshot {
    /// Rendered text, trimmed
    pub text: String,

    /// Attribute values by name
    pub attributes: HashMap<String, String>,
}

impl ElementSnapshot {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into().trim().to_string(),
            attributes: HashMap::new(),
        }
    }

    /// Adds an attribute, builder style
    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Returns an attribute value
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Browser primitives used by the crawl
///
/// A driver holds exactly one navigable page state. Every call blocks until it
/// completes or fails; waits are bounded by the driver's readiness timeout.
pub trait DomDriver {
    /// Loads a URL in the session's page
    fn navigate(&mut self, url: &str) -> DriverResult<()>;

    /// Blocks until the located element meets the readiness condition
    fn wait_until(&mut self, locator: &Locator, readiness: Readiness) -> DriverResult<()>;

    /// Reads every element matching the locator, in document order
    ///
    /// `attributes` names the attributes to capture for each element.
    fn find_elements(
        &mut self,
        locator: &Locator,
        attributes: &[&str],
    ) -> DriverResult<Vec<ElementSnapshot>>;

    /// Clicks the first element matching the locator
    fn click(&mut self, locator: &Locator) -> DriverResult<()>;

    /// Chooses an option of a `<select>` by value and fires its change event
    fn select_option(&mut self, select: &Locator, value: &str) -> DriverResult<()>;

    /// Returns the current page's serialized DOM
    fn page_source(&mut self) -> DriverResult<String>;

    /// Terminates the browser session
    ///
    /// Must be safe to call more than once.
    fn quit(&mut self) -> DriverResult<()>;
}
