//! Headless Chrome implementation of the DOM driver
//!
//! Launches one Chrome process with a single tab and drives it over the
//! DevTools protocol. The session is released on [`DomDriver::quit`] or when
//! the driver is dropped.

use crate::browser::{DomDriver, DriverError, DriverResult, ElementSnapshot, Locator, Readiness};
use crate::config::BrowserConfig;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

const TEXT_CONTENT_FN: &str = "function() { return (this.textContent || '').trim(); }";

const IS_INTERACTIVE_FN: &str =
    "function() { return !this.disabled && this.getClientRects().length > 0; }";

const SELECT_VALUE_FN: &str = "function(value) { \
    this.value = value; \
    this.dispatchEvent(new Event('change', { bubbles: true })); \
    return this.value === value; }";

/// DOM driver backed by a headless (or visible) Chrome instance
pub struct ChromeDriver {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
    timeout: Duration,
    settle: Duration,
}

impl ChromeDriver {
    /// Launches Chrome and opens the working tab
    ///
    /// # Arguments
    ///
    /// * `config` - Browser settings (timeouts, window size, sandboxing)
    /// * `headless` - Run without a visible window
    pub fn launch(config: &BrowserConfig, headless: bool) -> DriverResult<Self> {
        let options = LaunchOptions::default_builder()
            .headless(headless)
            .sandbox(!config.no_sandbox)
            .window_size(Some((config.window_width, config.window_height)))
            .idle_browser_timeout(Duration::from_secs(config.wait_timeout_secs.max(1) * 30))
            .build()
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let browser = Browser::new(options).map_err(|e| DriverError::Launch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let timeout = Duration::from_secs(config.wait_timeout_secs);
        tab.set_default_timeout(timeout);

        tracing::info!(
            "Chrome session started (headless: {}, window {}x{})",
            headless,
            config.window_width,
            config.window_height
        );

        Ok(Self {
            browser: Some(browser),
            tab: Some(tab),
            timeout,
            settle: Duration::from_millis(config.settle_delay_ms),
        })
    }

    fn tab(&self) -> DriverResult<&Arc<Tab>> {
        self.tab.as_ref().ok_or(DriverError::SessionClosed)
    }

    /// Gives dynamically populated controls time to update after an action
    fn settle(&self) {
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
    }

    fn find_all<'a>(tab: &'a Tab, locator: &Locator) -> DriverResult<Vec<Element<'a>>> {
        let found = match locator {
            Locator::Css(selector) => tab.find_elements(selector),
            Locator::LinkText(text) => tab.find_elements_by_xpath(&link_text_xpath(text)),
        };

        match found {
            Ok(elements) => Ok(elements),
            Err(e) if is_closed(&e) => Err(DriverError::SessionClosed),
            // the protocol reports "no match" as an error
            Err(_) => Ok(Vec::new()),
        }
    }

    fn find_first<'a>(tab: &'a Tab, locator: &Locator) -> DriverResult<Element<'a>> {
        Self::find_all(tab, locator)?
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::ElementNotFound {
                locator: locator.to_string(),
            })
    }

    fn snapshot(element: &Element<'_>, attributes: &[&str]) -> DriverResult<ElementSnapshot> {
        let mut text = element.get_inner_text().map_err(script_error)?;
        if text.trim().is_empty() {
            // innerText is empty for options of a closed select
            text = element
                .call_js_fn(TEXT_CONTENT_FN, vec![], false)
                .map_err(script_error)?
                .value
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
        }

        let mut snapshot = ElementSnapshot::new(text);
        for name in attributes {
            if let Some(value) = element.get_attribute_value(name).map_err(script_error)? {
                snapshot.attributes.insert((*name).to_string(), value);
            }
        }
        Ok(snapshot)
    }

    fn is_interactive(element: &Element<'_>) -> bool {
        element
            .call_js_fn(IS_INTERACTIVE_FN, vec![], false)
            .ok()
            .and_then(|remote| remote.value)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

impl DomDriver for ChromeDriver {
    fn navigate(&mut self, url: &str) -> DriverResult<()> {
        let tab = self.tab()?;
        tracing::debug!("Navigating to {}", url);

        tab.navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| {
                if is_closed(&e) {
                    DriverError::SessionClosed
                } else {
                    DriverError::Navigation {
                        url: url.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        Ok(())
    }

    fn wait_until(&mut self, locator: &Locator, readiness: Readiness) -> DriverResult<()> {
        let tab = self.tab()?;
        let deadline = Instant::now() + self.timeout;

        loop {
            if let Some(element) = Self::find_all(tab, locator)?.first() {
                match readiness {
                    Readiness::Present => return Ok(()),
                    Readiness::Interactive if Self::is_interactive(element) => return Ok(()),
                    Readiness::Interactive => {}
                }
            }

            if Instant::now() >= deadline {
                return Err(DriverError::Timeout {
                    locator: locator.to_string(),
                    seconds: self.timeout.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn find_elements(
        &mut self,
        locator: &Locator,
        attributes: &[&str],
    ) -> DriverResult<Vec<ElementSnapshot>> {
        let tab = self.tab()?;
        Self::find_all(tab, locator)?
            .iter()
            .map(|element| Self::snapshot(element, attributes))
            .collect()
    }

    fn click(&mut self, locator: &Locator) -> DriverResult<()> {
        {
            let tab = self.tab()?;
            let element = Self::find_first(tab, locator)?;
            element.click().map_err(script_error)?;
        }
        self.settle();
        Ok(())
    }

    fn select_option(&mut self, select: &Locator, value: &str) -> DriverResult<()> {
        {
            let tab = self.tab()?;
            let element = Self::find_first(tab, select)?;
            let selected = element
                .call_js_fn(SELECT_VALUE_FN, vec![serde_json::json!(value)], false)
                .map_err(script_error)?
                .value
                .and_then(|v| v.as_bool())
                .unwrap_or(false);

            if !selected {
                return Err(DriverError::ElementNotFound {
                    locator: format!("{} option `{}`", select, value),
                });
            }
        }
        self.settle();
        Ok(())
    }

    fn page_source(&mut self) -> DriverResult<String> {
        let tab = self.tab()?;
        tab.get_content().map_err(|e| {
            if is_closed(&e) {
                DriverError::SessionClosed
            } else {
                DriverError::Script(e.to_string())
            }
        })
    }

    fn quit(&mut self) -> DriverResult<()> {
        if let Some(tab) = self.tab.take() {
            if let Err(e) = tab.close(false) {
                tracing::debug!("Closing tab failed: {}", e);
            }
        }
        if self.browser.take().is_some() {
            tracing::info!("Chrome session terminated");
        }
        Ok(())
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        let _ = self.quit();
    }
}

/// XPath matching anchors whose normalized text contains `text`
fn link_text_xpath(text: &str) -> String {
    if text.contains('\'') {
        format!("//a[contains(normalize-space(.), \"{}\")]", text)
    } else {
        format!("//a[contains(normalize-space(.), '{}')]", text)
    }
}

fn is_closed(error: &anyhow::Error) -> bool {
    let message = error.to_string().to_lowercase();
    message.contains("connection is closed") || message.contains("channel closed")
}

fn script_error(error: anyhow::Error) -> DriverError {
    if is_closed(&error) {
        DriverError::SessionClosed
    } else {
        DriverError::Script(error.to_string())
    }
}
