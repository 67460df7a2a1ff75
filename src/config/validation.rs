use crate::browser::Locator;
use crate::config::types::{BrowserConfig, Config, CrawlConfig, OutputConfig, SiteConfig};
use crate::extract::{FieldSpec, LookupStrategy};
use crate::ConfigError;
use regex::Regex;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_browser_config(&config.browser)?;
    validate_crawl_config(&config.crawl)?;
    validate_output_config(&config.output)?;
    validate_fields(&config.fields)?;
    Ok(())
}

/// Validates site addresses and selectors
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_http_url("base-url", &config.base_url)?;

    if !config.detail_url_template.contains("{code}") {
        return Err(ConfigError::Validation(format!(
            "detail-url-template must contain '{{code}}', got '{}'",
            config.detail_url_template
        )));
    }
    validate_http_url("detail-url-template", &config.detail_url("0"))?;

    for (name, selector) in [
        ("region-select", &config.region_select),
        ("comuna-select", &config.comuna_select),
        ("search-button", &config.search_button),
        ("results-table", &config.results_table),
        ("result-links", &config.result_links),
    ] {
        validate_selector(name, selector)?;
    }

    let pattern = Regex::new(&config.code_pattern).map_err(|e| {
        ConfigError::InvalidPattern(format!("code-pattern '{}': {}", config.code_pattern, e))
    })?;
    if pattern.captures_len() < 2 {
        return Err(ConfigError::InvalidPattern(format!(
            "code-pattern '{}' must contain a capture group",
            config.code_pattern
        )));
    }

    if config.all_option_label.trim().is_empty() {
        return Err(ConfigError::Validation(
            "all-option-label cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates browser settings
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.wait_timeout_secs < 1 || config.wait_timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "wait-timeout-secs must be between 1 and 300, got {}",
            config.wait_timeout_secs
        )));
    }

    if config.window_width < 320 || config.window_height < 240 {
        return Err(ConfigError::Validation(format!(
            "window size must be at least 320x240, got {}x{}",
            config.window_width, config.window_height
        )));
    }

    validate_selector("detail-ready", &config.detail_ready)
}

/// Validates crawl settings
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.checkpoint_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "checkpoint-interval must be >= 1, got {}",
            config.checkpoint_interval
        )));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    let paths = [
        ("checkpoint-path", &config.checkpoint_path),
        ("export-path", &config.export_path),
        ("intermediate-export-path", &config.intermediate_export_path),
        ("pilot-export-path", &config.pilot_export_path),
        ("log-path", &config.log_path),
    ];

    for (name, path) in paths {
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    // a crash mid-run must never overwrite the last good final export
    if config.export_path == config.intermediate_export_path {
        return Err(ConfigError::Validation(
            "export-path and intermediate-export-path must differ".to_string(),
        ));
    }

    Ok(())
}

/// Validates field lookups
fn validate_fields(fields: &[FieldSpec]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for field in fields {
        if field.column.is_context() {
            return Err(ConfigError::Validation(format!(
                "column '{}' is filled from crawl context and cannot be extracted",
                field.column
            )));
        }

        if !seen.insert(field.column) {
            return Err(ConfigError::Validation(format!(
                "column '{}' is defined more than once",
                field.column
            )));
        }

        if field.strategies.is_empty() {
            return Err(ConfigError::Validation(format!(
                "field '{}' must have at least one lookup strategy",
                field.column
            )));
        }

        for strategy in &field.strategies {
            validate_strategy(strategy)?;
        }

        if let Some(Locator::Css(selector)) = &field.expand {
            validate_selector("expand", selector)?;
        }
    }

    Ok(())
}

fn validate_strategy(strategy: &LookupStrategy) -> Result<(), ConfigError> {
    match strategy {
        LookupStrategy::Selector { selector } => validate_selector("selector", selector),
        LookupStrategy::LabelSibling {
            label_tag,
            label,
            value_tag,
            ..
        } => {
            if label.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "label-sibling label cannot be empty".to_string(),
                ));
            }
            validate_tag_name(label_tag)?;
            validate_tag_name(value_tag)
        }
    }
}

fn validate_selector(name: &str, selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidPattern(format!("{} '{}': {:?}", name, selector, e)))
}

fn validate_tag_name(tag: &str) -> Result<(), ConfigError> {
    if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ConfigError::InvalidPattern(format!(
            "'{}' is not an element name",
            tag
        )));
    }
    Ok(())
}

fn validate_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", name, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            name, value
        )));
    }

    Ok(())
}
