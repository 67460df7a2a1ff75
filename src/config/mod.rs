//! Configuration module
//!
//! This module handles loading, parsing, and validating the optional TOML
//! configuration file. Every key has a default matching the MINEDUC
//! advanced-search site, so the tool runs without a file.
//!
//! # Example
//!
//! ```no_run
//! use mineduc_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Readiness waits time out after {}s", config.browser.wait_timeout_secs);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    default_fields, BrowserConfig, Config, CrawlConfig, OutputConfig, SiteConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_or_default, load_config_with_hash,
    parse_config, render_config,
};
pub use validation::validate;
