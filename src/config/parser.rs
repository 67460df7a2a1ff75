use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// Sections and keys missing from the file keep their built-in defaults.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use mineduc_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Checkpoint every {} records", config.crawl.checkpoint_interval);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Loads the file when one is given, otherwise validates the defaults
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let config = Config::default();
            validate(&config)?;
            Ok(config)
        }
    }
}

/// Renders the effective configuration as TOML
pub fn render_config(config: &Config) -> Result<String, ConfigError> {
    toml::to_string_pretty(config).map_err(|e| ConfigError::Validation(e.to_string()))
}

/// Computes a SHA-256 fingerprint of the effective configuration
///
/// The fingerprint is stored in checkpoints so a resumed run can tell whether
/// it is using the same site selectors and field lookups.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 of the configuration rendered as TOML
/// * `Err(ConfigError)` - The configuration could not be rendered
pub fn compute_config_hash(config: &Config) -> Result<String, ConfigError> {
    let rendered = render_config(config)?;
    let mut hasher = Sha256::new();
    hasher.update(rendered.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its fingerprint
pub fn load_config_with_hash(path: Option<&Path>) -> Result<(Config, String), ConfigError> {
    let config = load_config_or_default(path)?;
    let hash = compute_config_hash(&config)?;
    Ok((config, hash))
}
