//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ProxyConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Fill in values that come from the process environment.
///
/// The secret from the file wins; otherwise the variable named by
/// `auth.api_key_env` is read. Empty strings count as unset.
pub fn apply_env_overrides(config: &mut ProxyConfig) {
    let from_file = config.auth.api_key.take().filter(|key| !key.is_empty());
    config.auth.api_key = from_file.or_else(|| {
        std::env::var(&config.auth.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
    });
}
