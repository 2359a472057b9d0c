//! Configuration validation.
//!
//! Serde handles the syntactic checks; this module covers the semantic ones
//! (addresses parse, prefixes are well formed, upstream origins are absolute
//! http(s) URLs). All problems are reported, not just the first.

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("routing.prefix must start with '/' and not end with '/' (got {0:?})")]
    InvalidPrefix(String),

    #[error("{field}: not an absolute http(s) URL {value:?}")]
    InvalidUpstream { field: &'static str, value: String },

    #[error("limits.max_body_size must be greater than zero")]
    ZeroBodyLimit,
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    let prefix = &config.routing.prefix;
    if !prefix.starts_with('/') || prefix.ends_with('/') {
        errors.push(ValidationError::InvalidPrefix(prefix.clone()));
    }

    let upstreams = [
        ("upstreams.openai_base_url", &config.upstreams.openai_base_url),
        ("upstreams.google_base_url", &config.upstreams.google_base_url),
        ("upstreams.tavily_base_url", &config.upstreams.tavily_base_url),
    ];
    for (field, value) in upstreams {
        if !is_http_url(value) {
            errors.push(ValidationError::InvalidUpstream {
                field,
                value: value.clone(),
            });
        }
    }

    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}
