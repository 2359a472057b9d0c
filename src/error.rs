//! Error taxonomy for request handling.
//!
//! Every failure raised while handling a proxied request is one of these
//! variants. The HTTP mapping (status code, JSON body, CORS headers) lives in
//! `http::response`, so the resolver and forwarder stay free of response
//! building.

use axum::http::StatusCode;
use thiserror::Error;

/// Message used when an error has no usable description.
pub const FALLBACK_MESSAGE: &str = "Internal proxy error";

/// Errors produced while resolving, authorizing or forwarding a request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Generic route called without a `url` query parameter.
    #[error("Missing \"url\" query parameter")]
    MissingUrl,

    /// Generic route `url` parameter is not an absolute URL.
    #[error("Invalid URL provided")]
    InvalidUrl,

    /// Dynamic base origin override is not an absolute URL.
    #[error("Invalid base URL provided")]
    InvalidBaseUrl,

    /// Missing or mismatched `X-API-Key` header.
    #[error("Unauthorized")]
    Unauthorized,

    /// Inbound body could not be read (I/O failure or size limit).
    #[error("{0}")]
    Body(#[source] axum::Error),

    /// Network-level failure talking to the upstream.
    #[error("{0}")]
    Upstream(#[from] reqwest::Error),

    /// Anything else that prevented a response from being built.
    #[error("{0}")]
    Internal(String),
}

impl ProxyError {
    /// HTTP status code for this error kind.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingUrl | ProxyError::InvalidUrl | ProxyError::InvalidBaseUrl => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::Unauthorized => StatusCode::UNAUTHORIZED,
            ProxyError::Body(_) | ProxyError::Upstream(_) | ProxyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// User-visible message for the `error` field.
    pub fn message(&self) -> String {
        let message = self.to_string();
        if message.is_empty() {
            FALLBACK_MESSAGE.to_string()
        } else {
            message
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProxyError::MissingUrl.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ProxyError::InvalidUrl.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ProxyError::InvalidBaseUrl.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ProxyError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ProxyError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(ProxyError::MissingUrl.message(), "Missing \"url\" query parameter");
        assert_eq!(ProxyError::InvalidUrl.message(), "Invalid URL provided");
        assert_eq!(ProxyError::Internal(String::new()).message(), FALLBACK_MESSAGE);
    }
}
