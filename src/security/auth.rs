//! API-key gate for the proxy routes.
//! Runs ahead of route dispatch for every request under the proxy prefix.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::config::ProxyConfig;
use crate::error::ProxyError;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Outcome of evaluating a request's credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// No secret configured; everything is let through.
    Open,
    /// Secret configured and matched.
    Admit,
    /// Secret configured and missing or mismatched.
    Reject,
}

/// Immutable gate settings built once from the configuration.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    secret: Option<String>,
    prefix: String,
    exempt_preflight: bool,
}

impl AuthPolicy {
    pub fn new(secret: Option<String>, prefix: impl Into<String>, exempt_preflight: bool) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            prefix: prefix.into(),
            exempt_preflight,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(
            config.auth.api_key.clone(),
            config.routing.prefix.clone(),
            config.auth.exempt_preflight,
        )
    }

    /// Whether a non-empty secret is configured.
    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Whether the gate applies to this method and path at all.
    pub fn guards(&self, method: &Method, path: &str) -> bool {
        if self.exempt_preflight && method == Method::OPTIONS {
            return false;
        }
        path.starts_with(&self.prefix)
    }

    /// Compare the request's `X-API-Key` with the configured secret.
    pub fn evaluate(&self, headers: &HeaderMap) -> AuthDecision {
        let Some(expected) = self.secret.as_deref() else {
            return AuthDecision::Open;
        };

        let presented = headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());

        match presented {
            Some(key) if key == expected => AuthDecision::Admit,
            _ => AuthDecision::Reject,
        }
    }
}

/// Middleware enforcing [`AuthPolicy`] before any proxying happens.
pub async fn auth_gate(
    State(policy): State<Arc<AuthPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !policy.guards(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    match policy.evaluate(request.headers()) {
        AuthDecision::Open => {
            warn!("PROXY_API_KEY not set, authentication disabled");
            next.run(request).await
        }
        AuthDecision::Admit => next.run(request).await,
        AuthDecision::Reject => {
            warn!(
                method = %request.method(),
                path = %request.uri().path(),
                "Rejected request with missing or invalid API key"
            );
            ProxyError::Unauthorized.into_response()
        }
    }
}
