//! Request identification.
//!
//! Every inbound request gets an `x-request-id` (UUID v4) unless the caller
//! already sent one. The id is recorded on the request span and echoed on
//! the response. A generated id is marked with [`GeneratedRequestId`] so the
//! forwarder can keep it off the upstream request.

use axum::{
    body::Body,
    http::{HeaderValue, Request},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Request extension present when the proxy, not the caller, supplied the ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedRequestId;

/// Mark requests that arrive without an ID. Must run ahead of the ID layer.
pub async fn mark_generated_request_id(mut request: Request<Body>) -> Request<Body> {
    if !request.headers().contains_key(X_REQUEST_ID) {
        request.extensions_mut().insert(GeneratedRequestId);
    }
    request
}

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Read the request ID for logging.
pub fn request_id<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}
