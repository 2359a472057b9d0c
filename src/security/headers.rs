//! Outbound header filtering.
//!
//! # Responsibilities
//! - Strip hop-by-hop and proxy-identity headers before forwarding
//! - Strip the proxy's own credential (`X-API-Key`)
//! - Pass everything else (Authorization, cookies, content-type, custom) through
//! - Drop inbound body framing; the outbound client frames the buffered body
//!
//! # Design Decisions
//! - Header names are already lowercase in `HeaderMap`, so the deny-list
//!   match is case-insensitive by construction
//! - Multi-valued headers keep every value, in order

use axum::http::{
    header::{CONTENT_LENGTH, TRANSFER_ENCODING},
    HeaderMap, HeaderName,
};

use crate::security::auth::API_KEY_HEADER;

/// Headers never forwarded upstream.
pub const SKIPPED_HEADERS: &[&str] = &[
    "host",
    "connection",
    API_KEY_HEADER,
    "x-forwarded-for",
    "x-forwarded-proto",
    "x-forwarded-host",
];

/// Framing headers describing the inbound body, not the outbound one.
pub const FRAMING_HEADERS: [HeaderName; 2] = [CONTENT_LENGTH, TRANSFER_ENCODING];

pub fn is_skipped(name: &str) -> bool {
    SKIPPED_HEADERS
        .iter()
        .any(|skipped| name.eq_ignore_ascii_case(skipped))
}

/// Derive the outbound header set from the inbound one.
pub fn forward_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut outbound = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if !is_skipped(name.as_str()) {
            outbound.append(name.clone(), value.clone());
        }
    }
    outbound
}

/// Remove inbound framing so a dropped or re-buffered body is never
/// announced with the caller's length or encoding.
pub fn strip_framing(headers: &mut HeaderMap) {
    for name in &FRAMING_HEADERS {
        headers.remove(name);
    }
}
