//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → auth.rs (X-API-Key gate, proxy prefix only)
//!     → Route dispatch
//!     → headers.rs (strip hop-by-hop / proxy-identity headers)
//!     → Forward upstream
//! ```
//!
//! # Design Decisions
//! - Fail closed: a configured secret rejects anything that does not match
//! - No secret configured means open access (development mode), logged loudly
//! - Upstream credentials (Authorization, cookies) are the caller's business

pub mod auth;
pub mod headers;

pub use auth::{auth_gate, AuthDecision, AuthPolicy, API_KEY_HEADER};
pub use headers::{forward_headers, strip_framing};
