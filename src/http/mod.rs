//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, API-key gate)
//!     → server.rs (route dispatch: forwarded methods vs. OPTIONS pre-flight)
//!     → forward.rs (resolve URL, filter headers, buffer body, call upstream)
//!     → response.rs (CORS headers, JSON errors)
//!     → Streamed back to the client
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use request::{GeneratedRequestId, MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{build_router, AppState, HttpServer, ServerError};
