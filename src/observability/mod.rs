//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request handling produces:
//!     → logging.rs (structured log events, pretty or JSON)
//!     → metrics.rs (request counters and upstream latency)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID is attached to the request span by the HTTP layer
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
