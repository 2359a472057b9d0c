//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     UpstreamsConfig
//!     → router.rs (declarative route table: generic, openai, google, tavily)
//!     → Frozen as immutable RouteTable
//!
//! Per request:
//!     Route + residual path + headers + query
//!     → resolver.rs (base origin, deployment rewrite, query merge)
//!     → Absolute upstream URL or ProxyError
//! ```
//!
//! # Design Decisions
//! - Routes built once at startup, immutable at runtime
//! - Resolution is a pure function of its inputs
//! - One parametrized table instead of one handler per upstream

pub mod resolver;
pub mod router;

pub use resolver::resolve;
pub use router::{BaseOrigin, DeploymentRewrite, Route, RouteTable};
