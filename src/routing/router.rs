//! Declarative route table.
//!
//! # Responsibilities
//! - Describe every proxy route once: mount name, base origin, methods
//! - Tell the dispatcher which methods carry a body
//! - Produce the pre-flight `Access-Control-Allow-Methods` value per route
//!
//! # Design Decisions
//! - Immutable after construction (shared via Arc, no locks)
//! - One table entry per upstream instead of one handler per upstream
//! - Default origins come from configuration, parsed once at startup

use std::sync::Arc;

use axum::http::Method;
use url::Url;

use crate::config::UpstreamsConfig;

/// Mount name of the AI-chat route.
pub const OPENAI: &str = "openai";
/// Mount name of the search-provider route.
pub const GOOGLE: &str = "google";
/// Mount name of the web-search route.
pub const TAVILY: &str = "tavily";

/// Methods the generic route accepts and advertises.
pub const GENERIC_ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS, PATCH";

/// Path rewrite for deployment-scoped addressing.
///
/// When the origin contains `host_marker` and a deployment is supplied,
/// `<version_prefix>/<rest>` becomes `<deployment_infix>/<deployment>/<rest>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRewrite {
    pub host_marker: String,
    pub version_prefix: String,
    pub deployment_infix: String,
}

impl Default for DeploymentRewrite {
    fn default() -> Self {
        Self {
            host_marker: "openai.azure.com".to_string(),
            version_prefix: "v1".to_string(),
            deployment_infix: "openai/deployments".to_string(),
        }
    }
}

/// Where a route's upstream origin comes from.
#[derive(Debug, Clone)]
pub enum BaseOrigin {
    /// Whole target taken verbatim from the `url` query parameter.
    QueryUrl,
    /// Constant origin.
    Fixed(Url),
    /// Default origin, overridable per request, with a deployment rewrite.
    Dynamic {
        default: Url,
        rewrite: DeploymentRewrite,
    },
}

/// One proxy route.
#[derive(Debug, Clone)]
pub struct Route {
    /// Path segment under the prefix; empty for the generic route.
    pub name: String,
    pub base: BaseOrigin,
    /// Methods forwarded upstream (OPTIONS is always answered locally).
    pub methods: Vec<Method>,
    /// Methods whose inbound body is forwarded.
    pub body_methods: Vec<Method>,
}

impl Route {
    pub fn generic() -> Self {
        Self {
            name: String::new(),
            base: BaseOrigin::QueryUrl,
            methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::PATCH,
            ],
            body_methods: vec![Method::POST, Method::PUT, Method::PATCH],
        }
    }

    pub fn fixed(name: &str, origin: Url, methods: Vec<Method>) -> Self {
        Self {
            name: name.to_string(),
            base: BaseOrigin::Fixed(origin),
            methods,
            body_methods: vec![Method::POST],
        }
    }

    pub fn dynamic(name: &str, default: Url, methods: Vec<Method>) -> Self {
        Self {
            name: name.to_string(),
            base: BaseOrigin::Dynamic {
                default,
                rewrite: DeploymentRewrite::default(),
            },
            methods,
            body_methods: vec![Method::POST],
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self.base, BaseOrigin::QueryUrl)
    }

    pub fn carries_body(&self, method: &Method) -> bool {
        self.body_methods.contains(method)
    }

    /// Axum path pattern for this route.
    pub fn mount_path(&self, prefix: &str) -> String {
        if self.is_generic() {
            prefix.to_string()
        } else {
            format!("{}/{}/{{*path}}", prefix, self.name)
        }
    }

    /// Raw (still percent-encoded) path left after the route's mount point.
    pub fn residual<'a>(&self, prefix: &str, path: &'a str) -> &'a str {
        if self.is_generic() {
            return "";
        }
        path.strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .and_then(|rest| rest.strip_prefix(self.name.as_str()))
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or("")
    }

    /// Value of `Access-Control-Allow-Methods` on this route's pre-flight.
    pub fn allow_methods(&self) -> String {
        if self.is_generic() {
            return GENERIC_ALLOW_METHODS.to_string();
        }
        let mut methods: Vec<&str> = self.methods.iter().map(Method::as_str).collect();
        methods.push(Method::OPTIONS.as_str());
        methods.join(", ")
    }
}

/// The full, immutable set of proxy routes.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            routes: routes.into_iter().map(Arc::new).collect(),
        }
    }

    /// Build the standard table: generic, AI-chat, search and web-search.
    pub fn from_config(upstreams: &UpstreamsConfig) -> Result<Self, url::ParseError> {
        Ok(Self::new(vec![
            Route::generic(),
            Route::dynamic(
                OPENAI,
                Url::parse(&upstreams.openai_base_url)?,
                vec![Method::GET, Method::POST, Method::DELETE],
            ),
            Route::fixed(
                GOOGLE,
                Url::parse(&upstreams.google_base_url)?,
                vec![Method::GET, Method::POST],
            ),
            Route::fixed(
                TAVILY,
                Url::parse(&upstreams.tavily_base_url)?,
                vec![Method::GET, Method::POST],
            ),
        ]))
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Route>> {
        self.routes.iter().find(|route| route.name == name)
    }
}
