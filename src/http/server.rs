//! HTTP server setup and route dispatch.
//!
//! # Responsibilities
//! - Build the Axum Router from the route table
//! - Map each route's methods to the forwarder, OPTIONS to the pre-flight responder
//! - Wire up middleware (request ID, tracing, API-key gate)
//! - Serve on a listener until the shutdown signal fires

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::Request as HttpRequest,
    middleware,
    routing::{MethodFilter, MethodRouter},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::forward::proxy;
use crate::http::request::{mark_generated_request_id, request_id, MakeRequestUuidV4};
use crate::http::response::{method_not_allowed, not_found, preflight};
use crate::routing::router::{Route, RouteTable};
use crate::security::auth::{auth_gate, AuthPolicy};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub routes: Arc<RouteTable>,
    /// Shared outbound client; safe for concurrent use.
    pub client: reqwest::Client,
}

/// Errors raised while assembling the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid upstream origin: {0}")]
    Upstream(#[from] url::ParseError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// HTTP server for the forwarding proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
    auth: Arc<AuthPolicy>,
}

impl HttpServer {
    /// Create a new HTTP server from a validated configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let config = Arc::new(config);
        let routes = Arc::new(RouteTable::from_config(&config.upstreams)?);

        // Upstreams are reached directly, never through an environment proxy.
        let client = reqwest::Client::builder().no_proxy().build()?;

        let auth = Arc::new(AuthPolicy::from_config(&config));
        let state = AppState {
            config: config.clone(),
            routes,
            client,
        };

        Ok(Self {
            router: build_router(state, auth.clone()),
            config,
            auth,
        })
    }

    /// The fully layered router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            prefix = %self.config.routing.prefix,
            auth_enabled = self.auth.is_enabled(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router: one entry per route, behind the API-key gate.
pub fn build_router(state: AppState, auth: Arc<AuthPolicy>) -> Router {
    let prefix = state.config.routing.prefix.clone();

    let mut router: Router<AppState> = Router::new();
    for route in state.routes.routes() {
        router = router.route(&route.mount_path(&prefix), method_router(route.clone()));
    }

    router
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn_with_state(auth, auth_gate))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::map_request(mark_generated_request_id))
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &HttpRequest<Body>| {
                    tracing::info_span!(
                        "request",
                        request_id = %request_id(request),
                        method = %request.method(),
                        path = %request.uri().path()
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

/// Route dispatch: forwarded methods go to the forwarder, OPTIONS is answered
/// here, anything else gets a 405.
fn method_router(route: Arc<Route>) -> MethodRouter<AppState> {
    let allow_methods = route.allow_methods();
    let allowed = allow_methods.clone();
    let mut methods = MethodRouter::new()
        .options(move || {
            let allow_methods = allow_methods.clone();
            async move { preflight(&allow_methods) }
        })
        .fallback(move || {
            let allowed = allowed.clone();
            async move { method_not_allowed(&allowed) }
        });

    for method in &route.methods {
        let Ok(filter) = MethodFilter::try_from(method.clone()) else {
            tracing::warn!(method = %method, route = %route.name, "Unsupported method in route table");
            continue;
        };
        let route = route.clone();
        methods = methods.on(filter, move |state: State<AppState>, request: Request| {
            proxy(state, route.clone(), request)
        });
    }

    methods
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::{header, Method, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn server(config: ProxyConfig) -> Router {
        HttpServer::new(config).unwrap().router()
    }

    async fn call(router: Router, request: HttpRequest<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    fn options(uri: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method(Method::OPTIONS)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_preflight_per_route() {
        let cases = [
            ("/api/proxy", "GET, POST, PUT, DELETE, OPTIONS, PATCH"),
            ("/api/proxy/openai/v1/chat/completions", "GET, POST, DELETE, OPTIONS"),
            ("/api/proxy/google/search", "GET, POST, OPTIONS"),
            ("/api/proxy/tavily/search", "GET, POST, OPTIONS"),
        ];

        for (uri, methods) in cases {
            let (status, headers, body) = call(server(ProxyConfig::default()), options(uri)).await;
            assert_eq!(status, StatusCode::NO_CONTENT, "{}", uri);
            assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], methods);
            assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
            assert!(body.is_empty());
        }
    }

    #[tokio::test]
    async fn test_generic_route_input_errors() {
        let request = HttpRequest::get("/api/proxy").body(Body::empty()).unwrap();
        let (status, _, body) = call(server(ProxyConfig::default()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({ "error": "Missing \"url\" query parameter" }));

        let request = HttpRequest::get("/api/proxy?url=not%20a%20url")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = call(server(ProxyConfig::default()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({ "error": "Invalid URL provided" }));
    }

    #[tokio::test]
    async fn test_gate_runs_before_dispatch() {
        let mut config = ProxyConfig::default();
        config.auth.api_key = Some("S".into());

        let request = HttpRequest::get("/api/proxy").body(Body::empty()).unwrap();
        let (status, headers, _) = call(server(config.clone()), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let request = HttpRequest::get("/api/proxy")
            .header("X-API-Key", "S")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = call(server(config), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_preflight_gated_unless_exempt() {
        let mut config = ProxyConfig::default();
        config.auth.api_key = Some("S".into());

        let (status, _, _) = call(server(config.clone()), options("/api/proxy/openai/v1/models")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        config.auth.exempt_preflight = true;
        let (status, _, _) = call(server(config), options("/api/proxy/openai/v1/models")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_unsupported_method_on_named_route() {
        let request = HttpRequest::put("/api/proxy/tavily/search")
            .body(Body::empty())
            .unwrap();
        let (status, headers, _) = call(server(ProxyConfig::default()), request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(headers[header::ALLOW], "GET, POST, OPTIONS");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "*");
    }

    #[tokio::test]
    async fn test_unknown_path_under_prefix_carries_cors() {
        let request = HttpRequest::get("/api/proxy/unknown/x")
            .body(Body::empty())
            .unwrap();
        let (status, headers, _) = call(server(ProxyConfig::default()), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_request_id_echoed() {
        let request = HttpRequest::get("/api/proxy").body(Body::empty()).unwrap();
        let (_, headers, _) = call(server(ProxyConfig::default()), request).await;
        assert!(headers.contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_paths_outside_prefix_bypass_gate() {
        let mut config = ProxyConfig::default();
        config.auth.api_key = Some("S".into());

        let request = HttpRequest::get("/health").body(Body::empty()).unwrap();
        let (status, _, _) = call(server(config), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
