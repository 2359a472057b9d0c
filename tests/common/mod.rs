//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use forward_proxy::{HttpServer, ProxyConfig, Shutdown};
use futures_util::StreamExt;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;

/// Chunks emitted by the mock upstream's `/stream` endpoint.
pub const STREAM_CHUNKS: [&str; 3] = ["data: one\n\n", "data: two\n\n", "data: three\n\n"];

/// Start a mock upstream on an ephemeral port.
///
/// - `/cors` answers 201 with its own CORS and custom headers
/// - `/stream` sends `STREAM_CHUNKS` with small pauses
/// - `/fail` answers 503
/// - anything else echoes the request back as JSON
pub async fn start_mock_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/cors", get(cors))
        .route("/stream", get(stream))
        .route("/fail", get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "upstream down") }))
        .fallback(echo);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let headers: Map<String, Value> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                Value::String(value.to_str().unwrap_or_default().to_string()),
            )
        })
        .collect();

    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn cors() -> impl IntoResponse {
    (
        StatusCode::CREATED,
        [
            ("access-control-allow-origin", "https://app.example.com"),
            ("x-upstream", "yes"),
        ],
        "created",
    )
}

async fn stream() -> Response {
    let chunks = futures_util::stream::iter(STREAM_CHUNKS).then(|chunk| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, std::io::Error>(chunk)
    });

    Response::builder()
        .header("content-type", "text/event-stream")
        .body(Body::from_stream(chunks))
        .unwrap()
}

/// Config whose named upstreams all point at `upstream`.
pub fn config_for(upstream: SocketAddr) -> ProxyConfig {
    let base = format!("http://{}", upstream);
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstreams.openai_base_url = base.clone();
    config.upstreams.google_base_url = base.clone();
    config.upstreams.tavily_base_url = base;
    config
}

/// Start the proxy on an ephemeral port.
pub async fn start_proxy(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// Client that never goes through an environment proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap()
}
