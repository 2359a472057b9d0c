//! Upstream forwarding.
//!
//! Resolves the target, filters headers, buffers the inbound body for the
//! methods that carry one, and streams the upstream response back. The
//! response body is relayed chunk by chunk; when the client goes away axum
//! drops the body, which drops the upstream stream and closes its connection.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
};
use futures_util::TryStreamExt;
use url::Url;

use crate::error::ProxyError;
use crate::http::request::{GeneratedRequestId, X_REQUEST_ID};
use crate::http::response::with_cors;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::resolver::{parse_query, resolve};
use crate::routing::router::Route;
use crate::security::headers::{forward_headers, strip_framing};

/// A fully prepared outbound request.
#[derive(Debug)]
pub struct Outbound {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    /// `None` when the route takes no body or the body was empty.
    pub body: Option<Bytes>,
}

/// Route handler for every forwarded method.
pub async fn proxy(
    State(state): State<AppState>,
    route: Arc<Route>,
    request: Request,
) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let label = if route.is_generic() { "generic" } else { route.name.as_str() };

    let response = match forward(&state, &route, request).await {
        Ok(response) => response,
        Err(err) => {
            match &err {
                ProxyError::Upstream(_) | ProxyError::Body(_) | ProxyError::Internal(_) => {
                    tracing::error!(route = label, error = %err, "Proxy error");
                }
                _ => tracing::debug!(route = label, error = %err, "Rejected proxy request"),
            }
            err.into_response()
        }
    };

    metrics::record_request(label, &method, response.status().as_u16(), start_time);
    response
}

async fn forward(state: &AppState, route: &Route, request: Request) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();

    let query = parse_query(parts.uri.query());
    let residual = route.residual(&state.config.routing.prefix, parts.uri.path());
    let url = resolve(route, residual, &parts.headers, &query)?;
    let mut headers = forward_headers(&parts.headers);
    strip_framing(&mut headers);
    if parts.extensions.get::<GeneratedRequestId>().is_some() {
        headers.remove(X_REQUEST_ID);
    }

    let body = if route.carries_body(&parts.method) {
        let bytes = axum::body::to_bytes(body, state.config.limits.max_body_size)
            .await
            .map_err(ProxyError::Body)?;
        (!bytes.is_empty()).then_some(bytes)
    } else {
        None
    };

    tracing::debug!(
        method = %parts.method,
        target = %url,
        body_bytes = body.as_ref().map_or(0, Bytes::len),
        "Forwarding request"
    );

    send(
        &state.client,
        Outbound {
            method: parts.method,
            url,
            headers,
            body,
        },
    )
    .await
}

/// Issue the outbound request and relay the upstream response.
pub async fn send(client: &reqwest::Client, outbound: Outbound) -> Result<Response, ProxyError> {
    let mut builder = client
        .request(outbound.method, outbound.url)
        .headers(outbound.headers);
    if let Some(body) = outbound.body {
        builder = builder.body(body);
    }

    let upstream = builder.send().await?;
    Ok(relay(upstream))
}

fn relay(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let headers = upstream.headers().clone();
    let stream = upstream
        .bytes_stream()
        .inspect_err(|e| tracing::warn!(error = %e, "Upstream body stream failed"));

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    with_cors(response)
}
