//! Response decoration and error rendering.
//!
//! # Responsibilities
//! - Stamp the permissive CORS headers on every response leaving the proxy
//! - Answer `OPTIONS` pre-flight requests locally
//! - Answer unrouted paths (404) and unlisted methods (405) with CORS too
//! - Map `ProxyError` to a JSON body with the right status code
//!
//! # Design Decisions
//! - CORS headers are inserted, never appended: upstream values are overwritten
//! - No credentialed CORS; the wildcard origin rules it out

use axum::{
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW,
        },
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::ProxyError;
use crate::routing::router::GENERIC_ALLOW_METHODS;

/// Methods advertised on every non-pre-flight response.
pub const CORS_ALLOW_METHODS: &str = GENERIC_ALLOW_METHODS;

/// Extra explanation attached to 401 responses.
pub const UNAUTHORIZED_MESSAGE: &str = "Invalid or missing X-API-Key header";

/// Overwrite the three CORS headers.
pub fn apply_cors(headers: &mut HeaderMap, allow_methods: &str) {
    let methods = HeaderValue::from_str(allow_methods)
        .unwrap_or_else(|_| HeaderValue::from_static(CORS_ALLOW_METHODS));

    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, methods);
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
}

pub fn with_cors(mut response: Response) -> Response {
    apply_cors(response.headers_mut(), CORS_ALLOW_METHODS);
    response
}

/// 204 pre-flight answer listing only the route's methods.
pub fn preflight(allow_methods: &str) -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    apply_cors(response.headers_mut(), allow_methods);
    response
}

/// Router fallback for paths no route claims.
pub async fn not_found() -> Response {
    with_cors(StatusCode::NOT_FOUND.into_response())
}

/// Answer for a method the route does not forward.
pub fn method_not_allowed(allow_methods: &str) -> Response {
    let mut response = StatusCode::METHOD_NOT_ALLOWED.into_response();
    if let Ok(allow) = HeaderValue::from_str(allow_methods) {
        response.headers_mut().insert(ALLOW, allow);
    }
    with_cors(response)
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ProxyError::Unauthorized => json!({
                "error": self.message(),
                "message": UNAUTHORIZED_MESSAGE,
            }),
            _ => json!({ "error": self.message() }),
        };
        with_cors((status, Json(body)).into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::header::CONTENT_TYPE;
    use serde_json::Value;

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn assert_cors(headers: &HeaderMap, methods: &str) {
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], methods);
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], "*");
    }

    #[test]
    fn test_cors_overwrites_upstream_values() {
        let mut response = Response::new(Body::empty());
        response.headers_mut().insert(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("https://app.example.com"),
        );
        response
            .headers_mut()
            .append(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("https://other.example.com"));

        let response = with_cors(response);
        assert_eq!(response.headers().get_all(ACCESS_CONTROL_ALLOW_ORIGIN).iter().count(), 1);
        assert_cors(response.headers(), CORS_ALLOW_METHODS);
    }

    #[tokio::test]
    async fn test_preflight_response() {
        let response = preflight("GET, POST, OPTIONS");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_cors(response.headers(), "GET, POST, OPTIONS");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_not_found_carries_cors() {
        let response = not_found().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_cors(response.headers(), CORS_ALLOW_METHODS);
    }

    #[test]
    fn test_method_not_allowed_lists_route_methods() {
        let response = method_not_allowed("GET, POST, OPTIONS");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, POST, OPTIONS");
        assert_cors(response.headers(), CORS_ALLOW_METHODS);
    }

    #[tokio::test]
    async fn test_error_response_shape() {
        let response = ProxyError::MissingUrl.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_cors(response.headers(), CORS_ALLOW_METHODS);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Missing \"url\" query parameter" })
        );
    }

    #[tokio::test]
    async fn test_unauthorized_response_shape() {
        let response = ProxyError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await,
            json!({
                "error": "Unauthorized",
                "message": "Invalid or missing X-API-Key header",
            })
        );
    }

    #[tokio::test]
    async fn test_internal_error_uses_message() {
        let response = ProxyError::Internal("connection reset".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, json!({ "error": "connection reset" }));
    }
}
