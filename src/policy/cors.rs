//! # CORS Policy
//!
//! Permissive origin/credential/header policy with a per-family
//! `Access-Control-Allow-Methods`. Preflights are answered here with 204
//! and never reach credential resolution or a backend.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use super::methods::ProtocolFamily;

/// Preflight cache lifetime in seconds
pub const PREFLIGHT_MAX_AGE: u32 = 600;

const ALLOW_HEADERS: &str = "origin, Content-Length, Content-Type, Authorization, X-Auth-Token";

const ALLOW_PRIVATE_NETWORK: HeaderName =
    HeaderName::from_static("access-control-allow-private-network");

/// Attach the CORS headers for `family`
pub fn apply_cors_headers(headers: &mut HeaderMap, family: ProtocolFamily) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(ALLOW_PRIVATE_NETWORK, HeaderValue::from_static("true"));
    if let Ok(methods) = HeaderValue::from_str(&family.allow_header()) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, methods);
    }
}

/// Every `OPTIONS` is answered as a preflight, with or without
/// `Access-Control-Request-Method` and on every protocol family.
pub fn is_preflight(method: &Method) -> bool {
    method == Method::OPTIONS
}

/// 204 response for a preflight
pub fn preflight_response(family: ProtocolFamily) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    apply_cors_headers(headers, family);
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(PREFLIGHT_MAX_AGE));
    response
}

/// Outermost gateway middleware
pub async fn cors_middleware(req: Request, next: Next) -> Response {
    let family = ProtocolFamily::from_path(req.uri().path());

    if is_preflight(req.method()) {
        return preflight_response(family);
    }

    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut(), family);
    response
}
