//! Token gate and CORS for the HTTP surface.
//!
//! The token is taken from, in order:
//! 1. `X-Session-Token` header (cross-origin REST requests)
//! 2. `?token=` query parameter (cross-origin streaming connections)
//! 3. the session cookie (same-origin browsers)

use std::time::Duration;

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use protocol::ErrorBody;
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::AppState;

/// Name of the cookie carrying the access token.
pub const SESSION_COOKIE: &str = "conductor_session";

/// Header carrying the access token.
pub const TOKEN_HEADER: &str = "x-session-token";

/// Token that passed the gate, available to handlers as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken(pub String);

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Extracts the token from a request, trying each source in order.
pub fn extract_token(request: &Request) -> Option<String> {
    let headers = request.headers();

    if let Some(value) = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        if !value.is_empty() {
            return Some(value.trim().to_string());
        }
    }

    if let Ok(Query(query)) = Query::<TokenQuery>::try_from_uri(request.uri()) {
        if let Some(token) = query.token.filter(|token| !token.is_empty()) {
            return Some(token);
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Returns whether a path belongs to the machine-facing surface.
fn is_api_path(path: &str) -> bool {
    path.starts_with("/api") || path.starts_with("/ws")
}

/// Rejection for a request without a valid token.
///
/// API and streaming paths get a JSON 401; browser navigation is sent back
/// to the landing page.
pub fn unauthorized(path: &str) -> Response {
    if is_api_path(path) {
        (StatusCode::UNAUTHORIZED, Json(ErrorBody::new("unauthorized"))).into_response()
    } else {
        Redirect::to("/").into_response()
    }
}

/// Middleware that admits only requests carrying a valid token.
pub async fn require_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match extract_token(&request) {
        Some(token) if state.auth.validate(&token) => {
            request.extensions_mut().insert(AuthToken(token));
            next.run(request).await
        }
        _ => {
            tracing::debug!(path = %request.uri().path(), "Rejected unauthenticated request");
            unauthorized(request.uri().path())
        }
    }
}

/// CORS policy: mirror the caller's origin.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(TOKEN_HEADER)])
        .max_age(Duration::from_secs(3600))
}

/// `Set-Cookie` value storing `token` for `ttl`.
pub fn session_cookie(token: &str, ttl: Duration) -> HeaderValue {
    cookie_value(token, ttl.as_secs())
}

/// `Set-Cookie` value that clears the session cookie.
pub fn cleared_cookie() -> HeaderValue {
    cookie_value("", 0)
}

fn cookie_value(token: &str, max_age: u64) -> HeaderValue {
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        SESSION_COOKIE, token, max_age
    );
    // Tokens are hex, so the value is always a valid header.
    HeaderValue::from_str(&cookie)
        .unwrap_or_else(|_| HeaderValue::from_static("conductor_session=; Max-Age=0"))
}
