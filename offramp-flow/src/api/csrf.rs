//! CSRF double-submit guard
//!
//! Token issuance sets an http-only cookie and returns the same value in
//! the body; the caller echoes it back in the `x-csrf-token` header on
//! every mutating call. The middleware compares cookie and header and
//! rejects with 403 before any other processing.

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use rand::rngs::OsRng;
use rand::Rng;
use serde_json::json;
use tracing::warn;

use offramp_common::Error;

use super::ApiError;

/// Cookie set by token issuance
pub const CSRF_COOKIE: &str = "csrf_token";

/// Header the client echoes the token back in
pub const CSRF_HEADER: &str = "x-csrf-token";

/// GET /csrf
///
/// Issues a fresh high-entropy token. Idempotent and safe: each call
/// simply rotates the cookie.
pub async fn issue_token() -> Response {
    let token: u128 = OsRng.gen();
    let token = format!("{:032x}", token);

    let cookie = format!("{}={}; HttpOnly; SameSite=Lax; Path=/", CSRF_COOKIE, token);

    (
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "token": token })),
    )
        .into_response()
}

/// CSRF middleware for mutating routes
///
/// The cookie and the echoed header must both be present and equal.
/// Checked before the body is touched, so a rejected request is never
/// partially processed.
pub async fn csrf_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let cookie = cookie_value(request.headers(), CSRF_COOKIE);
    let header = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match (cookie, header) {
        (Some(cookie), Some(header)) if cookie == header => Ok(next.run(request).await),
        _ => {
            warn!("CSRF rejection on {} {}", request.method(), request.uri().path());
            Err(Error::Forbidden("CSRF token missing or mismatched".to_string()).into())
        }
    }
}

/// Extract one cookie value from the Cookie header
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    for pair in raw.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        if parts.next() == Some(name) {
            return parts.next().map(str::to_string);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_parsing_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("session_token=abc; csrf_token=deadbeef; theme=dark"),
        );
        assert_eq!(cookie_value(&headers, "csrf_token").as_deref(), Some("deadbeef"));
        assert_eq!(cookie_value(&headers, "session_token").as_deref(), Some("abc"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }
}
