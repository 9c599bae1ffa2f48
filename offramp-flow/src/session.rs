//! Session resolution
//!
//! The subscriber identity comes from the `session_token` cookie looked up
//! against the sessions table. There is no anonymous access to the flow: a
//! missing or unknown session resolves to NotFound, the same answer a
//! subscriber without an active subscription would get.

use axum::http::HeaderMap;
use sqlx::SqlitePool;

use crate::api::csrf::cookie_value;
use offramp_common::{Error, Result};

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "session_token";

/// Resolve the subscriber id for a request
pub async fn resolve_user(pool: &SqlitePool, headers: &HeaderMap) -> Result<String> {
    let token = cookie_value(headers, SESSION_COOKIE)
        .ok_or_else(|| Error::NotFound("No session".to_string()))?;

    let user_id: Option<(String,)> =
        sqlx::query_as("SELECT user_id FROM sessions WHERE token = ?")
            .bind(&token)
            .fetch_optional(pool)
            .await?;

    match user_id {
        Some((user_id,)) => Ok(user_id),
        None => Err(Error::NotFound("No session".to_string())),
    }
}
