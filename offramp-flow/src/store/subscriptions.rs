//! Subscription lookups
//!
//! The subscription record is owned by the billing collaborator; the flow
//! only reads it and, on a committed non-discount cancellation, flips its
//! status to pending_cancellation (inside the commit transaction in
//! `drafts`). Price is never touched here.

use offramp_common::types::Subscription;
use offramp_common::Result;
use sqlx::SqlitePool;

/// Fetch the active subscription for a subscriber, if any
pub async fn active_for_user(pool: &SqlitePool, user_id: &str) -> Result<Option<Subscription>> {
    let sub = sqlx::query_as::<_, Subscription>(
        "SELECT id, user_id, status, monthly_price_cents, updated_at \
         FROM subscriptions WHERE user_id = ? AND status = 'active'",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(sub)
}

/// Fetch the subscriber's subscription regardless of status
///
/// Used by the commit path, where a prior commit may already have moved
/// the subscription out of 'active' and the right answer is Conflict, not
/// NotFound.
pub async fn for_user(pool: &SqlitePool, user_id: &str) -> Result<Option<Subscription>> {
    let sub = sqlx::query_as::<_, Subscription>(
        "SELECT id, user_id, status, monthly_price_cents, updated_at \
         FROM subscriptions WHERE user_id = ? ORDER BY updated_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(sub)
}

/// Fetch a subscription by id
pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<Subscription>> {
    let sub = sqlx::query_as::<_, Subscription>(
        "SELECT id, user_id, status, monthly_price_cents, updated_at \
         FROM subscriptions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(sub)
}
