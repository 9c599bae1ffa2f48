//! Cancellation draft store
//!
//! One open draft per (user, subscription); the partial unique index on
//! that key makes first-draft creation an atomic insert-if-absent, which
//! is also where the sticky A/B variant is assigned. Patches are explicit
//! allowlisted fields applied last-write-wins. The commit transition is a
//! single transaction: flip status draft→committed, then conditionally
//! flag the subscription.

use chrono::Utc;
use offramp_common::types::{CancellationRow, DraftPatch, Variant};
use offramp_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

/// Create the draft for (user, subscription) or return the existing one
///
/// The insert races safely: `ON CONFLICT DO NOTHING` loses against an
/// existing open draft, and the read-back then adopts the winner's row —
/// including its variant, which is assigned exactly once.
pub async fn start_draft(
    pool: &SqlitePool,
    user_id: &str,
    subscription_id: &str,
) -> Result<CancellationRow> {
    let id = Uuid::new_v4().to_string();
    let variant = Variant::draw();
    let now = Utc::now().to_rfc3339();

    let inserted = sqlx::query(
        r#"
        INSERT INTO cancellations
            (id, user_id, subscription_id, downsell_variant, status, accepted_downsell, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'draft', 0, ?, ?)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(subscription_id)
    .bind(variant)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    if inserted.rows_affected() == 1 {
        info!(
            "Created cancellation draft {} (variant {}) for user {}",
            id,
            variant.as_str(),
            user_id
        );
    }

    read_open(pool, user_id, subscription_id)
        .await?
        .ok_or_else(|| Error::Internal("Draft vanished after insert".to_string()))
}

/// Read the open draft for (user, subscription), if any
pub async fn read_open(
    pool: &SqlitePool,
    user_id: &str,
    subscription_id: &str,
) -> Result<Option<CancellationRow>> {
    let row = sqlx::query_as::<_, CancellationRow>(
        "SELECT * FROM cancellations \
         WHERE user_id = ? AND subscription_id = ? AND status = 'draft'",
    )
    .bind(user_id)
    .bind(subscription_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Read a draft by id, scoped to its owner
pub async fn read_owned(
    pool: &SqlitePool,
    draft_id: &str,
    user_id: &str,
) -> Result<CancellationRow> {
    let row = sqlx::query_as::<_, CancellationRow>(
        "SELECT * FROM cancellations WHERE id = ? AND user_id = ?",
    )
    .bind(draft_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| Error::NotFound("No such cancellation".to_string()))
}

/// Merge an allowlisted patch into an open draft
///
/// Last-write-wins per field: unset patch fields keep the stored value
/// (COALESCE), so applying the same patch twice yields the same row.
/// Committed drafts are immutable; patching one is a Conflict.
pub async fn apply_patch(
    pool: &SqlitePool,
    draft_id: &str,
    user_id: &str,
    patch: &DraftPatch,
) -> Result<CancellationRow> {
    let now = Utc::now().to_rfc3339();

    let updated = sqlx::query(
        r#"
        UPDATE cancellations SET
            found_job            = COALESCE(?, found_job),
            found_via_program    = COALESCE(?, found_via_program),
            applied_range        = COALESCE(?, applied_range),
            emailed_range        = COALESCE(?, emailed_range),
            interviewed_range    = COALESCE(?, interviewed_range),
            feedback_text        = COALESCE(?, feedback_text),
            lawyer_provided      = COALESCE(?, lawyer_provided),
            visa_type            = COALESCE(?, visa_type),
            reason_code          = COALESCE(?, reason_code),
            reason_text          = COALESCE(?, reason_text),
            willing_to_pay_cents = COALESCE(?, willing_to_pay_cents),
            usage_applied        = COALESCE(?, usage_applied),
            usage_emailed        = COALESCE(?, usage_emailed),
            usage_interviewed    = COALESCE(?, usage_interviewed),
            accepted_downsell    = COALESCE(?, accepted_downsell),
            updated_at           = ?
        WHERE id = ? AND user_id = ? AND status = 'draft'
        "#,
    )
    .bind(patch.found_job)
    .bind(patch.found_via_program)
    .bind(patch.applied_range)
    .bind(patch.emailed_range)
    .bind(patch.interviewed_range)
    .bind(&patch.feedback_text)
    .bind(patch.lawyer_provided)
    .bind(&patch.visa_type)
    .bind(patch.reason_code)
    .bind(&patch.reason_text)
    .bind(patch.willing_to_pay_cents)
    .bind(patch.usage_applied)
    .bind(patch.usage_emailed)
    .bind(patch.usage_interviewed)
    .bind(patch.accepted_downsell)
    .bind(&now)
    .bind(draft_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        // Distinguish a missing draft from one that already committed
        let row = read_owned(pool, draft_id, user_id).await?;
        return Err(Error::Conflict(format!(
            "Cancellation {} is already committed",
            row.id
        )));
    }

    read_owned(pool, draft_id, user_id).await
}

/// Upsert by (user, subscription): create the draft if absent, then merge
pub async fn upsert_by_key(
    pool: &SqlitePool,
    user_id: &str,
    subscription_id: &str,
    patch: &DraftPatch,
) -> Result<CancellationRow> {
    let row = start_draft(pool, user_id, subscription_id).await?;

    if patch.is_empty() {
        return Ok(row);
    }

    apply_patch(pool, &row.id, user_id, patch).await
}

/// Record that the subscriber accepted the discount offer
pub async fn accept_downsell(pool: &SqlitePool, draft_id: &str, user_id: &str) -> Result<()> {
    let patch = DraftPatch {
        accepted_downsell: Some(true),
        ..DraftPatch::default()
    };
    apply_patch(pool, draft_id, user_id, &patch).await?;
    Ok(())
}

/// Commit a draft by id: flip to committed, flag the subscription unless
/// the discount was accepted
///
/// One transaction, both effects or neither. The conditional UPDATE on
/// `status = 'draft'` is the idempotence guard: a second commit affects
/// zero rows and surfaces as Conflict without repeating the subscription
/// side effect.
pub async fn commit_by_id(pool: &SqlitePool, draft_id: &str, user_id: &str) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    let row: Option<(String, bool, String)> = sqlx::query_as(
        "SELECT subscription_id, accepted_downsell, status \
         FROM cancellations WHERE id = ? AND user_id = ?",
    )
    .bind(draft_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (subscription_id, accepted_downsell, status) = match row {
        None => return Err(Error::NotFound("No such cancellation".to_string())),
        Some(row) => row,
    };
    if status == "committed" {
        return Err(Error::Conflict(format!(
            "Cancellation {} is already committed",
            draft_id
        )));
    }

    let committed = sqlx::query(
        "UPDATE cancellations SET status = 'committed', updated_at = ? \
         WHERE id = ? AND status = 'draft'",
    )
    .bind(&now)
    .bind(draft_id)
    .execute(&mut *tx)
    .await?;
    if committed.rows_affected() == 0 {
        // Lost a race with a concurrent commit
        return Err(Error::Conflict(format!(
            "Cancellation {} is already committed",
            draft_id
        )));
    }

    if !accepted_downsell {
        sqlx::query(
            "UPDATE subscriptions SET status = 'pending_cancellation', updated_at = ? \
             WHERE id = ?",
        )
        .bind(&now)
        .bind(&subscription_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!(
        "Committed cancellation {} (accepted_downsell={})",
        draft_id, accepted_downsell
    );
    Ok(accepted_downsell)
}

/// Commit the open draft for (user, subscription)
pub async fn commit_by_key(
    pool: &SqlitePool,
    user_id: &str,
    subscription_id: &str,
) -> Result<bool> {
    match read_open(pool, user_id, subscription_id).await? {
        Some(draft) => commit_by_id(pool, &draft.id, user_id).await,
        None => {
            // No open draft: committed already, or never started?
            let committed: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM cancellations \
                 WHERE user_id = ? AND subscription_id = ? AND status = 'committed'",
            )
            .bind(user_id)
            .bind(subscription_id)
            .fetch_one(pool)
            .await?;

            if committed > 0 {
                Err(Error::Conflict("Cancellation is already committed".to_string()))
            } else {
                Err(Error::NotFound("No cancellation draft".to_string()))
            }
        }
    }
}
