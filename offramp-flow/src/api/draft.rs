//! Keyed draft handlers: upsert by (user, subscription) and finalize
//!
//! These operate on the subscriber's own key rather than a draft id, so a
//! resumed client needs nothing but its session: the draft is found (or
//! lazily created) from the subscription pair.

use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::ApiError;
use crate::{session, store, AppState};
use offramp_common::types::DraftPatch;
use offramp_common::validate_patch;

/// POST /cancellation/draft
///
/// Upserts partial interview answers. Creates the draft lazily (assigning
/// the sticky variant atomically) and merges the allowlisted fields.
/// Returns the full row so the client can re-infer its step.
pub async fn save_draft(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(patch): Json<DraftPatch>,
) -> Result<Json<Value>, ApiError> {
    let user_id = session::resolve_user(&state.db, &headers).await?;

    let subscription = store::subscriptions::active_for_user(&state.db, &user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No active subscription".to_string()))?;

    validate_patch(&patch)?;

    let row = store::drafts::upsert_by_key(&state.db, &user_id, &subscription.id, &patch).await?;

    Ok(Json(serde_json::to_value(row).map_err(|e| ApiError::Internal(e.to_string()))?))
}

#[derive(Debug, Deserialize)]
pub struct CommitRequest {
    pub confirm: bool,
}

/// POST /cancellation/commit
///
/// Finalizes the open draft for the subscriber's subscription. Requires an
/// explicit `{"confirm": true}`; double commit is a 409.
pub async fn commit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CommitRequest>,
) -> Result<Json<Value>, ApiError> {
    if !request.confirm {
        return Err(ApiError::Validation("confirm must be true".to_string()));
    }

    let user_id = session::resolve_user(&state.db, &headers).await?;

    // Any-status lookup: after a prior commit the subscription is already
    // pending_cancellation, and the right answer there is Conflict from
    // the store, not NotFound here.
    let subscription = store::subscriptions::for_user(&state.db, &user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No subscription".to_string()))?;

    let accepted_downsell =
        store::drafts::commit_by_key(&state.db, &user_id, &subscription.id).await?;

    Ok(Json(json!({ "ok": true, "accepted_downsell": accepted_downsell })))
}
