//! Cancellation flow handlers: start/resume, patch, complete, continue
//!
//! All four are CSRF-guarded and resolve the subscriber from the session
//! cookie. Draft-id based writes are additionally scoped to the owner, so
//! a stolen id alone cannot forge answers.

use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::ApiError;
use crate::{session, store, AppState};
use offramp_common::types::DraftPatch;
use offramp_common::{infer_step, validate_patch};

/// POST /cancel/start
///
/// Creates the draft for the subscriber's active subscription, or returns
/// the existing one (resume). The response carries the inferred step so a
/// reloaded client lands back on the right screen.
pub async fn start(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user_id = session::resolve_user(&state.db, &headers).await?;

    let subscription = store::subscriptions::active_for_user(&state.db, &user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No active subscription".to_string()))?;

    let cancellation = store::drafts::start_draft(&state.db, &user_id, &subscription.id).await?;
    let step = infer_step(&cancellation);

    Ok(Json(json!({
        "cancellation": cancellation,
        "subscription": subscription,
        "step": step,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub draft_id: String,
    pub patch: DraftPatch,
}

/// PATCH /cancel/update
///
/// Applies an allowlisted patch to an open draft. Unknown keys in the
/// patch object are dropped during deserialization, never an error.
pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = session::resolve_user(&state.db, &headers).await?;

    validate_patch(&request.patch)?;

    let cancellation =
        store::drafts::apply_patch(&state.db, &request.draft_id, &user_id, &request.patch).await?;

    Ok(Json(json!({ "cancellation": cancellation })))
}

#[derive(Debug, Deserialize)]
pub struct DraftIdRequest {
    pub draft_id: String,
}

/// POST /cancel/complete
///
/// Commits the draft: flips it to committed and flags the subscription
/// pending_cancellation unless the discount was accepted. Re-invocation is
/// a 409 and never repeats the subscription side effect.
pub async fn complete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DraftIdRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = session::resolve_user(&state.db, &headers).await?;

    store::drafts::commit_by_id(&state.db, &request.draft_id, &user_id).await?;

    Ok(Json(json!({ "ok": true })))
}

/// POST /cancel/continue
///
/// Records acceptance of the discount offer on a still-open draft.
pub async fn continue_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DraftIdRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = session::resolve_user(&state.db, &headers).await?;

    store::drafts::accept_downsell(&state.db, &request.draft_id, &user_id).await?;

    Ok(Json(json!({ "ok": true })))
}
