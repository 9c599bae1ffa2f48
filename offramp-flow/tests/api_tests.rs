//! Integration tests for the offramp-flow HTTP surface
//!
//! Covers CSRF issuance and enforcement, start/resume semantics, the
//! allowlisted patch endpoint, the keyed draft upsert, and the commit
//! transition with its conditional subscription side effect.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::util::ServiceExt; // for `oneshot`

use offramp_common::db::{self, DEMO_SESSION_TOKEN, DEMO_SUBSCRIPTION_ID, DEMO_USER_ID};
use offramp_flow::{build_router, AppState};

/// Test helper: fresh in-memory database with the demo subscriber seeded
async fn setup() -> (axum::Router, SqlitePool) {
    let pool = db::connect_memory().await.expect("Should create in-memory db");
    db::seed_demo_data(&pool).await.expect("Should seed demo data");
    let app = build_router(AppState::new(pool.clone()));
    (app, pool)
}

/// Test helper: obtain a CSRF token from the issuance endpoint
async fn fetch_csrf_token(app: &axum::Router) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/csrf")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("Issuance should set the cookie")
        .to_str()
        .unwrap()
        .to_string();

    let body = extract_json(response.into_body()).await;
    let token = body["token"].as_str().unwrap().to_string();
    assert!(
        set_cookie.starts_with(&format!("csrf_token={}", token)),
        "Cookie and body must carry the same token"
    );
    assert!(set_cookie.contains("HttpOnly"));
    token
}

/// Test helper: build a mutating request with session + CSRF attached
fn flow_request(method: &str, uri: &str, csrf: &str, body: Option<Value>) -> Request<Body> {
    let cookies = format!(
        "csrf_token={}; session_token={}",
        csrf, DEMO_SESSION_TOKEN
    );
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookies)
        .header("x-csrf-token", csrf);

    match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Start the flow and return the full response body
async fn start_flow(app: &axum::Router, csrf: &str) -> Value {
    let response = app
        .clone()
        .oneshot(flow_request("POST", "/cancel/start", csrf, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    extract_json(response.into_body()).await
}

/// Pre-insert an open draft with a chosen variant; `start` adopts it
async fn seed_draft(pool: &SqlitePool, variant: &str, found_job: Option<bool>) -> String {
    let id = format!("draft-{}", variant);
    sqlx::query(
        "INSERT INTO cancellations (id, user_id, subscription_id, downsell_variant, found_job) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(DEMO_USER_ID)
    .bind(DEMO_SUBSCRIPTION_ID)
    .bind(variant)
    .bind(found_job)
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn subscription_status(pool: &SqlitePool) -> String {
    sqlx::query_scalar("SELECT status FROM subscriptions WHERE id = ?")
        .bind(DEMO_SUBSCRIPTION_ID)
        .fetch_one(pool)
        .await
        .unwrap()
}

// =============================================================================
// Health + CSRF issuance
// =============================================================================

#[tokio::test]
async fn health_endpoint_is_public() {
    let (app, _pool) = setup().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "offramp-flow");
}

#[tokio::test]
async fn csrf_issuance_is_idempotent_and_rotates() {
    let (app, _pool) = setup().await;

    let first = fetch_csrf_token(&app).await;
    let second = fetch_csrf_token(&app).await;
    assert_eq!(first.len(), 32);
    assert_ne!(first, second, "Each issuance draws a fresh token");
}

// =============================================================================
// CSRF enforcement
// =============================================================================

#[tokio::test]
async fn mutating_call_without_csrf_is_forbidden() {
    let (app, _pool) = setup().await;

    let request = Request::builder()
        .method("POST")
        .uri("/cancel/start")
        .header(header::COOKIE, format!("session_token={}", DEMO_SESSION_TOKEN))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn mismatched_csrf_is_forbidden_despite_valid_body() {
    let (app, _pool) = setup().await;
    let token = fetch_csrf_token(&app).await;

    let request = Request::builder()
        .method("POST")
        .uri("/cancellation/commit")
        .header(
            header::COOKIE,
            format!("csrf_token={}; session_token={}", token, DEMO_SESSION_TOKEN),
        )
        .header("x-csrf-token", "00000000000000000000000000000000")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"confirm": true}).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// =============================================================================
// Start / resume
// =============================================================================

#[tokio::test]
async fn start_creates_draft_with_variant_and_entry_step() {
    let (app, _pool) = setup().await;
    let token = fetch_csrf_token(&app).await;

    let body = start_flow(&app, &token).await;

    assert_eq!(body["cancellation"]["status"], "draft");
    let variant = body["cancellation"]["downsell_variant"].as_str().unwrap();
    assert!(variant == "A" || variant == "B");
    assert_eq!(body["step"], "entry");
    assert_eq!(body["subscription"]["status"], "active");
    assert_eq!(body["subscription"]["monthly_price_cents"], 2500);
}

#[tokio::test]
async fn start_resumes_the_existing_draft() {
    let (app, _pool) = setup().await;
    let token = fetch_csrf_token(&app).await;

    let first = start_flow(&app, &token).await;
    let second = start_flow(&app, &token).await;

    assert_eq!(first["cancellation"]["id"], second["cancellation"]["id"]);
    assert_eq!(
        first["cancellation"]["downsell_variant"],
        second["cancellation"]["downsell_variant"],
        "Variant assignment is sticky"
    );
}

#[tokio::test]
async fn start_without_session_is_not_found() {
    let (app, _pool) = setup().await;
    let token = fetch_csrf_token(&app).await;

    let request = Request::builder()
        .method("POST")
        .uri("/cancel/start")
        .header(header::COOKIE, format!("csrf_token={}", token))
        .header("x-csrf-token", &token)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Patch endpoint
// =============================================================================

#[tokio::test]
async fn update_applies_patch_and_drops_unknown_keys() {
    let (app, _pool) = setup().await;
    let token = fetch_csrf_token(&app).await;

    let started = start_flow(&app, &token).await;
    let draft_id = started["cancellation"]["id"].as_str().unwrap();

    // Unknown keys (including system fields) are dropped, never an error
    let patch = json!({
        "draft_id": draft_id,
        "patch": {
            "found_job": true,
            "found_via_program": true,
            "applied_range": 1,
            "emailed_range": 1,
            "interviewed_range": 0,
            "status": "committed",
            "downsell_variant": "B",
            "bogus_field": 42
        }
    });
    let response = app
        .clone()
        .oneshot(flow_request("PATCH", "/cancel/update", &token, Some(patch)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["cancellation"]["found_job"], true);
    assert_eq!(body["cancellation"]["status"], "draft", "status is not writable");

    // Counters present, feedback absent: resume lands on the feedback step
    let resumed = start_flow(&app, &token).await;
    assert_eq!(resumed["step"], "feedback");
}

#[tokio::test]
async fn invalid_patch_is_rejected_before_any_write() {
    let (app, pool) = setup().await;
    let token = fetch_csrf_token(&app).await;

    let started = start_flow(&app, &token).await;
    let draft_id = started["cancellation"]["id"].as_str().unwrap().to_string();

    let patch = json!({
        "draft_id": draft_id,
        "patch": { "feedback_text": "too short" }
    });
    let response = app
        .clone()
        .oneshot(flow_request("PATCH", "/cancel/update", &token, Some(patch)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let stored: Option<String> =
        sqlx::query_scalar("SELECT feedback_text FROM cancellations WHERE id = ?")
            .bind(&draft_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(stored.is_none(), "Nothing was persisted");
}

#[tokio::test]
async fn variant_b_resumes_at_downsell_offer_variant_a_at_reason() {
    let (app_b, pool_b) = setup().await;
    let token_b = fetch_csrf_token(&app_b).await;
    seed_draft(&pool_b, "B", Some(false)).await;
    let resumed_b = start_flow(&app_b, &token_b).await;
    assert_eq!(resumed_b["step"], "downsell_offer");

    let (app_a, pool_a) = setup().await;
    let token_a = fetch_csrf_token(&app_a).await;
    seed_draft(&pool_a, "A", Some(false)).await;
    let resumed_a = start_flow(&app_a, &token_a).await;
    assert_eq!(resumed_a["step"], "reason");
}

#[tokio::test]
async fn accepted_downsell_resumes_at_discount_done() {
    let (app, _pool) = setup().await;
    let token = fetch_csrf_token(&app).await;

    let started = start_flow(&app, &token).await;
    let draft_id = started["cancellation"]["id"].as_str().unwrap().to_string();

    let patch = json!({ "draft_id": draft_id, "patch": { "found_job": false } });
    let response = app
        .clone()
        .oneshot(flow_request("PATCH", "/cancel/update", &token, Some(patch)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(flow_request(
            "POST",
            "/cancel/continue",
            &token,
            Some(json!({ "draft_id": draft_id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Reason and usage fields are all unset; the short-circuit wins anyway
    let resumed = start_flow(&app, &token).await;
    assert_eq!(resumed["step"], "discount_done");
}

// =============================================================================
// Keyed draft upsert
// =============================================================================

#[tokio::test]
async fn draft_upsert_creates_then_merges_with_sticky_variant() {
    let (app, _pool) = setup().await;
    let token = fetch_csrf_token(&app).await;

    let response = app
        .clone()
        .oneshot(flow_request(
            "POST",
            "/cancellation/draft",
            &token,
            Some(json!({ "found_job": false, "unknown_key": "dropped" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first = extract_json(response.into_body()).await;
    assert_eq!(first["status"], "draft");
    assert_eq!(first["found_job"], false);

    let response = app
        .clone()
        .oneshot(flow_request(
            "POST",
            "/cancellation/draft",
            &token,
            Some(json!({ "usage_applied": 2 })),
        ))
        .await
        .unwrap();
    let second = extract_json(response.into_body()).await;

    assert_eq!(first["id"], second["id"]);
    assert_eq!(first["downsell_variant"], second["downsell_variant"]);
    assert_eq!(second["found_job"], false, "Earlier answers survive the merge");
    assert_eq!(second["usage_applied"], 2);
}

// =============================================================================
// Commit transition
// =============================================================================

#[tokio::test]
async fn commit_flags_subscription_and_second_commit_conflicts() {
    let (app, pool) = setup().await;
    let token = fetch_csrf_token(&app).await;
    start_flow(&app, &token).await;

    let response = app
        .clone()
        .oneshot(flow_request(
            "POST",
            "/cancellation/commit",
            &token,
            Some(json!({ "confirm": true })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["accepted_downsell"], false);

    assert_eq!(subscription_status(&pool).await, "pending_cancellation");

    // Second commit: 409, and the subscription status is unchanged
    let response = app
        .clone()
        .oneshot(flow_request(
            "POST",
            "/cancellation/commit",
            &token,
            Some(json!({ "confirm": true })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(subscription_status(&pool).await, "pending_cancellation");
}

#[tokio::test]
async fn commit_after_accepting_downsell_leaves_subscription_active() {
    let (app, pool) = setup().await;
    let token = fetch_csrf_token(&app).await;

    let started = start_flow(&app, &token).await;
    let draft_id = started["cancellation"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(flow_request(
            "POST",
            "/cancel/continue",
            &token,
            Some(json!({ "draft_id": draft_id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(flow_request(
            "POST",
            "/cancellation/commit",
            &token,
            Some(json!({ "confirm": true })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["accepted_downsell"], true);

    assert_eq!(subscription_status(&pool).await, "active");
}

#[tokio::test]
async fn commit_requires_explicit_confirmation() {
    let (app, _pool) = setup().await;
    let token = fetch_csrf_token(&app).await;
    start_flow(&app, &token).await;

    let response = app
        .clone()
        .oneshot(flow_request(
            "POST",
            "/cancellation/commit",
            &token,
            Some(json!({ "confirm": false })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn commit_without_draft_is_not_found() {
    let (app, _pool) = setup().await;
    let token = fetch_csrf_token(&app).await;

    let response = app
        .clone()
        .oneshot(flow_request(
            "POST",
            "/cancellation/commit",
            &token,
            Some(json!({ "confirm": true })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn complete_endpoint_commits_the_found_job_path() {
    let (app, pool) = setup().await;
    let token = fetch_csrf_token(&app).await;

    let started = start_flow(&app, &token).await;
    let draft_id = started["cancellation"]["id"].as_str().unwrap().to_string();

    let patch = json!({
        "draft_id": draft_id,
        "patch": {
            "found_job": true,
            "found_via_program": false,
            "applied_range": 2,
            "emailed_range": 1,
            "interviewed_range": 1,
            "feedback_text": "the interview prep material was genuinely useful",
            "lawyer_provided": true,
            "visa_type": "H-1B"
        }
    });
    let response = app
        .clone()
        .oneshot(flow_request("PATCH", "/cancel/update", &token, Some(patch)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(flow_request(
            "POST",
            "/cancel/complete",
            &token,
            Some(json!({ "draft_id": draft_id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(subscription_status(&pool).await, "pending_cancellation");

    // Completing twice is a conflict, not a second side effect
    let response = app
        .clone()
        .oneshot(flow_request(
            "POST",
            "/cancel/complete",
            &token,
            Some(json!({ "draft_id": draft_id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
