//! offramp-flow library - resumable cancellation flow service
//!
//! HTTP surface over the cancellation workflow engine: CSRF-guarded draft
//! persistence, sticky variant assignment, step inference for resume, and
//! the atomic draft→committed transition.

use axum::Router;
use sqlx::SqlitePool;

pub mod api;
pub mod session;
pub mod store;
pub mod wizard;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
///
/// Every mutating route sits behind the CSRF double-submit middleware;
/// token issuance and the health endpoint are public.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, patch, post};

    // Mutating routes (CSRF-guarded)
    let guarded = Router::new()
        .route("/cancel/start", post(api::cancel::start))
        .route("/cancel/update", patch(api::cancel::update))
        .route("/cancel/complete", post(api::cancel::complete))
        .route("/cancel/continue", post(api::cancel::continue_subscription))
        .route("/cancellation/draft", post(api::draft::save_draft))
        .route("/cancellation/commit", post(api::draft::commit))
        .layer(middleware::from_fn(api::csrf::csrf_middleware));

    // Public routes (read-only, no CSRF)
    let public = Router::new()
        .route("/csrf", get(api::csrf::issue_token))
        .merge(api::health::health_routes());

    Router::new()
        .merge(guarded)
        .merge(public)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
