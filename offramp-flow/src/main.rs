//! offramp-flow - Subscription cancellation flow service
//!
//! Serves the resumable cancellation interview: a subscriber starts or
//! resumes a draft, answers step by step, and ends with the subscription
//! either flagged for pending cancellation or continued with a discount.

use anyhow::Result;
use offramp_common::{config, db};
use offramp_flow::{build_router, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting Offramp Cancellation Flow (offramp-flow) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db_path = config::resolve_db_path();
    info!("Database path: {}", db_path.display());

    let pool = db::init_database(&db_path).await?;

    let state = AppState::new(pool);
    let app = build_router(state);

    let port = config::resolve_port();
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!("offramp-flow listening on http://127.0.0.1:{}", port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app).await?;

    Ok(())
}
