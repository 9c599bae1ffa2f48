//! Database initialization
//!
//! Creates the database on first run with the full schema, applies the
//! connection pragmas, and seeds a demo subscriber so a fresh install has
//! something to cancel. All of it is idempotent (CREATE TABLE IF NOT
//! EXISTS / INSERT OR IGNORE), so startup is safe to repeat.

use crate::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

/// Demo subscriber seeded on first run (stands in for the authentication
/// collaborator; real deployments provision sessions out of band)
pub const DEMO_USER_ID: &str = "00000000-0000-0000-0000-000000000001";
pub const DEMO_SUBSCRIPTION_ID: &str = "00000000-0000-0000-0000-000000000002";
pub const DEMO_SESSION_TOKEN: &str = "offramp-demo-session";

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;
    seed_demo_data(&pool).await?;

    Ok(pool)
}

/// Connect to a private in-memory database with the schema applied
///
/// Single connection only: each `sqlite::memory:` connection is its own
/// database, so a larger pool would scatter tables across connections.
pub async fn connect_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_subscriptions_table(pool).await?;
    create_cancellations_table(pool).await?;
    create_sessions_table(pool).await?;
    Ok(())
}

async fn create_subscriptions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subscriptions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            monthly_price_cents INTEGER NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_cancellations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cancellations (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            subscription_id TEXT NOT NULL,
            downsell_variant TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'draft',
            found_job INTEGER,
            found_via_program INTEGER,
            applied_range INTEGER,
            emailed_range INTEGER,
            interviewed_range INTEGER,
            feedback_text TEXT,
            lawyer_provided INTEGER,
            visa_type TEXT,
            reason_code TEXT,
            reason_text TEXT,
            willing_to_pay_cents INTEGER,
            usage_applied INTEGER,
            usage_emailed INTEGER,
            usage_interviewed INTEGER,
            accepted_downsell INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One in-flight draft per (user, subscription). The partial unique
    // index makes first-draft creation an atomic insert-if-absent: the
    // first write wins and a concurrent second create adopts the winner's
    // variant instead of overwriting it.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_cancellations_open_draft
        ON cancellations (user_id, subscription_id)
        WHERE status = 'draft'
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Seed the demo subscriber, subscription and session if absent
pub async fn seed_demo_data(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO subscriptions (id, user_id, status, monthly_price_cents)
        VALUES (?, ?, 'active', 2500)
        "#,
    )
    .bind(DEMO_SUBSCRIPTION_ID)
    .bind(DEMO_USER_ID)
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO sessions (token, user_id) VALUES (?, ?)")
        .bind(DEMO_SESSION_TOKEN)
        .bind(DEMO_USER_ID)
        .execute(pool)
        .await?;

    Ok(())
}
