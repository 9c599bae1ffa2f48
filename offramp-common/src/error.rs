//! Common error types for the offramp service

use thiserror::Error;

/// Common result type for offramp operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the offramp crates
///
/// The variants mirror the HTTP error families the service exposes:
/// Forbidden (403), Validation (400), NotFound (404), Conflict (409),
/// Database (500).
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// CSRF token missing or mismatched
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Malformed or missing required fields, rejected before any write
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// State transition attempted on a row that already left that state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
