//! # Offramp Common Library
//!
//! Shared code for the offramp cancellation flow service:
//! - Draft and subscription row models
//! - Step inference (resume logic)
//! - Error types
//! - Database schema initialization
//! - Configuration loading

pub mod config;
pub mod db;
pub mod error;
pub mod steps;
pub mod types;

pub use error::{Error, Result};
pub use steps::{infer_step, validate_patch};
pub use types::{CancellationRow, DraftPatch, Step, Variant};
