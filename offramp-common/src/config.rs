//! Configuration loading
//!
//! Resolution priority for each setting:
//! 1. Environment variable (highest)
//! 2. TOML config file (`offramp/config.toml` in the platform config dir)
//! 3. Compiled default

use crate::Result;
use std::path::PathBuf;

/// Default listen port for the flow service
pub const DEFAULT_PORT: u16 = 5780;

/// Default database filename, relative to the working directory
pub const DEFAULT_DB_PATH: &str = "offramp.db";

/// Resolve the SQLite database path
///
/// Priority: `OFFRAMP_DB` env var → `db_path` key in the config file →
/// `./offramp.db`.
pub fn resolve_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("OFFRAMP_DB") {
        return PathBuf::from(path);
    }

    if let Some(value) = config_file_value("db_path") {
        if let Some(path) = value.as_str() {
            return PathBuf::from(path);
        }
    }

    PathBuf::from(DEFAULT_DB_PATH)
}

/// Resolve the HTTP listen port
///
/// Priority: `OFFRAMP_PORT` env var → `port` key in the config file → 5780.
/// Unparseable values fall through to the next tier.
pub fn resolve_port() -> u16 {
    if let Ok(raw) = std::env::var("OFFRAMP_PORT") {
        if let Ok(port) = raw.parse::<u16>() {
            return port;
        }
    }

    if let Some(value) = config_file_value("port") {
        if let Some(port) = value.as_integer() {
            if let Ok(port) = u16::try_from(port) {
                return port;
            }
        }
    }

    DEFAULT_PORT
}

/// Read one key from the TOML config file, if the file exists and parses
fn config_file_value(key: &str) -> Option<toml::Value> {
    let path = config_file_path().ok()?;
    let content = std::fs::read_to_string(path).ok()?;
    let config = toml::from_str::<toml::Value>(&content).ok()?;
    config.get(key).cloned()
}

/// Platform config file path: `<config dir>/offramp/config.toml`
fn config_file_path() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| crate::Error::Config("Could not determine config directory".to_string()))?;
    Ok(dir.join("offramp").join("config.toml"))
}
