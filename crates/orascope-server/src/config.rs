//! Environment configuration
//!
//! Process-wide state, read once at startup, immutable thereafter.

use std::path::PathBuf;

use orascope_core::{OrascopeError, Result};

/// Server configuration from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `user/password@host:port/service`
    pub connection_string: String,
    /// Default scope for catalog filters; the session user when unset
    pub target_schema: Option<String>,
    pub cache_dir: PathBuf,
    pub thick_mode: bool,
    pub client_lib_dir: Option<String>,
    pub pool_size: usize,
    pub pool_acquire_timeout_ms: u64,
    pub tool_deadline_ms: u64,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let connection_string = require("ORACLE_CONNECTION_STRING")?;
        Ok(Self {
            connection_string,
            target_schema: optional("TARGET_SCHEMA"),
            cache_dir: PathBuf::from(
                optional("CACHE_DIR").unwrap_or_else(|| ".cache".to_string()),
            ),
            thick_mode: optional("THICK_MODE").as_deref() == Some("1"),
            client_lib_dir: optional("ORACLE_CLIENT_LIB_DIR"),
            pool_size: parse_number("POOL_SIZE", 8)?,
            pool_acquire_timeout_ms: parse_number("POOL_ACQUIRE_TIMEOUT_MS", 5_000)?,
            tool_deadline_ms: parse_number("TOOL_DEADLINE_MS", 30_000)?,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn require(key: &str) -> Result<String> {
    optional(key).ok_or_else(|| OrascopeError::Configuration(format!("{key} must be set")))
}

fn parse_number<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match optional(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            OrascopeError::Configuration(format!("{key} must be a number, got {raw:?}"))
        }),
    }
}
