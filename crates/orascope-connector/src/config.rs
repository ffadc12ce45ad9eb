//! Connector configuration

use orascope_core::{OrascopeError, Result};

/// Configuration for the Oracle connector
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub username: String,
    pub password: String,
    /// Connect descriptor handed to the driver verbatim, e.g.
    /// `db.example.com:1521/ORCLPDB1`
    pub connect_descriptor: String,
    /// Use the native client library instead of the pure driver path
    pub thick_mode: bool,
    /// Override the client library location in thick mode
    pub client_lib_dir: Option<String>,
    pub pool: PoolConfig,
}

impl ConnectorConfig {
    /// Parse `user/pass@host:port/service` into a config with default pool
    /// settings.
    pub fn from_connection_string(raw: &str) -> Result<Self> {
        let (credentials, descriptor) = raw.split_once('@').ok_or_else(|| {
            OrascopeError::Configuration(
                "connection string must be user/password@host:port/service".to_string(),
            )
        })?;
        let (username, password) = credentials.split_once('/').ok_or_else(|| {
            OrascopeError::Configuration(
                "connection string credentials must be user/password".to_string(),
            )
        })?;
        if username.is_empty() || descriptor.is_empty() {
            return Err(OrascopeError::Configuration(
                "connection string is missing user or connect descriptor".to_string(),
            ));
        }
        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
            connect_descriptor: descriptor.to_string(),
            thick_mode: false,
            client_lib_dir: None,
            pool: PoolConfig::default(),
        })
    }

    /// Credential-free form for logs and error messages.
    pub fn redacted(&self) -> String {
        format!("{}@{}", self.username, self.connect_descriptor)
    }
}

/// Configuration for the session pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Fixed pool size
    max_size: usize,
    /// Timeout in milliseconds when acquiring a session from the pool
    acquire_timeout_ms: u64,
    /// Grace period in milliseconds before an idle session is recycled
    idle_timeout_ms: u64,
    /// Minimum interval in milliseconds between validation probes on the
    /// same session
    validate_interval_ms: u64,
}

impl PoolConfig {
    /// Create a pool configuration with the given size.
    ///
    /// # Panics
    ///
    /// Panics if `max_size` is 0.
    pub fn new(max_size: usize) -> Self {
        assert!(max_size > 0, "pool size must be greater than 0");
        Self {
            max_size,
            acquire_timeout_ms: 5_000,
            idle_timeout_ms: 300_000,
            validate_interval_ms: 30_000,
        }
    }

    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    pub fn with_idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = timeout_ms;
        self
    }

    pub fn with_validate_interval_ms(mut self, interval_ms: u64) -> Self {
        self.validate_interval_ms = interval_ms;
        self
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn acquire_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn idle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn validate_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.validate_interval_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(8)
    }
}
