//! Application context
//!
//! One explicit value constructed at startup and passed into every tool
//! handler. There is no process-wide state besides configuration.

use std::sync::Arc;
use std::time::Duration;

use orascope_cache::SchemaCache;
use orascope_connector::Connector;

/// Engine configuration, immutable after startup
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Default scope for catalog lookups
    pub target_schema: String,
    /// Per-tool-call deadline
    pub tool_deadline: Duration,
}

impl EngineConfig {
    pub fn new(target_schema: impl Into<String>) -> Self {
        Self {
            target_schema: target_schema.into().to_ascii_uppercase(),
            tool_deadline: Duration::from_millis(30_000),
        }
    }

    pub fn with_tool_deadline(mut self, deadline: Duration) -> Self {
        self.tool_deadline = deadline;
        self
    }
}

/// Everything a tool handler needs
pub struct AppContext {
    pub connector: Arc<Connector>,
    pub cache: Arc<SchemaCache>,
    pub config: EngineConfig,
}

impl AppContext {
    pub fn new(connector: Arc<Connector>, cache: Arc<SchemaCache>, config: EngineConfig) -> Self {
        Self {
            connector,
            cache,
            config,
        }
    }
}
