//! orascope - schema-context MCP server for very large Oracle databases
//!
//! Startup wires one application context (connector, cache, engine
//! configuration) and hands it to the stdio MCP loop. Exit codes:
//! 0 clean shutdown, 1 configuration error, 2 database unreachable,
//! 3 irrecoverable cache-directory I/O error.

mod config;
mod mcp;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use orascope_cache::{Persister, SchemaCache};
use orascope_connector::{Connector, ConnectorConfig, PoolConfig};
use orascope_core::CatalogReader;
use orascope_engine::{AppContext, EngineConfig, ToolRegistry};

use config::ServerConfig;

fn main() -> ExitCode {
    // Stdout belongs to the MCP channel; all logging goes to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "configuration error");
            return ExitCode::from(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(error = %err, "failed to start runtime");
            return ExitCode::from(1);
        }
    };

    ExitCode::from(runtime.block_on(run(config)))
}

async fn run(config: ServerConfig) -> u8 {
    let connector_config = match build_connector_config(&config) {
        Ok(cfg) => cfg,
        Err(err) => {
            tracing::error!(error = %err, "configuration error");
            return 1;
        }
    };
    // The session user is the default catalog scope.
    let target_schema = config
        .target_schema
        .clone()
        .unwrap_or_else(|| connector_config.username.to_ascii_uppercase());

    let connector = match Connector::connect(connector_config).await {
        Ok(connector) => Arc::new(connector),
        Err(err) => {
            tracing::error!(error = %err, "database unreachable at startup");
            return 2;
        }
    };

    let persister = match Persister::new(&config.cache_dir) {
        Ok(persister) => Arc::new(persister),
        Err(err) => {
            tracing::error!(
                cache_dir = %config.cache_dir.display(),
                error = %err,
                "cannot use cache directory"
            );
            return 3;
        }
    };

    let cache = Arc::new(SchemaCache::new(
        Arc::clone(&connector) as Arc<dyn CatalogReader>,
        &target_schema,
        persister,
    ));

    // Warm-load the matching cache file; on a fingerprint miss the full
    // build runs in the background while misses are served through the
    // targeted path.
    match cache.initialize().await {
        Ok(true) => {
            tracing::info!(tables = cache.table_count(), "serving from warm cache");
        }
        Ok(false) => {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                match cache.rebuild().await {
                    Ok(stats) => tracing::info!(
                        tables = stats.tables,
                        duration_ms = stats.duration_ms,
                        "background build finished"
                    ),
                    Err(err) => {
                        tracing::warn!(error = %err, "background build failed")
                    }
                }
            });
        }
        Err(err) => {
            tracing::warn!(error = %err, "cache warm-load failed, starting cold");
        }
    }

    let ctx = Arc::new(AppContext::new(
        connector,
        Arc::clone(&cache),
        EngineConfig::new(&target_schema)
            .with_tool_deadline(Duration::from_millis(config.tool_deadline_ms)),
    ));
    let registry = Arc::new(ToolRegistry::standard());

    tracing::info!(
        schema = %target_schema,
        tools = registry.specs().len(),
        "orascope ready on stdio"
    );
    if let Err(err) = mcp::serve(ctx, registry).await {
        tracing::error!(error = %err, "transport failed");
        return 1;
    }

    // Flush the latest index state before a clean shutdown.
    if let Err(err) = cache.persist_now().await {
        tracing::warn!(error = %err, "final cache persist failed");
    }
    0
}

fn build_connector_config(config: &ServerConfig) -> orascope_core::Result<ConnectorConfig> {
    let mut connector = ConnectorConfig::from_connection_string(&config.connection_string)?;
    connector.thick_mode = config.thick_mode;
    connector.client_lib_dir = config.client_lib_dir.clone();
    connector.pool = PoolConfig::new(config.pool_size.max(1))
        .with_acquire_timeout_ms(config.pool_acquire_timeout_ms);
    Ok(connector)
}
