//! The connector facade
//!
//! One execution surface over the session pool: materialized fetches,
//! chunked streaming, and the kind-gated `execute` primitive the SQL tools
//! share.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::catalog;
use crate::config::ConnectorConfig;
use crate::pool::{PooledSession, SessionFactory, SessionPool};
use crate::retry::{Backoff, with_retries};
use crate::session::{
    BindValue, ColumnDesc, OracleSession, RowSet, RowValues, Session, init_thick_mode,
};
use orascope_core::{OrascopeError, Result, SessionInfo, StatementKind, enforce_kind};

/// Outcome of the kind-gated execution primitive
#[derive(Debug)]
pub enum ExecOutcome {
    /// SELECT: the materialized rows
    Rows(RowSet),
    /// DML: affected row count
    Affected(u64),
    /// DDL or PL/SQL: completed without a row count
    Done,
}

/// Factory that opens real Oracle sessions
struct OracleSessionFactory {
    username: String,
    password: String,
    descriptor: String,
}

#[async_trait]
impl SessionFactory for OracleSessionFactory {
    async fn create(&self) -> Result<Arc<dyn Session>> {
        let username = self.username.clone();
        let password = self.password.clone();
        let descriptor = self.descriptor.clone();
        let session = tokio::task::spawn_blocking(move || {
            OracleSession::connect_blocking(&username, &password, &descriptor)
        })
        .await
        .map_err(|e| OrascopeError::Internal(format!("blocking task failed: {e}")))??;
        tracing::debug!("opened new Oracle session");
        Ok(Arc::new(session))
    }
}

/// Pooled Oracle access with retry and the statement-kind gate
pub struct Connector {
    pool: Arc<SessionPool>,
    backoff: Backoff,
    redacted_target: String,
    thick_mode: bool,
}

impl Connector {
    /// Connect and verify reachability. Fails early when the database
    /// cannot be reached; never silently falls back.
    pub async fn connect(config: ConnectorConfig) -> Result<Self> {
        if config.thick_mode {
            init_thick_mode(config.client_lib_dir.as_deref())?;
        }

        let factory = OracleSessionFactory {
            username: config.username.clone(),
            password: config.password.clone(),
            descriptor: config.connect_descriptor.clone(),
        };
        let pool = SessionPool::new(config.pool.clone(), factory);
        let connector = Self {
            pool,
            backoff: Backoff::default(),
            redacted_target: config.redacted(),
            thick_mode: config.thick_mode,
        };

        with_retries("startup probe", &connector.backoff, || async {
            let session = connector.pool.acquire().await?;
            session.ping().await
        })
        .await
        .map_err(|err| {
            OrascopeError::Connection(format!(
                "database unreachable at {}: {err}",
                connector.redacted_target
            ))
        })?;
        tracing::info!(target = %connector.redacted_target, "connected to Oracle");
        Ok(connector)
    }

    /// Build a connector over an externally supplied factory. Test seam; no
    /// startup probe.
    pub fn with_factory<F: SessionFactory>(config: &ConnectorConfig, factory: F) -> Self {
        Self {
            pool: SessionPool::new(config.pool.clone(), factory),
            backoff: Backoff::default(),
            redacted_target: config.redacted(),
            thick_mode: config.thick_mode,
        }
    }

    /// Whether the native client library path was selected at startup.
    pub fn thick_mode(&self) -> bool {
        self.thick_mode
    }

    pub fn pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }

    /// Fetch all rows with positional binds, retrying transient faults.
    pub async fn fetch_all(&self, sql: &str, params: &[BindValue]) -> Result<RowSet> {
        with_retries("fetch_all", &self.backoff, || async {
            let session = self.pool.acquire().await?;
            let result = session.query(sql, params).await;
            discard_on_transient(session, &result).await;
            result
        })
        .await
    }

    /// Fetch all rows with named binds, retrying transient faults.
    pub async fn fetch_named(
        &self,
        sql: &str,
        params: &[(&'static str, BindValue)],
    ) -> Result<RowSet> {
        with_retries("fetch_named", &self.backoff, || async {
            let session = self.pool.acquire().await?;
            let result = session.query_named(sql, params).await;
            discard_on_transient(session, &result).await;
            result
        })
        .await
    }

    /// Stream rows lazily in chunks. Dropping the stream cancels the scan
    /// and releases the session promptly.
    pub async fn fetch_stream(
        &self,
        sql: &str,
        params: &[BindValue],
        chunk_size: usize,
    ) -> Result<RowStream> {
        let session = self.pool.acquire().await?;
        let (meta_tx, meta_rx) = oneshot::channel();
        let (tx, rx) = mpsc::channel(4);
        let sql = sql.to_string();
        let params = params.to_vec();
        tokio::task::spawn_blocking(move || {
            session.stream_blocking(&sql, &params, chunk_size, meta_tx, tx);
            // The session returns to the pool here, after the scan ended or
            // the receiver hung up.
            drop(session);
        });
        let columns = meta_rx
            .await
            .map_err(|_| OrascopeError::Internal("stream producer exited early".into()))??;
        Ok(RowStream { columns, rx })
    }

    /// The kind-gated execution primitive shared by the four SQL tool
    /// families. The gate runs before a session is acquired; a mismatched
    /// statement never reaches the driver.
    pub async fn execute(
        &self,
        sql: &str,
        params: &[BindValue],
        kind: StatementKind,
    ) -> Result<ExecOutcome> {
        enforce_kind(kind, sql)?;
        match kind {
            StatementKind::Select => Ok(ExecOutcome::Rows(self.fetch_all(sql, params).await?)),
            StatementKind::Ddl => {
                let session = self.pool.acquire().await?;
                session.execute(sql, params, false).await?;
                Ok(ExecOutcome::Done)
            }
            StatementKind::Dml => {
                let session = self.pool.acquire().await?;
                let affected = session.execute(sql, params, true).await?;
                Ok(ExecOutcome::Affected(affected))
            }
            StatementKind::Plsql => {
                let session = self.pool.acquire().await?;
                session.execute(sql, params, true).await?;
                Ok(ExecOutcome::Done)
            }
        }
    }

    /// Version banner, current schema and identifier-relevant NLS settings.
    pub async fn session_info(&self) -> Result<SessionInfo> {
        let session = self.pool.acquire().await?;

        // V$VERSION needs privileges some accounts lack; degrade gracefully.
        let banner = match session.query(catalog::VERSION_SQL, &[]).await {
            Ok(rows) => first_cell(&rows).unwrap_or_else(|| "Oracle Database".to_string()),
            Err(_) => "Oracle Database".to_string(),
        };

        let schema_rows = session.query(catalog::CURRENT_SCHEMA_SQL, &[]).await?;
        let current_schema = first_cell(&schema_rows).ok_or_else(|| {
            OrascopeError::Internal("session reports no current schema".into())
        })?;

        let mut nls_comp = None;
        let mut nls_sort = None;
        if let Ok(nls) = session.query(catalog::NLS_SQL, &[]).await {
            for row in &nls.rows {
                match (row.first(), row.get(1)) {
                    (Some(Some(param)), Some(value)) if param == "NLS_COMP" => {
                        nls_comp = value.clone();
                    }
                    (Some(Some(param)), Some(value)) if param == "NLS_SORT" => {
                        nls_sort = value.clone();
                    }
                    _ => {}
                }
            }
        }

        Ok(SessionInfo {
            banner,
            current_schema,
            nls_comp,
            nls_sort,
        })
    }
}

/// A lazily consumed query result
pub struct RowStream {
    pub columns: Vec<ColumnDesc>,
    rx: mpsc::Receiver<Result<Vec<RowValues>>>,
}

impl RowStream {
    /// Next chunk of rows; `None` when the scan is exhausted.
    pub async fn next_chunk(&mut self) -> Option<Result<Vec<RowValues>>> {
        self.rx.recv().await
    }
}

fn first_cell(rows: &RowSet) -> Option<String> {
    rows.rows.first().and_then(|r| r.first()).and_then(Clone::clone)
}

/// A session that just hit a transient fault is likely dead; close it
/// instead of returning it to the idle queue.
async fn discard_on_transient<T>(session: PooledSession, result: &Result<T>) {
    match result {
        Err(err) if err.is_transient() => session.discard().await,
        _ => {}
    }
}
