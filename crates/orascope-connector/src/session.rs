//! Oracle session wrapper
//!
//! Bridges the blocking `oracle` driver onto the tokio blocking pool. One
//! `OracleSession` owns one driver connection; the pool hands sessions out
//! behind the `Session` trait so tests can substitute mocks.

use async_trait::async_trait;
use oracle::sql_type::{OracleType, ToSql};
use oracle::{Connection, SqlValue};
use orascope_core::{OrascopeError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};

/// A value bound into a SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Str(String),
    Int(i64),
    Float(f64),
    Null,
}

impl BindValue {
    pub fn str(value: impl Into<String>) -> Self {
        BindValue::Str(value.into())
    }
}

// Strings are declared VARCHAR2 rather than the driver's NVARCHAR2 default
// so UTF-8 binds compare correctly against catalog columns.
impl ToSql for BindValue {
    fn oratype(&self, conn: &Connection) -> oracle::Result<OracleType> {
        match self {
            BindValue::Str(s) => Ok(OracleType::Varchar2(s.len().max(1) as u32)),
            BindValue::Int(v) => v.oratype(conn),
            BindValue::Float(v) => v.oratype(conn),
            BindValue::Null => None::<String>.oratype(conn),
        }
    }

    fn to_sql(&self, val: &mut SqlValue) -> oracle::Result<()> {
        match self {
            BindValue::Str(s) => s.to_sql(val),
            BindValue::Int(v) => v.to_sql(val),
            BindValue::Float(v) => v.to_sql(val),
            BindValue::Null => None::<String>.to_sql(val),
        }
    }
}

/// Column metadata of a result set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    pub name: String,
    /// Driver-reported Oracle type, e.g. `NUMBER`, `VARCHAR2(100)`
    pub type_name: String,
}

/// One row, every cell fetched through Oracle's string conversion
pub type RowValues = Vec<Option<String>>;

/// A fully materialized query result
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub columns: Vec<ColumnDesc>,
    pub rows: Vec<RowValues>,
}

impl RowSet {
    /// Index of a column by name, case-insensitive.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// A database session as seen by the pool and the connector
#[async_trait]
pub trait Session: Send + Sync {
    /// Run a query with positional binds and materialize all rows.
    async fn query(&self, sql: &str, params: &[BindValue]) -> Result<RowSet>;

    /// Run a query with named binds and materialize all rows.
    async fn query_named(&self, sql: &str, params: &[(&'static str, BindValue)])
        -> Result<RowSet>;

    /// Execute a non-query statement; returns the affected row count.
    async fn execute(&self, sql: &str, params: &[BindValue], autocommit: bool) -> Result<u64>;

    /// Stream a query in chunks. Runs on the caller's (blocking) thread;
    /// column metadata goes out on `meta_tx` before the first chunk. A
    /// closed `tx` cancels the scan.
    fn stream_blocking(
        &self,
        sql: &str,
        params: &[BindValue],
        chunk_size: usize,
        meta_tx: oneshot::Sender<Result<Vec<ColumnDesc>>>,
        tx: mpsc::Sender<Result<Vec<RowValues>>>,
    );

    /// Validation probe (`SELECT 1 FROM DUAL`).
    async fn ping(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// A live Oracle session
pub struct OracleSession {
    conn: Arc<Connection>,
    closed: AtomicBool,
}

impl OracleSession {
    /// Open a new session. Blocking; call from the blocking pool or startup.
    pub fn connect_blocking(
        username: &str,
        password: &str,
        descriptor: &str,
    ) -> Result<Self> {
        let conn = Connection::connect(username, password, descriptor)
            .map_err(map_oracle_error)?;
        Ok(Self {
            conn: Arc::new(conn),
            closed: AtomicBool::new(false),
        })
    }

    fn query_blocking(
        conn: &Connection,
        sql: &str,
        binder: Binder<'_>,
    ) -> Result<RowSet> {
        let rs = match binder {
            Binder::Positional(params) => {
                let refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
                conn.query(sql, &refs)
            }
            Binder::Named(params) => {
                let refs: Vec<(&str, &dyn ToSql)> = params
                    .iter()
                    .map(|(name, value)| (*name, value as &dyn ToSql))
                    .collect();
                conn.query_named(sql, &refs)
            }
        }
        .map_err(map_oracle_error)?;

        let columns = column_descs(rs.column_info());
        let width = columns.len();
        let mut rows = Vec::new();
        for row in rs {
            let row = row.map_err(map_oracle_error)?;
            rows.push(row_values(&row, width)?);
        }
        Ok(RowSet { columns, rows })
    }
}

enum Binder<'a> {
    Positional(&'a [BindValue]),
    Named(&'a [(&'static str, BindValue)]),
}

#[async_trait]
impl Session for OracleSession {
    async fn query(&self, sql: &str, params: &[BindValue]) -> Result<RowSet> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let params = params.to_vec();
        tokio::task::spawn_blocking(move || {
            Self::query_blocking(&conn, &sql, Binder::Positional(&params))
        })
        .await
        .map_err(|e| OrascopeError::Internal(format!("blocking task failed: {e}")))?
    }

    async fn query_named(
        &self,
        sql: &str,
        params: &[(&'static str, BindValue)],
    ) -> Result<RowSet> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let params = params.to_vec();
        tokio::task::spawn_blocking(move || {
            Self::query_blocking(&conn, &sql, Binder::Named(&params))
        })
        .await
        .map_err(|e| OrascopeError::Internal(format!("blocking task failed: {e}")))?
    }

    async fn execute(&self, sql: &str, params: &[BindValue], autocommit: bool) -> Result<u64> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let params = params.to_vec();
        tokio::task::spawn_blocking(move || {
            let refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
            let stmt = conn.execute(&sql, &refs).map_err(map_oracle_error)?;
            let affected = stmt.row_count().map_err(map_oracle_error)?;
            if autocommit {
                conn.commit().map_err(map_oracle_error)?;
            }
            Ok(affected)
        })
        .await
        .map_err(|e| OrascopeError::Internal(format!("blocking task failed: {e}")))?
    }

    fn stream_blocking(
        &self,
        sql: &str,
        params: &[BindValue],
        chunk_size: usize,
        meta_tx: oneshot::Sender<Result<Vec<ColumnDesc>>>,
        tx: mpsc::Sender<Result<Vec<RowValues>>>,
    ) {
        let refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
        let rs = match self.conn.query(sql, &refs).map_err(map_oracle_error) {
            Ok(rs) => rs,
            Err(err) => {
                let _ = meta_tx.send(Err(err));
                return;
            }
        };
        let columns = column_descs(rs.column_info());
        let width = columns.len();
        if meta_tx.send(Ok(columns)).is_err() {
            return;
        }

        let mut chunk = Vec::with_capacity(chunk_size);
        for row in rs {
            let values = row
                .map_err(map_oracle_error)
                .and_then(|row| row_values(&row, width));
            match values {
                Ok(values) => {
                    chunk.push(values);
                    if chunk.len() >= chunk_size
                        && tx.blocking_send(Ok(std::mem::take(&mut chunk))).is_err()
                    {
                        // Receiver dropped: the caller canceled.
                        return;
                    }
                }
                Err(err) => {
                    let _ = tx.blocking_send(Err(err));
                    return;
                }
            }
        }
        if !chunk.is_empty() {
            let _ = tx.blocking_send(Ok(chunk));
        }
    }

    async fn ping(&self) -> Result<()> {
        self.query("SELECT 1 FROM DUAL", &[]).await.map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let _ = conn.close();
        })
        .await
        .map_err(|e| OrascopeError::Internal(format!("blocking task failed: {e}")))?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn column_descs(info: &[oracle::ColumnInfo]) -> Vec<ColumnDesc> {
    info.iter()
        .map(|c| ColumnDesc {
            name: c.name().to_string(),
            type_name: c.oracle_type().to_string(),
        })
        .collect()
}

fn row_values(row: &oracle::Row, width: usize) -> Result<RowValues> {
    let mut values = Vec::with_capacity(width);
    for i in 0..width {
        let value: Option<String> = row.get(i).map_err(map_oracle_error)?;
        values.push(value);
    }
    Ok(values)
}

/// Initialize the native client library path for thick mode. Must run
/// before the first connection; a no-op when the driver is already
/// initialized.
pub fn init_thick_mode(client_lib_dir: Option<&str>) -> Result<()> {
    if oracle::InitParams::is_initialized() {
        return Ok(());
    }
    let mut params = oracle::InitParams::new();
    if let Some(dir) = client_lib_dir {
        params
            .oracle_client_lib_dir(dir)
            .map_err(map_oracle_error)?;
    }
    params.init().map_err(map_oracle_error)?;
    tracing::info!(
        client_lib_dir = client_lib_dir.unwrap_or("<default search path>"),
        "initialized Oracle client in thick mode"
    );
    Ok(())
}

/// Map a driver error onto the taxonomy. ORA-coded errors become
/// `Query` (transience is decided from the code); everything else is a
/// connection-level fault.
pub(crate) fn map_oracle_error(err: oracle::Error) -> OrascopeError {
    let message = err.to_string();
    match parse_ora_code(&message) {
        Some(code) => OrascopeError::Query { code, message },
        None => OrascopeError::Connection(message),
    }
}

/// Extract the numeric code from the first `ORA-NNNNN` in a message.
fn parse_ora_code(message: &str) -> Option<i32> {
    let start = message.find("ORA-")? + 4;
    let digits: String = message[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}
