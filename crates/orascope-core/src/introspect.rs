//! Typed catalog read interface
//!
//! `CatalogReader` is the seam between the schema cache (L2) and the
//! connector (L1). The cache consumes typed rows; the connector translates
//! them from the `ALL_*` dictionary views. Tests substitute an in-memory
//! catalog.

use crate::{
    CheckRecord, ColumnRecord, ConstraintStatus, DependencyEdge, IndexRecord, ObjectKind,
    PlsqlObject, ReferentialAction, Result, TableKind, UserDefinedType,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One row of `ALL_TABLES` / `ALL_VIEWS` / `ALL_MVIEWS`, joined with comments
#[derive(Debug, Clone)]
pub struct TableMetaRow {
    pub schema: String,
    pub name: String,
    pub kind: TableKind,
    pub comment: Option<String>,
    pub last_ddl: Option<DateTime<Utc>>,
}

/// One row of `ALL_TAB_COLUMNS`, joined with `ALL_COL_COMMENTS`
#[derive(Debug, Clone)]
pub struct ColumnMetaRow {
    pub table: String,
    pub column: ColumnRecord,
}

/// Kind of constraint, from `ALL_CONSTRAINTS.CONSTRAINT_TYPE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    ForeignKey,
    Check,
}

/// One assembled constraint (columns already ordered by position)
#[derive(Debug, Clone)]
pub struct ConstraintRow {
    pub table: String,
    pub name: String,
    pub kind: ConstraintKind,
    pub columns: Vec<String>,
    /// Foreign keys only: resolved reference target
    pub ref_schema: Option<String>,
    pub ref_table: Option<String>,
    pub ref_columns: Vec<String>,
    pub delete_rule: ReferentialAction,
    pub deferrable: bool,
    pub status: ConstraintStatus,
    /// Check constraints only: the search condition
    pub condition: Option<String>,
}

impl ConstraintRow {
    pub fn into_check(self) -> CheckRecord {
        CheckRecord {
            name: self.name,
            condition: self.condition.unwrap_or_default(),
            status: self.status,
        }
    }
}

/// One assembled index (columns already ordered by position)
#[derive(Debug, Clone)]
pub struct IndexMetaRow {
    pub table: String,
    pub index: IndexRecord,
}

/// Aggregate over `ALL_OBJECTS` used to derive the catalog generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogGeneration {
    /// `MAX(LAST_DDL_TIME)` formatted as `YYYY-MM-DD HH24:MI:SS`
    pub max_last_ddl: Option<String>,
    pub object_count: u64,
}

/// Session-level facts relevant to identifier comparison
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Version banner, e.g. `Oracle Database 19c Enterprise Edition ...`
    pub banner: String,
    pub current_schema: String,
    pub nls_comp: Option<String>,
    pub nls_sort: Option<String>,
}

/// Typed read access to the data dictionary, scoped by owner.
///
/// All methods accept an optional object-name narrowing filter; `None` means
/// the full sweep for the schema. Implementations must bind both filters as
/// parameters, never interpolate.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn read_tables(&self, schema: &str, table: Option<&str>) -> Result<Vec<TableMetaRow>>;

    async fn read_columns(&self, schema: &str, table: Option<&str>)
        -> Result<Vec<ColumnMetaRow>>;

    async fn read_constraints(
        &self,
        schema: &str,
        table: Option<&str>,
    ) -> Result<Vec<ConstraintRow>>;

    async fn read_indexes(&self, schema: &str, table: Option<&str>)
        -> Result<Vec<IndexMetaRow>>;

    /// PL/SQL and schema-object inventory from `ALL_OBJECTS`.
    async fn read_objects(&self, schema: &str) -> Result<Vec<PlsqlObject>>;

    /// Concatenated `ALL_SOURCE` text; `None` when the object has no source.
    async fn read_source(
        &self,
        schema: &str,
        name: &str,
        kind: &ObjectKind,
    ) -> Result<Option<String>>;

    /// Dependency edges from `ALL_DEPENDENCIES`. With `name`, only edges
    /// touching that object (either direction) are returned.
    async fn read_dependencies(
        &self,
        schema: &str,
        name: Option<&str>,
    ) -> Result<Vec<DependencyEdge>>;

    async fn read_types(&self, schema: &str) -> Result<Vec<UserDefinedType>>;

    async fn read_generation(&self, schema: &str) -> Result<CatalogGeneration>;

    async fn session_info(&self) -> Result<SessionInfo>;
}
