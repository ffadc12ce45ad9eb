//! Catalog record types
//!
//! The entities the schema cache indexes. Name fields hold the verbatim
//! catalog spelling; lookups normalize separately (see `ident`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Relation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    Table,
    View,
    MaterializedView,
}

impl TableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Table => "TABLE",
            TableKind::View => "VIEW",
            TableKind::MaterializedView => "MATERIALIZED_VIEW",
        }
    }
}

/// A single column of a table or view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub name: String,
    /// 1-based ordinal; dense within the owning table
    pub position: u32,
    /// Canonical Oracle form, e.g. `NUMBER(10,2)`, `VARCHAR2(100 BYTE)`
    pub data_type: String,
    pub nullable: bool,
    pub default_expr: Option<String>,
    pub comment: Option<String>,
}

/// ON DELETE referential action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferentialAction {
    NoAction,
    Cascade,
    SetNull,
}

impl ReferentialAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO_ACTION",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET_NULL",
        }
    }

    /// Parse Oracle's `ALL_CONSTRAINTS.DELETE_RULE` value.
    pub fn from_delete_rule(rule: &str) -> Self {
        match rule.trim() {
            "CASCADE" => ReferentialAction::Cascade,
            "SET NULL" => ReferentialAction::SetNull,
            _ => ReferentialAction::NoAction,
        }
    }
}

/// Constraint enablement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintStatus {
    Enabled,
    Disabled,
}

impl ConstraintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintStatus::Enabled => "ENABLED",
            ConstraintStatus::Disabled => "DISABLED",
        }
    }
}

/// A foreign-key constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyRecord {
    pub name: String,
    pub local_columns: Vec<String>,
    pub target_schema: String,
    pub target_table: String,
    pub target_columns: Vec<String>,
    pub on_delete: ReferentialAction,
    pub deferrable: bool,
    pub status: ConstraintStatus,
    /// Target table lies outside the cached schema scope. The edge is kept;
    /// it just cannot be resolved to a cached `TableRecord`.
    pub external: bool,
}

/// A check constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub name: String,
    pub condition: String,
    pub status: ConstraintStatus,
}

/// Index column direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// One column of an index, with its direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub name: String,
    pub order: SortOrder,
}

/// An index on a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<IndexColumn>,
    /// Oracle `INDEX_TYPE`, e.g. `NORMAL`, `BITMAP`, `FUNCTION-BASED NORMAL`
    pub index_type: String,
}

/// Full description of a table, view or materialized view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub schema: String,
    pub name: String,
    pub kind: TableKind,
    /// Ordered by `position`; positions are dense and 1-based
    pub columns: Vec<ColumnRecord>,
    pub primary_key: Option<Vec<String>>,
    pub unique_keys: Vec<Vec<String>>,
    pub foreign_keys: Vec<ForeignKeyRecord>,
    pub check_constraints: Vec<CheckRecord>,
    pub indexes: Vec<IndexRecord>,
    pub comment: Option<String>,
    pub last_ddl: Option<DateTime<Utc>>,
}

impl TableRecord {
    /// Normalized `SCHEMA.NAME` cache key.
    pub fn key(&self) -> String {
        crate::table_key(&self.schema, &self.name)
    }

    /// Case-insensitive column lookup.
    pub fn column(&self, name: &str) -> Option<&ColumnRecord> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Kind of a catalog object, as reported by `ALL_OBJECTS.OBJECT_TYPE`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Table,
    View,
    MaterializedView,
    Procedure,
    Function,
    Package,
    PackageBody,
    Trigger,
    Type,
    TypeBody,
    Sequence,
    Synonym,
    Index,
    Other(String),
}

impl ObjectKind {
    pub fn as_str(&self) -> &str {
        match self {
            ObjectKind::Table => "TABLE",
            ObjectKind::View => "VIEW",
            ObjectKind::MaterializedView => "MATERIALIZED VIEW",
            ObjectKind::Procedure => "PROCEDURE",
            ObjectKind::Function => "FUNCTION",
            ObjectKind::Package => "PACKAGE",
            ObjectKind::PackageBody => "PACKAGE BODY",
            ObjectKind::Trigger => "TRIGGER",
            ObjectKind::Type => "TYPE",
            ObjectKind::TypeBody => "TYPE BODY",
            ObjectKind::Sequence => "SEQUENCE",
            ObjectKind::Synonym => "SYNONYM",
            ObjectKind::Index => "INDEX",
            ObjectKind::Other(s) => s,
        }
    }

    /// Parse an `OBJECT_TYPE` string; unknown kinds are preserved verbatim.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TABLE" => ObjectKind::Table,
            "VIEW" => ObjectKind::View,
            "MATERIALIZED VIEW" => ObjectKind::MaterializedView,
            "PROCEDURE" => ObjectKind::Procedure,
            "FUNCTION" => ObjectKind::Function,
            "PACKAGE" => ObjectKind::Package,
            "PACKAGE BODY" => ObjectKind::PackageBody,
            "TRIGGER" => ObjectKind::Trigger,
            "TYPE" => ObjectKind::Type,
            "TYPE BODY" => ObjectKind::TypeBody,
            "SEQUENCE" => ObjectKind::Sequence,
            "SYNONYM" => ObjectKind::Synonym,
            "INDEX" => ObjectKind::Index,
            other => ObjectKind::Other(other.to_string()),
        }
    }

    /// Kinds whose source text lives in `ALL_SOURCE`.
    pub fn has_source(&self) -> bool {
        matches!(
            self,
            ObjectKind::Procedure
                | ObjectKind::Function
                | ObjectKind::Package
                | ObjectKind::PackageBody
                | ObjectKind::Trigger
                | ObjectKind::Type
                | ObjectKind::TypeBody
        )
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a catalog object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub schema: String,
    pub name: String,
    pub kind: ObjectKind,
}

impl ObjectRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            kind,
        }
    }

    /// Normalized `SCHEMA.NAME` key (kind-agnostic).
    pub fn qualified_key(&self) -> String {
        crate::table_key(&self.schema, &self.name)
    }
}

/// A directed dependency edge at object granularity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub referrer: ObjectRef,
    pub referenced: ObjectRef,
}

/// A PL/SQL or schema-level object in the inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlsqlObject {
    pub schema: String,
    pub name: String,
    pub kind: ObjectKind,
    /// Oracle `STATUS`: `VALID` or `INVALID`
    pub status: String,
    pub last_ddl: Option<DateTime<Utc>>,
    pub source_available: bool,
}

/// Oracle `TYPECODE` of a user-defined type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeCode {
    Object,
    Collection,
    Varray,
    Other(String),
}

impl TypeCode {
    pub fn as_str(&self) -> &str {
        match self {
            TypeCode::Object => "OBJECT",
            TypeCode::Collection => "COLLECTION",
            TypeCode::Varray => "VARRAY",
            TypeCode::Other(s) => s,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "OBJECT" => TypeCode::Object,
            "COLLECTION" => TypeCode::Collection,
            "VARRAY" => TypeCode::Varray,
            other => TypeCode::Other(other.to_string()),
        }
    }
}

/// One attribute of a user-defined type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAttr {
    pub name: String,
    pub data_type: String,
    pub position: u32,
}

/// A user-defined type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDefinedType {
    pub schema: String,
    pub name: String,
    pub typecode: TypeCode,
    pub attributes: Vec<TypeAttr>,
}
