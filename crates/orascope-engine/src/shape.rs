//! Tool response shapes
//!
//! Serde structs whose declaration order fixes the JSON field order, so
//! every response serializes deterministically.

use serde::Serialize;

use orascope_cache::{ColumnHit, RelatedTables, TableConstraints};
use orascope_core::{
    CheckRecord, ForeignKeyRecord, IndexRecord, ObjectRef, PlsqlObject, TableRecord,
    UserDefinedType,
};

#[derive(Debug, Serialize)]
pub struct ColumnJson {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub position: u32,
    pub default: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ForeignKeyRefJson {
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ForeignKeyJson {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(rename = "ref")]
    pub target: ForeignKeyRefJson,
    pub on_delete: String,
    pub external: bool,
}

#[derive(Debug, Serialize)]
pub struct IndexJson {
    pub name: String,
    pub unique: bool,
    /// `[["DEPT_ID", "ASC"], ...]`
    pub columns: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
pub struct TableJson {
    pub schema: String,
    pub name: String,
    pub kind: String,
    pub columns: Vec<ColumnJson>,
    pub primary_key: Option<Vec<String>>,
    pub foreign_keys: Vec<ForeignKeyJson>,
    pub indexes: Vec<IndexJson>,
    pub comment: Option<String>,
}

impl From<TableRecord> for TableJson {
    fn from(record: TableRecord) -> Self {
        Self {
            schema: record.schema,
            name: record.name,
            kind: record.kind.as_str().to_string(),
            columns: record
                .columns
                .into_iter()
                .map(|c| ColumnJson {
                    name: c.name,
                    data_type: c.data_type,
                    nullable: c.nullable,
                    position: c.position,
                    default: c.default_expr,
                    comment: c.comment,
                })
                .collect(),
            primary_key: record.primary_key,
            foreign_keys: record.foreign_keys.into_iter().map(Into::into).collect(),
            indexes: record.indexes.into_iter().map(Into::into).collect(),
            comment: record.comment,
        }
    }
}

impl From<ForeignKeyRecord> for ForeignKeyJson {
    fn from(fk: ForeignKeyRecord) -> Self {
        Self {
            name: fk.name,
            columns: fk.local_columns,
            target: ForeignKeyRefJson {
                schema: fk.target_schema,
                table: fk.target_table,
                columns: fk.target_columns,
            },
            on_delete: fk.on_delete.as_str().to_string(),
            external: fk.external,
        }
    }
}

impl From<IndexRecord> for IndexJson {
    fn from(index: IndexRecord) -> Self {
        Self {
            name: index.name,
            unique: index.unique,
            columns: index
                .columns
                .into_iter()
                .map(|c| (c.name, c.order.as_str().to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckJson {
    pub name: String,
    pub condition: String,
    pub status: String,
}

impl From<CheckRecord> for CheckJson {
    fn from(check: CheckRecord) -> Self {
        Self {
            name: check.name,
            condition: check.condition,
            status: check.status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConstraintsJson {
    pub schema: String,
    pub table: String,
    pub primary_key: Option<Vec<String>>,
    pub unique_keys: Vec<Vec<String>>,
    pub foreign_keys: Vec<ForeignKeyJson>,
    pub check_constraints: Vec<CheckJson>,
}

impl From<TableConstraints> for ConstraintsJson {
    fn from(c: TableConstraints) -> Self {
        Self {
            schema: c.schema,
            table: c.table,
            primary_key: c.primary_key,
            unique_keys: c.unique_keys,
            foreign_keys: c.foreign_keys.into_iter().map(Into::into).collect(),
            check_constraints: c.check_constraints.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ColumnHitJson {
    pub schema: String,
    pub table: String,
    pub column: String,
    pub data_type: String,
}

impl From<ColumnHit> for ColumnHitJson {
    fn from(hit: ColumnHit) -> Self {
        Self {
            schema: hit.schema,
            table: hit.table,
            column: hit.column,
            data_type: hit.data_type,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlsqlObjectJson {
    pub schema: String,
    pub name: String,
    pub kind: String,
    pub status: String,
    pub last_ddl: Option<String>,
    pub source_available: bool,
}

impl From<PlsqlObject> for PlsqlObjectJson {
    fn from(obj: PlsqlObject) -> Self {
        Self {
            schema: obj.schema,
            name: obj.name,
            kind: obj.kind.as_str().replace(' ', "_"),
            status: obj.status,
            last_ddl: obj.last_ddl.map(|t| t.to_rfc3339()),
            source_available: obj.source_available,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ObjectRefJson {
    pub schema: String,
    pub name: String,
    pub kind: String,
}

impl From<ObjectRef> for ObjectRefJson {
    fn from(obj: ObjectRef) -> Self {
        Self {
            schema: obj.schema,
            name: obj.name,
            kind: obj.kind.as_str().replace(' ', "_"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RelatedRefJson {
    pub schema: String,
    pub name: String,
    pub via: String,
}

#[derive(Debug, Serialize)]
pub struct RelatedTablesJson {
    pub incoming: Vec<RelatedRefJson>,
    pub outgoing: Vec<RelatedRefJson>,
}

impl From<RelatedTables> for RelatedTablesJson {
    fn from(related: RelatedTables) -> Self {
        let map = |r: orascope_cache::RelatedRef| RelatedRefJson {
            schema: r.schema,
            name: r.name,
            via: r.via,
        };
        Self {
            incoming: related.incoming.into_iter().map(map).collect(),
            outgoing: related.outgoing.into_iter().map(map).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TypeAttrJson {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub position: u32,
}

#[derive(Debug, Serialize)]
pub struct UdtJson {
    pub schema: String,
    pub name: String,
    pub typecode: String,
    pub attributes: Vec<TypeAttrJson>,
}

impl From<UserDefinedType> for UdtJson {
    fn from(udt: UserDefinedType) -> Self {
        Self {
            schema: udt.schema,
            name: udt.name,
            typecode: udt.typecode.as_str().to_string(),
            attributes: udt
                .attributes
                .into_iter()
                .map(|a| TypeAttrJson {
                    name: a.name,
                    data_type: a.data_type,
                    position: a.position,
                })
                .collect(),
        }
    }
}
