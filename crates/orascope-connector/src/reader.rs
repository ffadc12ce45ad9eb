//! `CatalogReader` over the live data dictionary
//!
//! Translates the `ALL_*` template rows into the typed rows the schema
//! cache consumes. Assembly that Oracle cannot do in one statement
//! (constraint column lists, cross-schema FK targets) happens here.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::catalog;
use crate::connector::Connector;
use crate::session::{BindValue, RowSet, RowValues};
use orascope_core::{
    CatalogGeneration, CatalogReader, ColumnMetaRow, ColumnRecord, ConstraintKind, ConstraintRow,
    ConstraintStatus, DependencyEdge, IndexColumn, IndexMetaRow, IndexRecord, ObjectKind,
    ObjectRef, OrascopeError, PlsqlObject, ReferentialAction, Result, SessionInfo, SortOrder,
    TableKind, TableMetaRow, TypeAttr, TypeCode, UserDefinedType,
};

fn owner_binds(schema: &str, table: Option<&str>) -> Vec<(&'static str, BindValue)> {
    let mut binds = vec![("owner", BindValue::str(schema))];
    if let Some(table) = table {
        binds.push(("tname", BindValue::str(table)));
    }
    binds
}

fn narrow(base: &str, narrow: &str, filtered: bool) -> String {
    if filtered {
        format!("{base}{narrow}")
    } else {
        base.to_string()
    }
}

fn narrow_ordered(base: &str, narrow_sql: &str, order: &str, filtered: bool) -> String {
    format!("{}{}", narrow(base, narrow_sql, filtered), order)
}

fn cell(row: &RowValues, idx: usize) -> Option<String> {
    row.get(idx).cloned().flatten()
}

fn req_cell(row: &RowValues, idx: usize, what: &str) -> Result<String> {
    cell(row, idx).ok_or_else(|| {
        OrascopeError::Internal(format!("catalog row missing required column {what}"))
    })
}

fn cell_i64(row: &RowValues, idx: usize) -> Option<i64> {
    cell(row, idx).and_then(|s| s.trim().parse().ok())
}

fn parse_ddl_time(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S").ok())
        .map(|naive| naive.and_utc())
}

/// Render the canonical Oracle type form (`NUMBER(10,2)`,
/// `VARCHAR2(100 BYTE)`) from the `ALL_TAB_COLUMNS` facets.
fn format_data_type(
    data_type: &str,
    data_length: Option<i64>,
    char_length: Option<i64>,
    char_used: Option<&str>,
    precision: Option<i64>,
    scale: Option<i64>,
) -> String {
    match data_type {
        "NUMBER" => match (precision, scale) {
            (Some(p), Some(0)) | (Some(p), None) => format!("NUMBER({p})"),
            (Some(p), Some(s)) => format!("NUMBER({p},{s})"),
            (None, _) => "NUMBER".to_string(),
        },
        "FLOAT" => match precision {
            Some(p) => format!("FLOAT({p})"),
            None => "FLOAT".to_string(),
        },
        "VARCHAR2" | "CHAR" => {
            let len = char_length.or(data_length).unwrap_or(0);
            let semantics = match char_used {
                Some("C") => "CHAR",
                _ => "BYTE",
            };
            format!("{data_type}({len} {semantics})")
        }
        "NVARCHAR2" | "NCHAR" => {
            let len = char_length.or(data_length).unwrap_or(0);
            format!("{data_type}({len})")
        }
        "RAW" => match data_length {
            Some(len) => format!("RAW({len})"),
            None => "RAW".to_string(),
        },
        // TIMESTAMP(6), INTERVAL DAY(2) TO SECOND(6), DATE, CLOB, ... come
        // back already in canonical form.
        other => other.to_string(),
    }
}

#[async_trait]
impl CatalogReader for Connector {
    async fn read_tables(&self, schema: &str, table: Option<&str>) -> Result<Vec<TableMetaRow>> {
        let sql = narrow(catalog::TABLES_SQL, catalog::TABLES_NARROW, table.is_some());
        let rows = self.fetch_named(&sql, &owner_binds(schema, table)).await?;

        // A materialized view is listed twice in ALL_OBJECTS (as TABLE and
        // as MATERIALIZED VIEW); keep the MV row.
        let mut by_name: HashMap<String, TableMetaRow> = HashMap::new();
        for row in &rows.rows {
            let name = req_cell(row, 1, "OBJECT_NAME")?;
            let kind = match req_cell(row, 2, "OBJECT_TYPE")?.as_str() {
                "VIEW" => TableKind::View,
                "MATERIALIZED VIEW" => TableKind::MaterializedView,
                _ => TableKind::Table,
            };
            let meta = TableMetaRow {
                schema: req_cell(row, 0, "OWNER")?,
                name: name.clone(),
                kind,
                last_ddl: parse_ddl_time(cell(row, 3)),
                comment: cell(row, 4),
            };
            match by_name.get(&name) {
                Some(existing)
                    if existing.kind == TableKind::MaterializedView
                        && kind == TableKind::Table => {}
                _ => {
                    by_name.insert(name, meta);
                }
            }
        }
        let mut tables: Vec<_> = by_name.into_values().collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tables)
    }

    async fn read_columns(
        &self,
        schema: &str,
        table: Option<&str>,
    ) -> Result<Vec<ColumnMetaRow>> {
        let sql = narrow_ordered(
            catalog::COLUMNS_SQL,
            catalog::COLUMNS_NARROW,
            catalog::COLUMNS_ORDER,
            table.is_some(),
        );
        let rows = self.fetch_named(&sql, &owner_binds(schema, table)).await?;

        let mut columns = Vec::with_capacity(rows.rows.len());
        for row in &rows.rows {
            let data_type = format_data_type(
                &req_cell(row, 3, "DATA_TYPE")?,
                cell_i64(row, 4),
                cell_i64(row, 5),
                cell(row, 6).as_deref(),
                cell_i64(row, 7),
                cell_i64(row, 8),
            );
            columns.push(ColumnMetaRow {
                table: req_cell(row, 0, "TABLE_NAME")?,
                column: ColumnRecord {
                    name: req_cell(row, 1, "COLUMN_NAME")?,
                    position: cell_i64(row, 2).unwrap_or(0) as u32,
                    data_type,
                    nullable: cell(row, 9).as_deref() != Some("N"),
                    default_expr: cell(row, 10).map(|s| s.trim().to_string()),
                    comment: cell(row, 11),
                },
            });
        }
        Ok(columns)
    }

    async fn read_constraints(
        &self,
        schema: &str,
        table: Option<&str>,
    ) -> Result<Vec<ConstraintRow>> {
        let heads_sql = narrow(
            catalog::CONSTRAINTS_SQL,
            catalog::CONSTRAINTS_NARROW,
            table.is_some(),
        );
        let heads = self
            .fetch_named(&heads_sql, &owner_binds(schema, table))
            .await?;

        let cols_sql = narrow_ordered(
            catalog::CONS_COLUMNS_SQL,
            catalog::CONS_COLUMNS_NARROW,
            catalog::CONS_COLUMNS_ORDER,
            table.is_some(),
        );
        let cols = self
            .fetch_named(&cols_sql, &owner_binds(schema, table))
            .await?;
        let mut columns_by_constraint: HashMap<String, Vec<String>> = HashMap::new();
        for row in &cols.rows {
            let cname = req_cell(row, 0, "CONSTRAINT_NAME")?;
            let col = req_cell(row, 2, "COLUMN_NAME")?;
            columns_by_constraint.entry(cname).or_default().push(col);
        }

        let mut constraints = Vec::new();
        for row in &heads.rows {
            let name = req_cell(row, 1, "CONSTRAINT_NAME")?;
            let kind = match req_cell(row, 2, "CONSTRAINT_TYPE")?.as_str() {
                "P" => ConstraintKind::PrimaryKey,
                "U" => ConstraintKind::Unique,
                "R" => ConstraintKind::ForeignKey,
                _ => ConstraintKind::Check,
            };
            let condition = cell(row, 6);

            // NOT NULL surfaces as a system-named check constraint; the
            // column's nullable flag already carries that fact.
            if kind == ConstraintKind::Check
                && name.starts_with("SYS_")
                && condition
                    .as_deref()
                    .is_some_and(|c| c.trim_end().ends_with("IS NOT NULL"))
            {
                continue;
            }

            let (ref_schema, ref_table, ref_columns) = if kind == ConstraintKind::ForeignKey {
                let r_owner = req_cell(row, 7, "R_OWNER")?;
                let r_cname = req_cell(row, 8, "R_CONSTRAINT_NAME")?;
                let r_table = cell(row, 9);
                let ref_columns = match columns_by_constraint.get(&r_cname) {
                    Some(cols) if r_owner == schema => cols.clone(),
                    _ => self.read_ref_columns(&r_owner, &r_cname).await?,
                };
                (Some(r_owner), r_table, ref_columns)
            } else {
                (None, None, Vec::new())
            };

            constraints.push(ConstraintRow {
                table: req_cell(row, 0, "TABLE_NAME")?,
                columns: columns_by_constraint.get(&name).cloned().unwrap_or_default(),
                name,
                kind,
                ref_schema,
                ref_table,
                ref_columns,
                delete_rule: cell(row, 5)
                    .map(|r| ReferentialAction::from_delete_rule(&r))
                    .unwrap_or(ReferentialAction::NoAction),
                deferrable: cell(row, 4).as_deref() == Some("DEFERRABLE"),
                status: match cell(row, 3).as_deref() {
                    Some("DISABLED") => ConstraintStatus::Disabled,
                    _ => ConstraintStatus::Enabled,
                },
                condition,
            });
        }
        Ok(constraints)
    }

    async fn read_indexes(
        &self,
        schema: &str,
        table: Option<&str>,
    ) -> Result<Vec<IndexMetaRow>> {
        let heads_sql = narrow(
            catalog::INDEXES_SQL,
            catalog::INDEXES_NARROW,
            table.is_some(),
        );
        let heads = self
            .fetch_named(&heads_sql, &owner_binds(schema, table))
            .await?;

        let cols_sql = narrow_ordered(
            catalog::IND_COLUMNS_SQL,
            catalog::IND_COLUMNS_NARROW,
            catalog::IND_COLUMNS_ORDER,
            table.is_some(),
        );
        let cols = self
            .fetch_named(&cols_sql, &owner_binds(schema, table))
            .await?;
        let mut columns_by_index: HashMap<String, Vec<IndexColumn>> = HashMap::new();
        for row in &cols.rows {
            let index = req_cell(row, 0, "INDEX_NAME")?;
            columns_by_index.entry(index).or_default().push(IndexColumn {
                name: req_cell(row, 2, "COLUMN_NAME")?,
                order: match cell(row, 3).as_deref() {
                    Some("DESC") => SortOrder::Desc,
                    _ => SortOrder::Asc,
                },
            });
        }

        let mut indexes = Vec::with_capacity(heads.rows.len());
        for row in &heads.rows {
            let name = req_cell(row, 1, "INDEX_NAME")?;
            indexes.push(IndexMetaRow {
                table: req_cell(row, 0, "TABLE_NAME")?,
                index: IndexRecord {
                    unique: cell(row, 2).as_deref() == Some("UNIQUE"),
                    index_type: cell(row, 3).unwrap_or_else(|| "NORMAL".to_string()),
                    columns: columns_by_index.remove(&name).unwrap_or_default(),
                    name,
                },
            });
        }
        Ok(indexes)
    }

    async fn read_objects(&self, schema: &str) -> Result<Vec<PlsqlObject>> {
        let rows = self
            .fetch_named(catalog::OBJECTS_SQL, &owner_binds(schema, None))
            .await?;
        let mut objects = Vec::with_capacity(rows.rows.len());
        for row in &rows.rows {
            let kind = ObjectKind::parse(&req_cell(row, 1, "OBJECT_TYPE")?);
            objects.push(PlsqlObject {
                schema: schema.to_string(),
                name: req_cell(row, 0, "OBJECT_NAME")?,
                status: cell(row, 2).unwrap_or_else(|| "VALID".to_string()),
                last_ddl: parse_ddl_time(cell(row, 3)),
                source_available: kind.has_source() || kind == ObjectKind::View,
                kind,
            });
        }
        Ok(objects)
    }

    async fn read_source(
        &self,
        schema: &str,
        name: &str,
        kind: &ObjectKind,
    ) -> Result<Option<String>> {
        if *kind == ObjectKind::View {
            let rows = self
                .fetch_named(
                    catalog::VIEW_SOURCE_SQL,
                    &[("owner", BindValue::str(schema)), ("name", BindValue::str(name))],
                )
                .await?;
            return Ok(rows.rows.first().and_then(|r| cell(r, 0)));
        }

        let rows = self
            .fetch_named(
                catalog::SOURCE_SQL,
                &[
                    ("owner", BindValue::str(schema)),
                    ("name", BindValue::str(name)),
                    ("otype", BindValue::str(kind.as_str())),
                ],
            )
            .await?;
        if rows.rows.is_empty() {
            return Ok(None);
        }
        // ALL_SOURCE.TEXT keeps each line's trailing newline.
        let mut source = String::new();
        for row in &rows.rows {
            if let Some(line) = cell(row, 0) {
                source.push_str(&line);
            }
        }
        Ok(Some(source))
    }

    async fn read_dependencies(
        &self,
        schema: &str,
        name: Option<&str>,
    ) -> Result<Vec<DependencyEdge>> {
        let sql = narrow(
            catalog::DEPENDENCIES_SQL,
            catalog::DEPENDENCIES_NARROW,
            name.is_some(),
        );
        let mut binds = vec![("owner", BindValue::str(schema))];
        if let Some(name) = name {
            binds.push(("name", BindValue::str(name)));
        }
        let rows = self.fetch_named(&sql, &binds).await?;

        let mut edges = Vec::with_capacity(rows.rows.len());
        for row in &rows.rows {
            edges.push(DependencyEdge {
                referrer: ObjectRef::new(
                    req_cell(row, 0, "OWNER")?,
                    req_cell(row, 1, "NAME")?,
                    ObjectKind::parse(&req_cell(row, 2, "TYPE")?),
                ),
                referenced: ObjectRef::new(
                    req_cell(row, 3, "REFERENCED_OWNER")?,
                    req_cell(row, 4, "REFERENCED_NAME")?,
                    ObjectKind::parse(&req_cell(row, 5, "REFERENCED_TYPE")?),
                ),
            });
        }
        Ok(edges)
    }

    async fn read_types(&self, schema: &str) -> Result<Vec<UserDefinedType>> {
        let heads = self
            .fetch_named(catalog::TYPES_SQL, &owner_binds(schema, None))
            .await?;
        let attrs = self
            .fetch_named(catalog::TYPE_ATTRS_SQL, &owner_binds(schema, None))
            .await?;

        let mut attrs_by_type: HashMap<String, Vec<TypeAttr>> = HashMap::new();
        for row in &attrs.rows {
            let type_name = req_cell(row, 0, "TYPE_NAME")?;
            let data_type = format_data_type(
                &req_cell(row, 2, "ATTR_TYPE_NAME")?,
                cell_i64(row, 3),
                cell_i64(row, 3),
                None,
                cell_i64(row, 4),
                cell_i64(row, 5),
            );
            attrs_by_type.entry(type_name).or_default().push(TypeAttr {
                name: req_cell(row, 1, "ATTR_NAME")?,
                data_type,
                position: cell_i64(row, 6).unwrap_or(0) as u32,
            });
        }

        let mut types = Vec::with_capacity(heads.rows.len());
        for row in &heads.rows {
            let name = req_cell(row, 0, "TYPE_NAME")?;
            types.push(UserDefinedType {
                schema: schema.to_string(),
                typecode: TypeCode::parse(&req_cell(row, 1, "TYPECODE")?),
                attributes: attrs_by_type.remove(&name).unwrap_or_default(),
                name,
            });
        }
        Ok(types)
    }

    async fn read_generation(&self, schema: &str) -> Result<CatalogGeneration> {
        let rows = self
            .fetch_named(catalog::GENERATION_SQL, &owner_binds(schema, None))
            .await?;
        let row = rows
            .rows
            .first()
            .ok_or_else(|| OrascopeError::Internal("generation query returned no rows".into()))?;
        Ok(CatalogGeneration {
            max_last_ddl: cell(row, 0),
            object_count: cell_i64(row, 1).unwrap_or(0) as u64,
        })
    }

    async fn session_info(&self) -> Result<SessionInfo> {
        Connector::session_info(self).await
    }
}

impl Connector {
    /// Column list of a referenced constraint, for FK targets that the bulk
    /// fetch did not cover (cross-schema, or targeted single-table loads).
    async fn read_ref_columns(&self, owner: &str, constraint: &str) -> Result<Vec<String>> {
        let rows = self
            .fetch_named(
                catalog::REF_COLUMNS_SQL,
                &[
                    ("owner", BindValue::str(owner)),
                    ("cname", BindValue::str(constraint)),
                ],
            )
            .await?;
        let mut columns = Vec::with_capacity(rows.rows.len());
        for row in &rows.rows {
            columns.push(req_cell(row, 0, "COLUMN_NAME")?);
        }
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_formatting() {
        assert_eq!(
            format_data_type("NUMBER", Some(22), None, None, Some(10), Some(2)),
            "NUMBER(10,2)"
        );
        assert_eq!(
            format_data_type("NUMBER", Some(22), None, None, Some(10), Some(0)),
            "NUMBER(10)"
        );
        assert_eq!(
            format_data_type("NUMBER", Some(22), None, None, None, None),
            "NUMBER"
        );
        assert_eq!(
            format_data_type("VARCHAR2", Some(100), Some(100), Some("B"), None, None),
            "VARCHAR2(100 BYTE)"
        );
        assert_eq!(
            format_data_type("VARCHAR2", Some(400), Some(100), Some("C"), None, None),
            "VARCHAR2(100 CHAR)"
        );
        assert_eq!(
            format_data_type("TIMESTAMP(6)", None, None, None, None, None),
            "TIMESTAMP(6)"
        );
        assert_eq!(format_data_type("CLOB", None, None, None, None, None), "CLOB");
    }

    #[test]
    fn ddl_time_parsing() {
        let parsed = parse_ddl_time(Some("2026-03-14 09:26:53".to_string())).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-03-14T09:26:53+00:00");
        assert!(parse_ddl_time(Some("garbage".to_string())).is_none());
        assert!(parse_ddl_time(None).is_none());
    }
}
