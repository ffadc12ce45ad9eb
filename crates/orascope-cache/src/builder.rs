//! Catalog build pipeline
//!
//! Assembles `TableRecord`s by joining catalog rows in memory on
//! `(owner, table_name)`. The full sweep is staged - tables+columns first,
//! then constraints, indexes, dependencies, and the PL/SQL inventory - and
//! each stage commits an intermediate snapshot to disk so partial progress
//! is observable and crash-safe.

use std::collections::HashMap;
use std::time::Instant;

use orascope_core::{
    CatalogGeneration, CatalogReader, ColumnMetaRow, ConstraintKind, ConstraintRow,
    DependencyEdge, ForeignKeyRecord, IndexMetaRow, PlsqlObject, Result, TableMetaRow,
    TableRecord, UserDefinedType,
};

use crate::fingerprint::CatalogFingerprint;
use crate::persist::Persister;

/// A complete, persistable view of the cache state
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSnapshot {
    pub fingerprint: CatalogFingerprint,
    pub schema: String,
    pub generation: CatalogGeneration,
    /// Sorted by `SCHEMA.NAME` key
    pub tables: Vec<TableRecord>,
    pub plsql: Vec<PlsqlObject>,
    pub udts: Vec<UserDefinedType>,
    pub edges: Vec<DependencyEdge>,
}

/// Outcome of a full build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStats {
    pub tables: usize,
    pub plsql_objects: usize,
    pub types: usize,
    pub dependency_edges: usize,
    pub duration_ms: u64,
    pub fingerprint: String,
}

/// Group column rows per table, order by catalog position, and renumber so
/// positions are dense and 1-based (`SET UNUSED` leaves gaps in
/// `COLUMN_ID`).
pub(crate) fn assemble_tables(
    metas: Vec<TableMetaRow>,
    columns: Vec<ColumnMetaRow>,
) -> HashMap<String, TableRecord> {
    let mut columns_by_table: HashMap<String, Vec<ColumnMetaRow>> = HashMap::new();
    for row in columns {
        columns_by_table
            .entry(row.table.to_ascii_uppercase())
            .or_default()
            .push(row);
    }

    let mut tables = HashMap::with_capacity(metas.len());
    for meta in metas {
        let mut cols = columns_by_table
            .remove(&meta.name.to_ascii_uppercase())
            .unwrap_or_default();
        cols.sort_by_key(|c| c.column.position);
        let columns = cols
            .into_iter()
            .enumerate()
            .map(|(i, mut row)| {
                row.column.position = (i + 1) as u32;
                row.column
            })
            .collect();

        let record = TableRecord {
            schema: meta.schema,
            name: meta.name,
            kind: meta.kind,
            columns,
            primary_key: None,
            unique_keys: Vec::new(),
            foreign_keys: Vec::new(),
            check_constraints: Vec::new(),
            indexes: Vec::new(),
            comment: meta.comment,
            last_ddl: meta.last_ddl,
        };
        tables.insert(record.name.to_ascii_uppercase(), record);
    }
    tables
}

/// Merge constraint rows into the assembled tables. `cache_schema` decides
/// the `external` flag on foreign keys.
pub(crate) fn apply_constraints(
    cache_schema: &str,
    tables: &mut HashMap<String, TableRecord>,
    constraints: Vec<ConstraintRow>,
) {
    for row in constraints {
        let Some(table) = tables.get_mut(&row.table.to_ascii_uppercase()) else {
            continue;
        };
        match row.kind {
            ConstraintKind::PrimaryKey => {
                table.primary_key = Some(row.columns);
            }
            ConstraintKind::Unique => {
                table.unique_keys.push(row.columns);
            }
            ConstraintKind::ForeignKey => {
                let Some(target_table) = row.ref_table else {
                    // The referenced constraint is not visible to this
                    // session; the edge cannot be named.
                    tracing::warn!(
                        table = %table.name,
                        constraint = %row.name,
                        "dropping foreign key with unresolvable target"
                    );
                    continue;
                };
                let target_schema = row.ref_schema.unwrap_or_else(|| cache_schema.to_string());
                let external = !target_schema.eq_ignore_ascii_case(cache_schema);
                table.foreign_keys.push(ForeignKeyRecord {
                    name: row.name,
                    local_columns: row.columns,
                    target_schema,
                    target_table,
                    target_columns: row.ref_columns,
                    on_delete: row.delete_rule,
                    deferrable: row.deferrable,
                    status: row.status,
                    external,
                });
            }
            ConstraintKind::Check => {
                table.check_constraints.push(row.into_check());
            }
        }
    }

    // Deterministic ordering for persistence round-trips.
    for table in tables.values_mut() {
        table.unique_keys.sort();
        table.foreign_keys.sort_by(|a, b| a.name.cmp(&b.name));
        table.check_constraints.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

/// Merge index rows into the assembled tables.
pub(crate) fn apply_indexes(
    tables: &mut HashMap<String, TableRecord>,
    indexes: Vec<IndexMetaRow>,
) {
    for row in indexes {
        if let Some(table) = tables.get_mut(&row.table.to_ascii_uppercase()) {
            table.indexes.push(row.index);
        }
    }
    for table in tables.values_mut() {
        table.indexes.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

fn sorted_tables(tables: &HashMap<String, TableRecord>) -> Vec<TableRecord> {
    let mut out: Vec<_> = tables.values().cloned().collect();
    out.sort_by_key(TableRecord::key);
    out
}

/// Persist an intermediate stage so a crash mid-build leaves observable
/// progress on disk. Stage persist failures do not abort the build.
async fn commit_stage(persister: Option<&Persister>, snapshot: &CacheSnapshot) {
    if let Some(persister) = persister {
        if let Err(err) = persister.save(snapshot).await {
            tracing::warn!(error = %err, "intermediate snapshot persist failed");
        }
    }
}

/// Run the staged full sweep, committing each stage through `persister`.
/// The final snapshot is returned with the build stats.
pub(crate) async fn full_build(
    reader: &dyn CatalogReader,
    schema: &str,
    persister: Option<&Persister>,
) -> Result<(CacheSnapshot, BuildStats)> {
    let started = Instant::now();

    let info = reader.session_info().await?;
    let generation = reader.read_generation(schema).await?;
    let fingerprint = CatalogFingerprint::compute(&info.banner, schema, &generation);
    tracing::info!(schema = %schema, fingerprint = %fingerprint, "starting full catalog build");

    // Stage 1: relations and columns (the cheap bulk).
    let metas = reader.read_tables(schema, None).await?;
    let columns = reader.read_columns(schema, None).await?;
    let mut tables = assemble_tables(metas, columns);
    let mut snapshot = CacheSnapshot {
        fingerprint,
        schema: schema.to_string(),
        generation: generation.clone(),
        tables: sorted_tables(&tables),
        plsql: Vec::new(),
        udts: Vec::new(),
        edges: Vec::new(),
    };
    tracing::info!(
        tables = snapshot.tables.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "build stage 1 complete (tables+columns)"
    );
    commit_stage(persister, &snapshot).await;

    // Stage 2: constraints.
    let constraints = reader.read_constraints(schema, None).await?;
    apply_constraints(schema, &mut tables, constraints);
    snapshot.tables = sorted_tables(&tables);
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "build stage 2 complete (constraints)"
    );
    commit_stage(persister, &snapshot).await;

    // Stage 3: indexes.
    let indexes = reader.read_indexes(schema, None).await?;
    apply_indexes(&mut tables, indexes);
    snapshot.tables = sorted_tables(&tables);
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "build stage 3 complete (indexes)"
    );
    commit_stage(persister, &snapshot).await;

    // Stage 4: dependency edges.
    snapshot.edges = reader.read_dependencies(schema, None).await?;
    tracing::info!(
        edges = snapshot.edges.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "build stage 4 complete (dependencies)"
    );
    commit_stage(persister, &snapshot).await;

    // Stage 5: PL/SQL inventory and user-defined types.
    snapshot.plsql = reader.read_objects(schema).await?;
    snapshot.udts = reader.read_types(schema).await?;
    tracing::info!(
        plsql = snapshot.plsql.len(),
        types = snapshot.udts.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "build stage 5 complete (plsql+types)"
    );
    commit_stage(persister, &snapshot).await;

    let stats = BuildStats {
        tables: snapshot.tables.len(),
        plsql_objects: snapshot.plsql.len(),
        types: snapshot.udts.len(),
        dependency_edges: snapshot.edges.len(),
        duration_ms: started.elapsed().as_millis() as u64,
        fingerprint: fingerprint.to_hex(),
    };
    Ok((snapshot, stats))
}

/// Assemble one table through the narrow catalog queries; the targeted
/// miss path. Returns `None` when the catalog has no such relation.
pub(crate) async fn load_one_table(
    reader: &dyn CatalogReader,
    cache_schema: &str,
    schema: &str,
    name: &str,
) -> Result<Option<TableRecord>> {
    let metas = reader.read_tables(schema, Some(name)).await?;
    if metas.is_empty() {
        return Ok(None);
    }
    let columns = reader.read_columns(schema, Some(name)).await?;
    let mut tables = assemble_tables(metas, columns);
    let constraints = reader.read_constraints(schema, Some(name)).await?;
    apply_constraints(cache_schema, &mut tables, constraints);
    let indexes = reader.read_indexes(schema, Some(name)).await?;
    apply_indexes(&mut tables, indexes);
    Ok(tables.remove(&name.to_ascii_uppercase()))
}
