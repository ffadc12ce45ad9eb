//! Schema cache behavior tests against an in-memory fake catalog

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use orascope_core::{
    CatalogGeneration, CatalogReader, ColumnMetaRow, ColumnRecord, ConstraintKind, ConstraintRow,
    ConstraintStatus, DependencyEdge, IndexColumn, IndexMetaRow, IndexRecord, ObjectKind,
    ObjectRef, PlsqlObject, ReferentialAction, Result, SessionInfo, SortOrder, TableKind,
    TableMetaRow, UserDefinedType,
};

use crate::persist::Persister;
use crate::store::SchemaCache;

// =============================================================================
// Fake catalog
// =============================================================================

#[derive(Default)]
struct FakeState {
    tables: Vec<TableMetaRow>,
    columns: Vec<ColumnMetaRow>,
    constraints: Vec<ConstraintRow>,
    indexes: Vec<IndexMetaRow>,
    objects: Vec<PlsqlObject>,
    sources: HashMap<(String, String), String>,
    deps: Vec<DependencyEdge>,
    types: Vec<UserDefinedType>,
    generation: u64,
}

/// In-memory stand-in for the data dictionary
#[derive(Default)]
struct FakeCatalog {
    state: Mutex<FakeState>,
    full_table_sweeps: AtomicUsize,
    dependency_reads: AtomicUsize,
}

impl FakeCatalog {
    fn with_hr_schema() -> Self {
        let catalog = Self::default();
        {
            let mut state = catalog.state.lock();
            state.generation = 1;

            add_table(
                &mut state,
                "DEPARTMENTS",
                &[("DEPT_ID", "NUMBER(10)", false), ("DEPT_NAME", "VARCHAR2(50 BYTE)", true)],
            );
            add_table(
                &mut state,
                "EMPLOYEES",
                &[
                    ("EMP_ID", "NUMBER", false),
                    ("FIRST_NAME", "VARCHAR2(50 BYTE)", true),
                    ("DEPT_ID", "NUMBER(10)", true),
                ],
            );
            add_table(&mut state, "ORDERS", &[("ORDER_ID", "NUMBER", false), ("CUSTOMER_ID", "NUMBER", true)]);
            add_table(&mut state, "INVOICES", &[("INVOICE_ID", "NUMBER", false), ("CUSTOMER_ID", "NUMBER", true)]);
            add_table(&mut state, "CUSTOMER", &[("ID", "NUMBER", false)]);
            add_table(&mut state, "CUSTOMERS", &[("ID", "NUMBER", false)]);
            add_table(&mut state, "CUSTOMER_ORDERS", &[("ID", "NUMBER", false)]);
            add_table(&mut state, "OLD_CUSTOMER", &[("ID", "NUMBER", false)]);

            state.constraints.push(ConstraintRow {
                table: "DEPARTMENTS".into(),
                name: "PK_DEPT".into(),
                kind: ConstraintKind::PrimaryKey,
                columns: vec!["DEPT_ID".into()],
                ref_schema: None,
                ref_table: None,
                ref_columns: Vec::new(),
                delete_rule: ReferentialAction::NoAction,
                deferrable: false,
                status: ConstraintStatus::Enabled,
                condition: None,
            });
            state.constraints.push(ConstraintRow {
                table: "EMPLOYEES".into(),
                name: "PK_EMP".into(),
                kind: ConstraintKind::PrimaryKey,
                columns: vec!["EMP_ID".into()],
                ref_schema: None,
                ref_table: None,
                ref_columns: Vec::new(),
                delete_rule: ReferentialAction::NoAction,
                deferrable: false,
                status: ConstraintStatus::Enabled,
                condition: None,
            });
            state.constraints.push(ConstraintRow {
                table: "EMPLOYEES".into(),
                name: "FK_DEPT".into(),
                kind: ConstraintKind::ForeignKey,
                columns: vec!["DEPT_ID".into()],
                ref_schema: Some("HR".into()),
                ref_table: Some("DEPARTMENTS".into()),
                ref_columns: vec!["DEPT_ID".into()],
                delete_rule: ReferentialAction::NoAction,
                deferrable: false,
                status: ConstraintStatus::Enabled,
                condition: None,
            });
            // A cross-schema edge that must stay flagged external.
            state.constraints.push(ConstraintRow {
                table: "ORDERS".into(),
                name: "FK_AUDIT".into(),
                kind: ConstraintKind::ForeignKey,
                columns: vec!["ORDER_ID".into()],
                ref_schema: Some("AUDIT".into()),
                ref_table: Some("ORDER_LOG".into()),
                ref_columns: vec!["ORDER_ID".into()],
                delete_rule: ReferentialAction::Cascade,
                deferrable: false,
                status: ConstraintStatus::Enabled,
                condition: None,
            });

            state.indexes.push(IndexMetaRow {
                table: "EMPLOYEES".into(),
                index: IndexRecord {
                    name: "IX_EMP_DEPT".into(),
                    unique: false,
                    columns: vec![IndexColumn {
                        name: "DEPT_ID".into(),
                        order: SortOrder::Asc,
                    }],
                    index_type: "NORMAL".into(),
                },
            });

            state.objects.push(PlsqlObject {
                schema: "HR".into(),
                name: "PAY_PKG".into(),
                kind: ObjectKind::Package,
                status: "VALID".into(),
                last_ddl: None,
                source_available: true,
            });
            state.objects.push(PlsqlObject {
                schema: "HR".into(),
                name: "PAY_PKG".into(),
                kind: ObjectKind::PackageBody,
                status: "VALID".into(),
                last_ddl: None,
                source_available: true,
            });
            state.objects.push(PlsqlObject {
                schema: "HR".into(),
                name: "EMP_SEQ".into(),
                kind: ObjectKind::Sequence,
                status: "VALID".into(),
                last_ddl: None,
                source_available: false,
            });
            state
                .sources
                .insert(("PAY_PKG".into(), "PACKAGE".into()), "PACKAGE pay_pkg IS END;".into());

            state.deps.push(DependencyEdge {
                referrer: ObjectRef::new("HR", "PAY_PKG", ObjectKind::Package),
                referenced: ObjectRef::new("HR", "EMPLOYEES", ObjectKind::Table),
            });

            state.types.push(UserDefinedType {
                schema: "HR".into(),
                name: "ADDRESS_T".into(),
                typecode: orascope_core::TypeCode::Object,
                attributes: Vec::new(),
            });
        }
        catalog
    }

    fn add_column(&self, table: &str, name: &str, data_type: &str) {
        let mut state = self.state.lock();
        let position = state
            .columns
            .iter()
            .filter(|c| c.table == table)
            .count() as u32
            + 1;
        state.columns.push(ColumnMetaRow {
            table: table.into(),
            column: ColumnRecord {
                name: name.into(),
                position,
                data_type: data_type.into(),
                nullable: true,
                default_expr: None,
                comment: None,
            },
        });
        state.generation += 1;
    }

    fn drop_table(&self, table: &str) {
        let mut state = self.state.lock();
        state.tables.retain(|t| t.name != table);
        state.columns.retain(|c| c.table != table);
        state.constraints.retain(|c| c.table != table);
        state.indexes.retain(|i| i.table != table);
        state.generation += 1;
    }
}

fn add_table(state: &mut FakeState, name: &str, columns: &[(&str, &str, bool)]) {
    state.tables.push(TableMetaRow {
        schema: "HR".into(),
        name: name.into(),
        kind: TableKind::Table,
        comment: None,
        last_ddl: None,
    });
    for (i, (col, data_type, nullable)) in columns.iter().enumerate() {
        state.columns.push(ColumnMetaRow {
            table: name.into(),
            column: ColumnRecord {
                name: (*col).into(),
                position: (i + 1) as u32,
                data_type: (*data_type).into(),
                nullable: *nullable,
                default_expr: None,
                comment: None,
            },
        });
    }
}

#[async_trait]
impl CatalogReader for FakeCatalog {
    async fn read_tables(&self, schema: &str, table: Option<&str>) -> Result<Vec<TableMetaRow>> {
        if table.is_none() {
            self.full_table_sweeps.fetch_add(1, Ordering::SeqCst);
        }
        Ok(self
            .state
            .lock()
            .tables
            .iter()
            .filter(|t| t.schema == schema && table.is_none_or(|n| t.name == n))
            .cloned()
            .collect())
    }

    async fn read_columns(
        &self,
        _schema: &str,
        table: Option<&str>,
    ) -> Result<Vec<ColumnMetaRow>> {
        Ok(self
            .state
            .lock()
            .columns
            .iter()
            .filter(|c| table.is_none_or(|n| c.table == n))
            .cloned()
            .collect())
    }

    async fn read_constraints(
        &self,
        _schema: &str,
        table: Option<&str>,
    ) -> Result<Vec<ConstraintRow>> {
        Ok(self
            .state
            .lock()
            .constraints
            .iter()
            .filter(|c| table.is_none_or(|n| c.table == n))
            .cloned()
            .collect())
    }

    async fn read_indexes(
        &self,
        _schema: &str,
        table: Option<&str>,
    ) -> Result<Vec<IndexMetaRow>> {
        Ok(self
            .state
            .lock()
            .indexes
            .iter()
            .filter(|i| table.is_none_or(|n| i.table == n))
            .cloned()
            .collect())
    }

    async fn read_objects(&self, schema: &str) -> Result<Vec<PlsqlObject>> {
        Ok(self
            .state
            .lock()
            .objects
            .iter()
            .filter(|o| o.schema == schema)
            .cloned()
            .collect())
    }

    async fn read_source(
        &self,
        _schema: &str,
        name: &str,
        kind: &ObjectKind,
    ) -> Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .sources
            .get(&(name.to_string(), kind.as_str().to_string()))
            .cloned())
    }

    async fn read_dependencies(
        &self,
        _schema: &str,
        name: Option<&str>,
    ) -> Result<Vec<DependencyEdge>> {
        self.dependency_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .state
            .lock()
            .deps
            .iter()
            .filter(|e| {
                name.is_none_or(|n| e.referrer.name == n || e.referenced.name == n)
            })
            .cloned()
            .collect())
    }

    async fn read_types(&self, schema: &str) -> Result<Vec<UserDefinedType>> {
        Ok(self
            .state
            .lock()
            .types
            .iter()
            .filter(|t| t.schema == schema)
            .cloned()
            .collect())
    }

    async fn read_generation(&self, _schema: &str) -> Result<CatalogGeneration> {
        let state = self.state.lock();
        Ok(CatalogGeneration {
            max_last_ddl: Some(format!("2026-01-01 00:00:{:02}", state.generation % 60)),
            object_count: state.tables.len() as u64 + state.generation,
        })
    }

    async fn session_info(&self) -> Result<SessionInfo> {
        Ok(SessionInfo {
            banner: "Oracle Database 19c Enterprise Edition (fake)".into(),
            current_schema: "HR".into(),
            nls_comp: Some("BINARY".into()),
            nls_sort: Some("BINARY".into()),
        })
    }
}

fn new_cache(catalog: &Arc<FakeCatalog>, dir: &std::path::Path) -> SchemaCache {
    SchemaCache::new(
        Arc::clone(catalog) as Arc<dyn CatalogReader>,
        "HR",
        Arc::new(Persister::new(dir).unwrap()),
    )
}

// =============================================================================
// Lookup and indexes
// =============================================================================

#[tokio::test]
async fn rebuild_then_exact_lookup() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());

    let stats = cache.rebuild().await.unwrap();
    assert_eq!(stats.tables, 8);
    assert_eq!(stats.plsql_objects, 3);

    let table = cache.get_table("employees").await.unwrap();
    assert_eq!(table.schema, "HR");
    assert_eq!(table.name, "EMPLOYEES");
    assert_eq!(table.columns.len(), 3);
    assert_eq!(table.primary_key, Some(vec!["EMP_ID".to_string()]));
    assert_eq!(table.foreign_keys.len(), 1);
    assert_eq!(table.foreign_keys[0].target_table, "DEPARTMENTS");
    assert!(!table.foreign_keys[0].external);
    assert_eq!(table.indexes.len(), 1);
}

#[tokio::test]
async fn case_insensitive_identity() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());
    cache.rebuild().await.unwrap();

    let lower = cache.get_table("employees").await.unwrap();
    let upper = cache.get_table("EMPLOYEES").await.unwrap();
    let mixed = cache.get_table("hr.Employees").await.unwrap();
    assert_eq!(lower, upper);
    assert_eq!(lower, mixed);
}

#[tokio::test]
async fn batched_lookup_matches_single_lookup() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());
    cache.rebuild().await.unwrap();

    let names = vec![
        "employees".to_string(),
        "departments".to_string(),
        "no_such_table".to_string(),
    ];
    let batched = cache.get_tables(&names).await;
    assert_eq!(batched.len(), 3);
    // Input order preserved.
    assert_eq!(batched[0].0, "employees");
    assert_eq!(
        batched[0].1.as_ref().unwrap(),
        &cache.get_table("employees").await.unwrap()
    );
    assert_eq!(
        batched[1].1.as_ref().unwrap(),
        &cache.get_table("departments").await.unwrap()
    );
    assert_eq!(batched[2].1.as_ref().unwrap_err().code(), "not_found");
}

#[tokio::test]
async fn miss_triggers_targeted_load_not_full_build() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());
    cache.initialize().await.unwrap();
    assert_eq!(cache.table_count(), 0);

    let table = cache.get_table("employees").await.unwrap();
    assert_eq!(table.columns.len(), 3);
    assert_eq!(
        catalog.full_table_sweeps.load(Ordering::SeqCst),
        0,
        "a miss must never run the full sweep"
    );
    // Second read is served from memory.
    cache.get_table("employees").await.unwrap();
    assert_eq!(cache.table_count(), 1);
}

#[tokio::test]
async fn unknown_table_is_not_found() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());
    cache.initialize().await.unwrap();

    let err = cache.get_table("ghost").await.unwrap_err();
    assert_eq!(err.code(), "not_found");
    let err = cache.get_table("").await.unwrap_err();
    assert_eq!(err.code(), "invalid_argument");
}

// =============================================================================
// Search
// =============================================================================

#[tokio::test]
async fn search_tables_tier_ordering() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());
    cache.rebuild().await.unwrap();

    let results = cache.search_tables("customer", Some(10)).await.unwrap();
    let names: Vec<&str> = results.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["CUSTOMER", "CUSTOMERS", "CUSTOMER_ORDERS", "OLD_CUSTOMER"]
    );
}

#[tokio::test]
async fn search_limits_are_clamped() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());
    cache.rebuild().await.unwrap();

    assert_eq!(
        cache.search_tables("customer", Some(2)).await.unwrap().len(),
        2
    );
    // Oversized limits cap at 500, they do not error.
    assert!(
        cache
            .search_tables("customer", Some(100_000))
            .await
            .unwrap()
            .len()
            <= 500
    );
    let err = cache.search_tables("customer", Some(0)).await.unwrap_err();
    assert_eq!(err.code(), "invalid_argument");
    let err = cache.search_tables("", None).await.unwrap_err();
    assert_eq!(err.code(), "invalid_argument");
}

#[tokio::test]
async fn search_columns_finds_all_carriers() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());
    cache.rebuild().await.unwrap();

    let hits = cache.search_columns("customer_id", None).await.unwrap();
    let pairs: Vec<(&str, &str)> = hits
        .iter()
        .map(|h| (h.table.as_str(), h.column.as_str()))
        .collect();
    assert!(pairs.contains(&("ORDERS", "CUSTOMER_ID")));
    assert!(pairs.contains(&("INVOICES", "CUSTOMER_ID")));
    assert!(hits.iter().all(|h| h.data_type == "NUMBER"));
}

#[tokio::test]
async fn column_index_covers_every_column() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());
    cache.rebuild().await.unwrap();

    for name in ["EMPLOYEES", "DEPARTMENTS", "ORDERS", "INVOICES"] {
        let table = cache.get_table(name).await.unwrap();
        for column in &table.columns {
            let hits = cache.search_columns(&column.name, Some(500)).await.unwrap();
            assert!(
                hits.iter()
                    .any(|h| h.schema == table.schema && h.table == table.name),
                "ByColumn must cover {}.{}",
                table.name,
                column.name
            );
        }
    }
}

// =============================================================================
// Foreign keys and relationships
// =============================================================================

#[tokio::test]
async fn foreign_keys_resolve_or_are_external() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());
    cache.rebuild().await.unwrap();

    for name in ["EMPLOYEES", "ORDERS"] {
        let table = cache.get_table(name).await.unwrap();
        for fk in &table.foreign_keys {
            let resolved = cache
                .get_table(&format!("{}.{}", fk.target_schema, fk.target_table))
                .await
                .is_ok();
            assert!(
                resolved || fk.external,
                "fk {} neither resolves nor is external",
                fk.name
            );
        }
    }

    let orders = cache.get_table("orders").await.unwrap();
    assert!(orders.foreign_keys[0].external);
}

#[tokio::test]
async fn related_tables_walks_both_directions() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());
    cache.rebuild().await.unwrap();

    let related = cache.get_related_tables("departments").await.unwrap();
    assert!(related.outgoing.is_empty());
    assert_eq!(related.incoming.len(), 1);
    assert_eq!(related.incoming[0].schema, "HR");
    assert_eq!(related.incoming[0].name, "EMPLOYEES");
    assert_eq!(related.incoming[0].via, "DEPT_ID");

    let related = cache.get_related_tables("employees").await.unwrap();
    assert_eq!(related.outgoing.len(), 1);
    assert_eq!(related.outgoing[0].name, "DEPARTMENTS");
}

// =============================================================================
// PL/SQL objects, source, dependents, types
// =============================================================================

#[tokio::test]
async fn plsql_inventory_filters_by_pattern_and_kind() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());
    cache.initialize().await.unwrap();

    let all = cache.get_plsql_objects("%", &[]).await.unwrap();
    assert_eq!(all.len(), 3);

    let packages = cache
        .get_plsql_objects("PAY%", &[ObjectKind::Package])
        .await
        .unwrap();
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].name, "PAY_PKG");
}

#[tokio::test]
async fn object_source_resolves_kind_and_caches() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());
    cache.initialize().await.unwrap();

    let source = cache
        .get_object_source(None, "pay_pkg", None)
        .await
        .unwrap();
    assert!(source.contains("pay_pkg"));

    // Sequences carry no source.
    let err = cache
        .get_object_source(None, "emp_seq", None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not_found");

    let err = cache
        .get_object_source(None, "ghost", Some(ObjectKind::Procedure))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn dependents_are_fetched_once_then_cached() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());
    cache.initialize().await.unwrap();

    let dependents = cache
        .get_dependents(None, "employees", None)
        .await
        .unwrap();
    assert_eq!(dependents.len(), 1);
    assert_eq!(dependents[0].name, "PAY_PKG");
    let reads = catalog.dependency_reads.load(Ordering::SeqCst);

    cache.get_dependents(None, "employees", None).await.unwrap();
    assert_eq!(
        catalog.dependency_reads.load(Ordering::SeqCst),
        reads,
        "second ask must hit the cached graph"
    );

    // A full build covers every edge; no further narrow reads either.
    cache.rebuild().await.unwrap();
    cache.get_dependents(None, "departments", None).await.unwrap();
}

#[tokio::test]
async fn user_defined_types_filter() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());
    cache.initialize().await.unwrap();

    assert_eq!(cache.get_user_defined_types(None).await.unwrap().len(), 1);
    assert_eq!(
        cache
            .get_user_defined_types(Some("ADDR%"))
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(
        cache
            .get_user_defined_types(Some("NOPE%"))
            .await
            .unwrap()
            .is_empty()
    );
}

// =============================================================================
// Invalidation and staleness
// =============================================================================

#[tokio::test]
async fn invalidated_table_refetches_on_next_read() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());
    cache.rebuild().await.unwrap();

    catalog.add_column("EMPLOYEES", "EMAIL", "VARCHAR2(100 BYTE)");

    // Staleness is bounded, not zero: without invalidation the old shape
    // is still served.
    assert_eq!(cache.get_table("employees").await.unwrap().columns.len(), 3);

    cache.invalidate(&ObjectRef::new("HR", "EMPLOYEES", ObjectKind::Table));
    let table = cache.get_table("employees").await.unwrap();
    assert_eq!(table.columns.len(), 4);
    assert!(table.column("EMAIL").is_some());
    // Positions stay dense after the merge.
    let positions: Vec<u32> = table.columns.iter().map(|c| c.position).collect();
    assert_eq!(positions, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn dropped_table_disappears_after_invalidation() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());
    cache.rebuild().await.unwrap();

    catalog.drop_table("ORDERS");
    cache.invalidate(&ObjectRef::new("HR", "ORDERS", ObjectKind::Table));

    let err = cache.get_table("orders").await.unwrap_err();
    assert_eq!(err.code(), "not_found");
    // The name index no longer surfaces it.
    let names: Vec<String> = cache
        .search_tables("orders", Some(50))
        .await
        .unwrap()
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert!(!names.contains(&"ORDERS".to_string()));
}

#[tokio::test]
async fn schema_wide_invalidation_marks_everything_stale() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());
    cache.rebuild().await.unwrap();

    catalog.add_column("DEPARTMENTS", "LOCATION", "VARCHAR2(50 BYTE)");
    cache.invalidate_schema();

    let table = cache.get_table("departments").await.unwrap();
    assert!(table.column("LOCATION").is_some());
}

#[tokio::test]
async fn generation_probe_detects_catalog_movement() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());
    cache.rebuild().await.unwrap();

    assert!(!cache.check_generation().await.unwrap());
    catalog.add_column("EMPLOYEES", "EMAIL", "VARCHAR2(100 BYTE)");
    assert!(cache.check_generation().await.unwrap());
}

// =============================================================================
// Persistence round-trips
// =============================================================================

#[tokio::test]
async fn rebuild_persists_and_reloads_identically() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();

    let cache = new_cache(&catalog, dir.path());
    cache.rebuild().await.unwrap();
    cache.persist_now().await.unwrap();
    let employees_before = cache.get_table("employees").await.unwrap();
    let count_before = cache.table_count();

    // A fresh process over the same cache directory warm-loads from disk.
    let reloaded = new_cache(&catalog, dir.path());
    let loaded = reloaded.initialize().await.unwrap();
    assert!(loaded, "matching fingerprint must load from disk");
    assert_eq!(reloaded.table_count(), count_before);
    assert_eq!(
        reloaded.get_table("employees").await.unwrap(),
        employees_before
    );
    assert_eq!(reloaded.fingerprint(), cache.fingerprint());

    // Search indexes are rebuilt from the loaded records.
    let names: Vec<String> = reloaded
        .search_tables("customer", Some(10))
        .await
        .unwrap()
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert_eq!(names[0], "CUSTOMER");
}

#[tokio::test]
async fn changed_catalog_generation_misses_old_cache_file() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();

    let cache = new_cache(&catalog, dir.path());
    cache.rebuild().await.unwrap();
    cache.persist_now().await.unwrap();

    // DDL elsewhere bumps the generation; the fingerprint no longer
    // matches and startup goes cold instead of serving the stale file.
    catalog.add_column("EMPLOYEES", "EMAIL", "VARCHAR2(100 BYTE)");
    let fresh = new_cache(&catalog, dir.path());
    assert!(!fresh.initialize().await.unwrap());
    assert_eq!(fresh.table_count(), 0);
}

#[tokio::test]
async fn rebuild_is_fingerprint_idempotent() {
    let catalog = Arc::new(FakeCatalog::with_hr_schema());
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&catalog, dir.path());

    let first = cache.rebuild().await.unwrap();
    let second = cache.rebuild().await.unwrap();
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(first.tables, second.tables);
}
