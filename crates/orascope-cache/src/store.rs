//! The schema cache store
//!
//! Readers-writer discipline: many concurrent readers over the in-memory
//! snapshot, one writer for structural updates. A miss triggers the narrow
//! targeted load, merges under the write lock, and schedules an async disk
//! persist; it never triggers a full build.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use orascope_core::{
    CatalogGeneration, CatalogReader, CheckRecord, ForeignKeyRecord, IndexRecord, ObjectKind,
    ObjectRef, OrascopeError, PlsqlObject, QualifiedName, Result, TableRecord, UserDefinedType,
    table_key,
};

use crate::builder::{self, BuildStats, CacheSnapshot};
use crate::column_index::ColumnIndex;
use crate::fingerprint::CatalogFingerprint;
use crate::graph::DependencyGraph;
use crate::name_index::{NameIndex, SearchPattern};
use crate::persist::Persister;

/// Default number of results for list-returning operations
pub const DEFAULT_LIMIT: usize = 50;
/// Hard cap on `limit` for list-returning operations
pub const MAX_LIMIT: usize = 500;

/// One row of a column search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHit {
    pub schema: String,
    pub table: String,
    pub column: String,
    pub data_type: String,
}

/// One side of a foreign-key relationship
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedRef {
    pub schema: String,
    pub name: String,
    /// The local column list the relationship travels through
    pub via: String,
}

/// Foreign-key neighborhood of a table, one hop in each direction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelatedTables {
    pub incoming: Vec<RelatedRef>,
    pub outgoing: Vec<RelatedRef>,
}

/// Constraint bundle of one table
#[derive(Debug, Clone, PartialEq)]
pub struct TableConstraints {
    pub schema: String,
    pub table: String,
    pub primary_key: Option<Vec<String>>,
    pub unique_keys: Vec<Vec<String>>,
    pub foreign_keys: Vec<ForeignKeyRecord>,
    pub check_constraints: Vec<CheckRecord>,
}

#[derive(Debug, Clone)]
struct IncomingFk {
    from_schema: String,
    from_name: String,
    via: Vec<String>,
}

#[derive(Default)]
struct CacheInner {
    fingerprint: Option<CatalogFingerprint>,
    generation: CatalogGeneration,
    tables: HashMap<String, TableRecord>,
    /// Target-schema table names only; pattern search scope
    name_index: NameIndex,
    column_index: ColumnIndex,
    /// `target key -> foreign keys pointing at it`
    fk_reverse: HashMap<String, Vec<IncomingFk>>,
    graph: DependencyGraph,
    /// Keys whose dependency edges were fetched individually
    deps_loaded: HashSet<String>,
    /// A full build loaded every edge of the schema
    deps_full: bool,
    plsql: Vec<PlsqlObject>,
    plsql_loaded: bool,
    udts: Vec<UserDefinedType>,
    udts_loaded: bool,
    /// `(SCHEMA, NAME, kind string) -> source text`
    sources: HashMap<(String, String, String), String>,
    /// Table keys marked stale by invalidation; next read refetches
    stale: HashSet<String>,
}

/// The persistent, incrementally built index of the target schema
pub struct SchemaCache {
    reader: Arc<dyn CatalogReader>,
    persister: Arc<Persister>,
    target_schema: String,
    inner: RwLock<CacheInner>,
    build_lock: tokio::sync::Mutex<()>,
}

impl SchemaCache {
    pub fn new(
        reader: Arc<dyn CatalogReader>,
        target_schema: impl Into<String>,
        persister: Arc<Persister>,
    ) -> Self {
        Self {
            reader,
            persister,
            target_schema: target_schema.into().to_ascii_uppercase(),
            inner: RwLock::new(CacheInner::default()),
            build_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn target_schema(&self) -> &str {
        &self.target_schema
    }

    pub fn table_count(&self) -> usize {
        self.inner.read().tables.len()
    }

    pub fn fingerprint(&self) -> Option<CatalogFingerprint> {
        self.inner.read().fingerprint
    }

    /// Compute the current catalog fingerprint and warm-load the matching
    /// cache file if one exists. Returns whether a file was loaded.
    pub async fn initialize(&self) -> Result<bool> {
        let info = self.reader.session_info().await?;
        let generation = self.reader.read_generation(&self.target_schema).await?;
        let fingerprint =
            CatalogFingerprint::compute(&info.banner, &self.target_schema, &generation);

        match self.persister.load(&fingerprint).await? {
            Some(snapshot) => {
                let tables = snapshot.tables.len();
                self.install_snapshot(snapshot);
                tracing::info!(
                    fingerprint = %fingerprint,
                    tables,
                    "loaded schema cache from disk"
                );
                Ok(true)
            }
            None => {
                let mut inner = self.inner.write();
                inner.fingerprint = Some(fingerprint);
                inner.generation = generation;
                tracing::info!(
                    fingerprint = %fingerprint,
                    "no usable cache file on disk, starting cold"
                );
                Ok(false)
            }
        }
    }

    /// Force a full recomputation. Readers keep seeing the prior snapshot
    /// until the new one commits; concurrent rebuilds are serialized.
    pub async fn rebuild(&self) -> Result<BuildStats> {
        let _guard = self.build_lock.lock().await;

        let (snapshot, stats) = builder::full_build(
            self.reader.as_ref(),
            &self.target_schema,
            Some(&self.persister),
        )
        .await?;

        self.install_snapshot(snapshot);
        tracing::info!(
            tables = stats.tables,
            plsql = stats.plsql_objects,
            duration_ms = stats.duration_ms,
            "schema cache rebuilt"
        );
        Ok(stats)
    }

    /// Probe `MAX(LAST_DDL_TIME)`; returns whether the live catalog moved
    /// past the cached generation.
    pub async fn check_generation(&self) -> Result<bool> {
        let generation = self.reader.read_generation(&self.target_schema).await?;
        Ok(generation != self.inner.read().generation)
    }

    // ========== Lookup ==========

    /// Case-insensitive lookup, `schema.name` qualified form accepted.
    pub async fn get_table(&self, raw: &str) -> Result<TableRecord> {
        let qualified = QualifiedName::parse(raw)?;
        let schema = qualified.schema_or(&self.target_schema).to_string();
        let key = table_key(&schema, &qualified.name);

        {
            let inner = self.inner.read();
            if !inner.stale.contains(&key) {
                if let Some(record) = inner.tables.get(&key) {
                    return Ok(record.clone());
                }
            }
        }

        tracing::debug!(table = %key, "cache miss, targeted catalog load");
        match builder::load_one_table(
            self.reader.as_ref(),
            &self.target_schema,
            &schema,
            &qualified.name,
        )
        .await?
        {
            Some(record) => {
                self.merge_table(record.clone());
                self.schedule_persist();
                Ok(record)
            }
            None => {
                // A stale entry that no longer exists in the catalog.
                if self.remove_table(&key) {
                    self.schedule_persist();
                }
                Err(OrascopeError::NotFound(format!(
                    "table or view {key} does not exist"
                )))
            }
        }
    }

    /// Batched lookup; input order is preserved in the output.
    pub async fn get_tables(&self, names: &[String]) -> Vec<(String, Result<TableRecord>)> {
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            out.push((name.clone(), self.get_table(name).await));
        }
        out
    }

    /// Tiered pattern search over target-schema table names.
    pub async fn search_tables(
        &self,
        pattern: &str,
        limit: Option<usize>,
    ) -> Result<Vec<TableRecord>> {
        let limit = clamp_limit(limit)?;
        let pattern = SearchPattern::parse(pattern)?;
        let inner = self.inner.read();
        let names = inner.name_index.search(&pattern, limit);
        Ok(names
            .iter()
            .filter_map(|name| inner.tables.get(&table_key(&self.target_schema, name)))
            .cloned()
            .collect())
    }

    /// Pattern search over column names across all cached tables.
    pub async fn search_columns(
        &self,
        fragment: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ColumnHit>> {
        let limit = clamp_limit(limit)?;
        let pattern = SearchPattern::parse(fragment)?;
        let inner = self.inner.read();
        Ok(inner
            .column_index
            .search(&pattern, limit)
            .into_iter()
            .map(|(schema, table, column)| {
                let data_type = inner
                    .tables
                    .get(&table_key(&schema, &table))
                    .and_then(|t| t.column(&column))
                    .map(|c| c.data_type.clone())
                    .unwrap_or_default();
                ColumnHit {
                    schema,
                    table,
                    column,
                    data_type,
                }
            })
            .collect())
    }

    pub async fn get_constraints(&self, name: &str) -> Result<TableConstraints> {
        let record = self.get_table(name).await?;
        Ok(TableConstraints {
            schema: record.schema,
            table: record.name,
            primary_key: record.primary_key,
            unique_keys: record.unique_keys,
            foreign_keys: record.foreign_keys,
            check_constraints: record.check_constraints,
        })
    }

    pub async fn get_indexes(&self, name: &str) -> Result<Vec<IndexRecord>> {
        Ok(self.get_table(name).await?.indexes)
    }

    /// Walk the foreign-key graph one hop in each direction.
    pub async fn get_related_tables(&self, name: &str) -> Result<RelatedTables> {
        let record = self.get_table(name).await?;
        let key = record.key();

        let mut outgoing: Vec<RelatedRef> = record
            .foreign_keys
            .iter()
            .map(|fk| RelatedRef {
                schema: fk.target_schema.clone(),
                name: fk.target_table.clone(),
                via: fk.local_columns.join(", "),
            })
            .collect();
        outgoing.sort_by(|a, b| (&a.schema, &a.name).cmp(&(&b.schema, &b.name)));

        let inner = self.inner.read();
        let mut incoming: Vec<RelatedRef> = inner
            .fk_reverse
            .get(&key)
            .map(|edges| {
                edges
                    .iter()
                    .map(|edge| RelatedRef {
                        schema: edge.from_schema.clone(),
                        name: edge.from_name.clone(),
                        via: edge.via.join(", "),
                    })
                    .collect()
            })
            .unwrap_or_default();
        incoming.sort_by(|a, b| (&a.schema, &a.name).cmp(&(&b.schema, &b.name)));

        Ok(RelatedTables { incoming, outgoing })
    }

    // ========== PL/SQL inventory ==========

    /// Pattern-filtered PL/SQL inventory, optionally narrowed by kind.
    pub async fn get_plsql_objects(
        &self,
        name_pattern: &str,
        kinds: &[ObjectKind],
    ) -> Result<Vec<PlsqlObject>> {
        self.ensure_plsql_loaded().await?;
        let pattern = SearchPattern::parse(name_pattern)?;
        let inner = self.inner.read();
        let mut objects: Vec<PlsqlObject> = inner
            .plsql
            .iter()
            .filter(|o| pattern.matches(&o.name.to_ascii_uppercase()))
            .filter(|o| kinds.is_empty() || kinds.contains(&o.kind))
            .cloned()
            .collect();
        objects.sort_by(|a, b| {
            (&a.name, a.kind.as_str()).cmp(&(&b.name, b.kind.as_str()))
        });
        Ok(objects)
    }

    /// Stored source of one object, cached after the first fetch.
    pub async fn get_object_source(
        &self,
        schema: Option<&str>,
        name: &str,
        kind: Option<ObjectKind>,
    ) -> Result<String> {
        let schema = schema
            .unwrap_or(&self.target_schema)
            .to_ascii_uppercase();
        let name = name.to_ascii_uppercase();
        let kind = match kind {
            Some(kind) => kind,
            None => self.resolve_source_kind(&schema, &name).await?,
        };
        let cache_key = (schema.clone(), name.clone(), kind.as_str().to_string());

        if let Some(source) = self.inner.read().sources.get(&cache_key) {
            return Ok(source.clone());
        }

        let source = self
            .reader
            .read_source(&schema, &name, &kind)
            .await?
            .ok_or_else(|| {
                OrascopeError::NotFound(format!("no source for {kind} {schema}.{name}"))
            })?;
        self.inner
            .write()
            .sources
            .insert(cache_key, source.clone());
        Ok(source)
    }

    /// Pick the kind to fetch source for when the caller did not say:
    /// the inventory entry for the name that actually has source.
    async fn resolve_source_kind(&self, schema: &str, name: &str) -> Result<ObjectKind> {
        self.ensure_plsql_loaded().await?;
        let inner = self.inner.read();
        inner
            .plsql
            .iter()
            .filter(|o| o.schema.eq_ignore_ascii_case(schema) && o.name == name)
            .filter(|o| o.source_available)
            .map(|o| o.kind.clone())
            .next()
            .ok_or_else(|| {
                OrascopeError::NotFound(format!("object {schema}.{name} not found"))
            })
    }

    /// Direct dependents of an object; fetched from the catalog on first
    /// ask and cached in the dependency graph.
    pub async fn get_dependents(
        &self,
        schema: Option<&str>,
        name: &str,
        kind: Option<ObjectKind>,
    ) -> Result<Vec<ObjectRef>> {
        let schema = schema
            .unwrap_or(&self.target_schema)
            .to_ascii_uppercase();
        let name = name.to_ascii_uppercase();
        let key = table_key(&schema, &name);

        let cached = {
            let inner = self.inner.read();
            inner.deps_full || inner.deps_loaded.contains(&key)
        };
        if !cached {
            let edges = self.reader.read_dependencies(&schema, Some(&name)).await?;
            let mut inner = self.inner.write();
            for edge in edges {
                inner.graph.add_edge(edge);
            }
            inner.deps_loaded.insert(key);
        }

        Ok(self
            .inner
            .read()
            .graph
            .dependents_of(&schema, &name, kind.as_ref()))
    }

    /// User-defined types, optionally filtered by a name pattern.
    pub async fn get_user_defined_types(
        &self,
        pattern: Option<&str>,
    ) -> Result<Vec<UserDefinedType>> {
        self.ensure_udts_loaded().await?;
        let pattern = pattern.map(SearchPattern::parse).transpose()?;
        let inner = self.inner.read();
        let mut types: Vec<UserDefinedType> = inner
            .udts
            .iter()
            .filter(|u| {
                pattern
                    .as_ref()
                    .is_none_or(|p| p.matches(&u.name.to_ascii_uppercase()))
            })
            .cloned()
            .collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    // ========== Invalidation ==========

    /// Mark one object stale; the next read refetches it.
    pub fn invalidate(&self, object: &ObjectRef) {
        let key = object.qualified_key();
        tracing::info!(object = %key, kind = %object.kind, "invalidating cache entry");
        let mut inner = self.inner.write();
        match object.kind {
            ObjectKind::Table | ObjectKind::View | ObjectKind::MaterializedView => {
                inner.stale.insert(key.clone());
                inner.deps_loaded.remove(&key);
            }
            _ => {
                // Non-relation DDL moved the PL/SQL inventory.
                inner.plsql_loaded = false;
                if matches!(object.kind, ObjectKind::Type | ObjectKind::TypeBody) {
                    inner.udts_loaded = false;
                }
                inner.deps_loaded.remove(&key);
            }
        }
        inner
            .sources
            .retain(|(s, n, _), _| !(s == &object.schema.to_ascii_uppercase() && n == &object.name.to_ascii_uppercase()));
    }

    /// Conservative whole-schema invalidation: every entry refetches on its
    /// next read.
    pub fn invalidate_schema(&self) {
        tracing::info!(schema = %self.target_schema, "invalidating entire schema scope");
        let mut inner = self.inner.write();
        let keys: Vec<String> = inner.tables.keys().cloned().collect();
        inner.stale.extend(keys);
        inner.plsql_loaded = false;
        inner.udts_loaded = false;
        inner.deps_full = false;
        inner.deps_loaded.clear();
        inner.sources.clear();
    }

    // ========== Internals ==========

    async fn ensure_plsql_loaded(&self) -> Result<()> {
        if self.inner.read().plsql_loaded {
            return Ok(());
        }
        let objects = self.reader.read_objects(&self.target_schema).await?;
        let mut inner = self.inner.write();
        tracing::debug!(objects = objects.len(), "loaded PL/SQL inventory");
        inner.plsql = objects;
        inner.plsql_loaded = true;
        Ok(())
    }

    async fn ensure_udts_loaded(&self) -> Result<()> {
        if self.inner.read().udts_loaded {
            return Ok(());
        }
        let types = self.reader.read_types(&self.target_schema).await?;
        let mut inner = self.inner.write();
        inner.udts = types;
        inner.udts_loaded = true;
        Ok(())
    }

    /// Merge one freshly loaded table under the write lock.
    fn merge_table(&self, record: TableRecord) {
        let key = record.key();
        let mut inner = self.inner.write();

        if let Some(old) = inner.tables.remove(&key) {
            inner.column_index.remove_table(&old);
            remove_reverse_fks(&mut inner.fk_reverse, &old);
        }

        inner.column_index.add_table(&record);
        if record.schema.eq_ignore_ascii_case(&self.target_schema) {
            inner.name_index.insert(&record.name);
        }
        add_reverse_fks(&mut inner.fk_reverse, &record);
        inner.stale.remove(&key);
        inner.tables.insert(key, record);
    }

    /// Drop a table and its index entries. Returns whether it existed.
    fn remove_table(&self, key: &str) -> bool {
        let mut inner = self.inner.write();
        inner.stale.remove(key);
        match inner.tables.remove(key) {
            Some(old) => {
                inner.column_index.remove_table(&old);
                remove_reverse_fks(&mut inner.fk_reverse, &old);
                if old.schema.eq_ignore_ascii_case(&self.target_schema) {
                    inner.name_index.remove(&old.name);
                }
                true
            }
            None => false,
        }
    }

    /// Swap in a complete snapshot (full build or disk load).
    fn install_snapshot(&self, snapshot: CacheSnapshot) {
        let mut tables = HashMap::with_capacity(snapshot.tables.len());
        let mut name_index = NameIndex::new();
        let mut column_index = ColumnIndex::new();
        let mut fk_reverse: HashMap<String, Vec<IncomingFk>> = HashMap::new();

        for record in snapshot.tables {
            if record.schema.eq_ignore_ascii_case(&self.target_schema) {
                name_index.insert(&record.name);
            }
            column_index.add_table(&record);
            add_reverse_fks(&mut fk_reverse, &record);
            tables.insert(record.key(), record);
        }

        let fresh = CacheInner {
            fingerprint: Some(snapshot.fingerprint),
            generation: snapshot.generation,
            tables,
            name_index,
            column_index,
            fk_reverse,
            graph: DependencyGraph::from_edges(snapshot.edges),
            deps_loaded: HashSet::new(),
            deps_full: true,
            plsql: snapshot.plsql,
            plsql_loaded: true,
            udts: snapshot.udts,
            udts_loaded: true,
            sources: HashMap::new(),
            stale: HashSet::new(),
        };
        *self.inner.write() = fresh;
    }

    fn make_snapshot(&self) -> Option<CacheSnapshot> {
        let inner = self.inner.read();
        let fingerprint = inner.fingerprint?;
        let mut tables: Vec<TableRecord> = inner.tables.values().cloned().collect();
        tables.sort_by_key(TableRecord::key);
        Some(CacheSnapshot {
            fingerprint,
            schema: self.target_schema.clone(),
            generation: inner.generation.clone(),
            tables,
            plsql: inner.plsql.clone(),
            udts: inner.udts.clone(),
            edges: inner.graph.edges().to_vec(),
        })
    }

    /// Persist the current state and wait for the write to land.
    pub async fn persist_now(&self) -> Result<()> {
        match self.make_snapshot() {
            Some(snapshot) => self.persister.save(&snapshot).await,
            None => Ok(()),
        }
    }

    /// Snapshot the current state and persist it on a background task.
    fn schedule_persist(&self) {
        let Some(snapshot) = self.make_snapshot() else {
            return;
        };
        let persister = Arc::clone(&self.persister);
        tokio::spawn(async move {
            if let Err(err) = persister.save(&snapshot).await {
                tracing::warn!(error = %err, "background cache persist failed");
            }
        });
    }
}

fn add_reverse_fks(fk_reverse: &mut HashMap<String, Vec<IncomingFk>>, record: &TableRecord) {
    for fk in &record.foreign_keys {
        fk_reverse
            .entry(table_key(&fk.target_schema, &fk.target_table))
            .or_default()
            .push(IncomingFk {
                from_schema: record.schema.clone(),
                from_name: record.name.clone(),
                via: fk.local_columns.clone(),
            });
    }
}

fn remove_reverse_fks(fk_reverse: &mut HashMap<String, Vec<IncomingFk>>, record: &TableRecord) {
    for fk in &record.foreign_keys {
        let target = table_key(&fk.target_schema, &fk.target_table);
        if let Some(edges) = fk_reverse.get_mut(&target) {
            edges.retain(|e| {
                !(e.from_schema == record.schema && e.from_name == record.name)
            });
            if edges.is_empty() {
                fk_reverse.remove(&target);
            }
        }
    }
}

fn clamp_limit(limit: Option<usize>) -> Result<usize> {
    match limit {
        None => Ok(DEFAULT_LIMIT),
        Some(0) => Err(OrascopeError::InvalidArgument(
            "limit must be at least 1".to_string(),
        )),
        Some(n) => Ok(n.min(MAX_LIMIT)),
    }
}
