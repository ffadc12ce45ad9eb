//! SCIX cache file persistence
//!
//! Fixed little-endian layout: magic `SCIX`, version u16, 32-byte
//! fingerprint, section count u16, then `(section_id u16, length u64,
//! bytes)*`. Unknown section IDs are skipped. Files are written through
//! the write-temp-then-rename pattern; a corrupt file at load time is
//! treated as absent.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use orascope_core::{
    CatalogGeneration, CheckRecord, ColumnRecord, ConstraintStatus, DependencyEdge,
    ForeignKeyRecord, IndexColumn, IndexRecord, ObjectKind, ObjectRef, OrascopeError,
    PlsqlObject, ReferentialAction, Result, SortOrder, TableKind, TableRecord, TypeAttr,
    TypeCode, UserDefinedType,
};

use crate::builder::CacheSnapshot;
use crate::fingerprint::CatalogFingerprint;

const MAGIC: &[u8; 4] = b"SCIX";
const VERSION: u16 = 1;

const SEC_META: u16 = 1;
const SEC_TABLES: u16 = 2;
const SEC_COLUMNS: u16 = 3;
const SEC_CONSTRAINTS: u16 = 4;
const SEC_INDEXES: u16 = 5;
const SEC_DEPS: u16 = 6;
const SEC_PLSQL: u16 = 7;
const SEC_UDTS: u16 = 8;
const SEC_NAME_INDEX: u16 = 9;
const SEC_COLUMN_INDEX: u16 = 10;

const STALE_LOCK_AGE: Duration = Duration::from_secs(600);

// ---------------------------------------------------------------------------
// Wire primitives
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Enc {
    buf: Vec<u8>,
}

impl Enc {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn bool(&mut self, v: bool) {
        self.u8(v as u8);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn str(&mut self, v: &str) {
        self.u32(v.len() as u32);
        self.buf.extend_from_slice(v.as_bytes());
    }

    fn opt_str(&mut self, v: Option<&str>) {
        match v {
            Some(s) => {
                self.u8(1);
                self.str(s);
            }
            None => self.u8(0),
        }
    }

    fn opt_i64(&mut self, v: Option<i64>) {
        match v {
            Some(n) => {
                self.u8(1);
                self.i64(n);
            }
            None => self.u8(0),
        }
    }

    fn str_list(&mut self, v: &[String]) {
        self.u32(v.len() as u32);
        for s in v {
            self.str(s);
        }
    }
}

struct Dec<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Dec<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.buf.len());
        if end.is_none() {
            return Err(OrascopeError::CacheCorrupt(format!(
                "truncated record stream: wanted {n} bytes at offset {}",
                self.pos
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn str(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| OrascopeError::CacheCorrupt("invalid UTF-8 in string".into()))
    }

    fn opt_str(&mut self) -> Result<Option<String>> {
        Ok(if self.u8()? == 1 {
            Some(self.str()?)
        } else {
            None
        })
    }

    fn opt_i64(&mut self) -> Result<Option<i64>> {
        Ok(if self.u8()? == 1 {
            Some(self.i64()?)
        } else {
            None
        })
    }

    fn str_list(&mut self) -> Result<Vec<String>> {
        let n = self.u32()? as usize;
        let mut out = Vec::with_capacity(n.min(4096));
        for _ in 0..n {
            out.push(self.str()?);
        }
        Ok(out)
    }
}

fn ddl_to_epoch(ddl: Option<chrono::DateTime<chrono::Utc>>) -> Option<i64> {
    ddl.map(|t| t.timestamp())
}

fn epoch_to_ddl(epoch: Option<i64>) -> Option<chrono::DateTime<chrono::Utc>> {
    epoch.and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
}

// ---------------------------------------------------------------------------
// Snapshot encoding
// ---------------------------------------------------------------------------

/// Serialize a snapshot into the SCIX byte layout.
pub(crate) fn encode(snapshot: &CacheSnapshot) -> Vec<u8> {
    let mut sections: Vec<(u16, Vec<u8>)> = Vec::with_capacity(10);

    let mut meta = Enc::default();
    meta.str(&snapshot.schema);
    meta.opt_str(snapshot.generation.max_last_ddl.as_deref());
    meta.u64(snapshot.generation.object_count);
    sections.push((SEC_META, meta.buf));

    let mut tables = Enc::default();
    tables.u32(snapshot.tables.len() as u32);
    for t in &snapshot.tables {
        tables.str(&t.schema);
        tables.str(&t.name);
        tables.u8(match t.kind {
            TableKind::Table => 0,
            TableKind::View => 1,
            TableKind::MaterializedView => 2,
        });
        tables.opt_str(t.comment.as_deref());
        tables.opt_i64(ddl_to_epoch(t.last_ddl));
    }
    sections.push((SEC_TABLES, tables.buf));

    let mut columns = Enc::default();
    let total: usize = snapshot.tables.iter().map(|t| t.columns.len()).sum();
    columns.u32(total as u32);
    for t in &snapshot.tables {
        for c in &t.columns {
            columns.str(&t.schema);
            columns.str(&t.name);
            columns.str(&c.name);
            columns.u32(c.position);
            columns.str(&c.data_type);
            columns.bool(c.nullable);
            columns.opt_str(c.default_expr.as_deref());
            columns.opt_str(c.comment.as_deref());
        }
    }
    sections.push((SEC_COLUMNS, columns.buf));

    let mut cons = Enc::default();
    let total: usize = snapshot
        .tables
        .iter()
        .map(|t| {
            t.primary_key.is_some() as usize
                + t.unique_keys.len()
                + t.foreign_keys.len()
                + t.check_constraints.len()
        })
        .sum();
    cons.u32(total as u32);
    for t in &snapshot.tables {
        if let Some(pk) = &t.primary_key {
            cons.str(&t.schema);
            cons.str(&t.name);
            cons.u8(0);
            cons.str_list(pk);
        }
        for uk in &t.unique_keys {
            cons.str(&t.schema);
            cons.str(&t.name);
            cons.u8(1);
            cons.str_list(uk);
        }
        for fk in &t.foreign_keys {
            cons.str(&t.schema);
            cons.str(&t.name);
            cons.u8(2);
            cons.str(&fk.name);
            cons.str_list(&fk.local_columns);
            cons.str(&fk.target_schema);
            cons.str(&fk.target_table);
            cons.str_list(&fk.target_columns);
            cons.u8(match fk.on_delete {
                ReferentialAction::NoAction => 0,
                ReferentialAction::Cascade => 1,
                ReferentialAction::SetNull => 2,
            });
            cons.bool(fk.deferrable);
            cons.u8(match fk.status {
                ConstraintStatus::Enabled => 0,
                ConstraintStatus::Disabled => 1,
            });
            cons.bool(fk.external);
        }
        for check in &t.check_constraints {
            cons.str(&t.schema);
            cons.str(&t.name);
            cons.u8(3);
            cons.str(&check.name);
            cons.str(&check.condition);
            cons.u8(match check.status {
                ConstraintStatus::Enabled => 0,
                ConstraintStatus::Disabled => 1,
            });
        }
    }
    sections.push((SEC_CONSTRAINTS, cons.buf));

    let mut indexes = Enc::default();
    let total: usize = snapshot.tables.iter().map(|t| t.indexes.len()).sum();
    indexes.u32(total as u32);
    for t in &snapshot.tables {
        for ix in &t.indexes {
            indexes.str(&t.schema);
            indexes.str(&t.name);
            indexes.str(&ix.name);
            indexes.bool(ix.unique);
            indexes.str(&ix.index_type);
            indexes.u32(ix.columns.len() as u32);
            for col in &ix.columns {
                indexes.str(&col.name);
                indexes.u8(match col.order {
                    SortOrder::Asc => 0,
                    SortOrder::Desc => 1,
                });
            }
        }
    }
    sections.push((SEC_INDEXES, indexes.buf));

    let mut deps = Enc::default();
    deps.u32(snapshot.edges.len() as u32);
    for edge in &snapshot.edges {
        for obj in [&edge.referrer, &edge.referenced] {
            deps.str(&obj.schema);
            deps.str(&obj.name);
            deps.str(obj.kind.as_str());
        }
    }
    sections.push((SEC_DEPS, deps.buf));

    let mut plsql = Enc::default();
    plsql.u32(snapshot.plsql.len() as u32);
    for obj in &snapshot.plsql {
        plsql.str(&obj.schema);
        plsql.str(&obj.name);
        plsql.str(obj.kind.as_str());
        plsql.str(&obj.status);
        plsql.opt_i64(ddl_to_epoch(obj.last_ddl));
        plsql.bool(obj.source_available);
    }
    sections.push((SEC_PLSQL, plsql.buf));

    let mut udts = Enc::default();
    udts.u32(snapshot.udts.len() as u32);
    for udt in &snapshot.udts {
        udts.str(&udt.schema);
        udts.str(&udt.name);
        udts.str(udt.typecode.as_str());
        udts.u32(udt.attributes.len() as u32);
        for attr in &udt.attributes {
            udts.str(&attr.name);
            udts.str(&attr.data_type);
            udts.u32(attr.position);
        }
    }
    sections.push((SEC_UDTS, udts.buf));

    // Sections 9 and 10 are derivable from 2+3; they are written for
    // forward compatibility and skipped on load.
    let mut names = Enc::default();
    let mut upper: Vec<String> = snapshot
        .tables
        .iter()
        .filter(|t| t.schema.eq_ignore_ascii_case(&snapshot.schema))
        .map(|t| t.name.to_ascii_uppercase())
        .collect();
    upper.sort();
    names.str_list(&upper);
    sections.push((SEC_NAME_INDEX, names.buf));

    let mut colindex = Enc::default();
    let mut by_column: std::collections::BTreeMap<String, Vec<(&str, &str)>> =
        std::collections::BTreeMap::new();
    for t in &snapshot.tables {
        for c in &t.columns {
            by_column
                .entry(c.name.to_ascii_uppercase())
                .or_default()
                .push((&t.schema, &t.name));
        }
    }
    colindex.u32(by_column.len() as u32);
    for (column, pairs) in &by_column {
        colindex.str(column);
        colindex.u32(pairs.len() as u32);
        for (schema, table) in pairs {
            colindex.str(schema);
            colindex.str(table);
        }
    }
    sections.push((SEC_COLUMN_INDEX, colindex.buf));

    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(snapshot.fingerprint.as_bytes());
    out.extend_from_slice(&(sections.len() as u16).to_le_bytes());
    for (id, payload) in sections {
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        out.extend_from_slice(&payload);
    }
    out
}

// ---------------------------------------------------------------------------
// Snapshot decoding
// ---------------------------------------------------------------------------

fn parse_status(tag: u8) -> ConstraintStatus {
    if tag == 1 {
        ConstraintStatus::Disabled
    } else {
        ConstraintStatus::Enabled
    }
}

/// Parse SCIX bytes back into a snapshot. Any structural fault is
/// `CacheCorrupt`.
pub(crate) fn decode(bytes: &[u8]) -> Result<CacheSnapshot> {
    let mut dec = Dec::new(bytes);
    if dec.take(4)? != MAGIC {
        return Err(OrascopeError::CacheCorrupt("bad magic".into()));
    }
    let version = dec.u16()?;
    if version != VERSION {
        return Err(OrascopeError::CacheCorrupt(format!(
            "unsupported cache version {version}"
        )));
    }
    let fingerprint = CatalogFingerprint::try_from_slice(dec.take(CatalogFingerprint::LEN)?)?;
    let section_count = dec.u16()?;

    let mut schema = String::new();
    let mut generation = CatalogGeneration {
        max_last_ddl: None,
        object_count: 0,
    };
    let mut table_heads: Vec<TableRecord> = Vec::new();
    type TableParts = std::collections::HashMap<String, Vec<usize>>;
    let mut head_by_key: TableParts = TableParts::new();
    let mut edges = Vec::new();
    let mut plsql = Vec::new();
    let mut udts = Vec::new();
    // Column/constraint/index rows are buffered until all sections are
    // read; section order is not guaranteed.
    let mut column_rows = Vec::new();
    let mut constraint_rows: Vec<(String, Box<dyn FnOnce(&mut TableRecord)>)> = Vec::new();
    let mut index_rows: Vec<(String, IndexRecord)> = Vec::new();

    for _ in 0..section_count {
        let id = dec.u16()?;
        let len = dec.u64()? as usize;
        let payload = dec.take(len)?;
        let mut sec = Dec::new(payload);

        match id {
            SEC_META => {
                schema = sec.str()?;
                generation.max_last_ddl = sec.opt_str()?;
                generation.object_count = sec.u64()?;
            }
            SEC_TABLES => {
                let n = sec.u32()? as usize;
                for _ in 0..n {
                    let t_schema = sec.str()?;
                    let t_name = sec.str()?;
                    let kind = match sec.u8()? {
                        0 => TableKind::Table,
                        1 => TableKind::View,
                        2 => TableKind::MaterializedView,
                        other => {
                            return Err(OrascopeError::CacheCorrupt(format!(
                                "unknown table kind tag {other}"
                            )));
                        }
                    };
                    let comment = sec.opt_str()?;
                    let last_ddl = epoch_to_ddl(sec.opt_i64()?);
                    let record = TableRecord {
                        schema: t_schema,
                        name: t_name,
                        kind,
                        columns: Vec::new(),
                        primary_key: None,
                        unique_keys: Vec::new(),
                        foreign_keys: Vec::new(),
                        check_constraints: Vec::new(),
                        indexes: Vec::new(),
                        comment,
                        last_ddl,
                    };
                    head_by_key
                        .entry(record.key())
                        .or_default()
                        .push(table_heads.len());
                    table_heads.push(record);
                }
            }
            SEC_COLUMNS => {
                let n = sec.u32()? as usize;
                for _ in 0..n {
                    let t_schema = sec.str()?;
                    let t_name = sec.str()?;
                    let column = ColumnRecord {
                        name: sec.str()?,
                        position: sec.u32()?,
                        data_type: sec.str()?,
                        nullable: sec.bool()?,
                        default_expr: sec.opt_str()?,
                        comment: sec.opt_str()?,
                    };
                    column_rows.push((orascope_core::table_key(&t_schema, &t_name), column));
                }
            }
            SEC_CONSTRAINTS => {
                let n = sec.u32()? as usize;
                for _ in 0..n {
                    let t_schema = sec.str()?;
                    let t_name = sec.str()?;
                    let key = orascope_core::table_key(&t_schema, &t_name);
                    match sec.u8()? {
                        0 => {
                            let pk = sec.str_list()?;
                            constraint_rows.push((
                                key,
                                Box::new(move |t| t.primary_key = Some(pk)),
                            ));
                        }
                        1 => {
                            let uk = sec.str_list()?;
                            constraint_rows
                                .push((key, Box::new(move |t| t.unique_keys.push(uk))));
                        }
                        2 => {
                            let fk = ForeignKeyRecord {
                                name: sec.str()?,
                                local_columns: sec.str_list()?,
                                target_schema: sec.str()?,
                                target_table: sec.str()?,
                                target_columns: sec.str_list()?,
                                on_delete: match sec.u8()? {
                                    1 => ReferentialAction::Cascade,
                                    2 => ReferentialAction::SetNull,
                                    _ => ReferentialAction::NoAction,
                                },
                                deferrable: sec.bool()?,
                                status: parse_status(sec.u8()?),
                                external: sec.bool()?,
                            };
                            constraint_rows
                                .push((key, Box::new(move |t| t.foreign_keys.push(fk))));
                        }
                        3 => {
                            let check = CheckRecord {
                                name: sec.str()?,
                                condition: sec.str()?,
                                status: parse_status(sec.u8()?),
                            };
                            constraint_rows
                                .push((key, Box::new(move |t| t.check_constraints.push(check))));
                        }
                        other => {
                            return Err(OrascopeError::CacheCorrupt(format!(
                                "unknown constraint tag {other}"
                            )));
                        }
                    }
                }
            }
            SEC_INDEXES => {
                let n = sec.u32()? as usize;
                for _ in 0..n {
                    let t_schema = sec.str()?;
                    let t_name = sec.str()?;
                    let name = sec.str()?;
                    let unique = sec.bool()?;
                    let index_type = sec.str()?;
                    let ncols = sec.u32()? as usize;
                    let mut columns = Vec::with_capacity(ncols.min(64));
                    for _ in 0..ncols {
                        columns.push(IndexColumn {
                            name: sec.str()?,
                            order: if sec.u8()? == 1 {
                                SortOrder::Desc
                            } else {
                                SortOrder::Asc
                            },
                        });
                    }
                    index_rows.push((
                        orascope_core::table_key(&t_schema, &t_name),
                        IndexRecord {
                            name,
                            unique,
                            columns,
                            index_type,
                        },
                    ));
                }
            }
            SEC_DEPS => {
                let n = sec.u32()? as usize;
                for _ in 0..n {
                    let referrer = ObjectRef::new(
                        sec.str()?,
                        sec.str()?,
                        ObjectKind::parse(&sec.str()?),
                    );
                    let referenced = ObjectRef::new(
                        sec.str()?,
                        sec.str()?,
                        ObjectKind::parse(&sec.str()?),
                    );
                    edges.push(DependencyEdge {
                        referrer,
                        referenced,
                    });
                }
            }
            SEC_PLSQL => {
                let n = sec.u32()? as usize;
                for _ in 0..n {
                    plsql.push(PlsqlObject {
                        schema: sec.str()?,
                        name: sec.str()?,
                        kind: ObjectKind::parse(&sec.str()?),
                        status: sec.str()?,
                        last_ddl: epoch_to_ddl(sec.opt_i64()?),
                        source_available: sec.bool()?,
                    });
                }
            }
            SEC_UDTS => {
                let n = sec.u32()? as usize;
                for _ in 0..n {
                    let u_schema = sec.str()?;
                    let u_name = sec.str()?;
                    let typecode = TypeCode::parse(&sec.str()?);
                    let nattrs = sec.u32()? as usize;
                    let mut attributes = Vec::with_capacity(nattrs.min(256));
                    for _ in 0..nattrs {
                        attributes.push(TypeAttr {
                            name: sec.str()?,
                            data_type: sec.str()?,
                            position: sec.u32()?,
                        });
                    }
                    udts.push(UserDefinedType {
                        schema: u_schema,
                        name: u_name,
                        typecode,
                        attributes,
                    });
                }
            }
            // Derivable index sections and anything newer than this
            // reader: skip.
            _ => {}
        }
    }

    if !dec.is_empty() {
        return Err(OrascopeError::CacheCorrupt(
            "trailing bytes after final section".into(),
        ));
    }

    // Reassemble records.
    for (key, column) in column_rows {
        if let Some(indices) = head_by_key.get(&key) {
            for &i in indices {
                table_heads[i].columns.push(column.clone());
            }
        }
    }
    for (key, apply) in constraint_rows {
        if let Some(&i) = head_by_key.get(&key).and_then(|v| v.first()) {
            apply(&mut table_heads[i]);
        }
    }
    for (key, index) in index_rows {
        if let Some(&i) = head_by_key.get(&key).and_then(|v| v.first()) {
            table_heads[i].indexes.push(index);
        }
    }
    for table in &mut table_heads {
        table.columns.sort_by_key(|c| c.position);
    }
    table_heads.sort_by_key(TableRecord::key);

    Ok(CacheSnapshot {
        fingerprint,
        schema,
        generation,
        tables: table_heads,
        plsql,
        udts,
        edges,
    })
}

// ---------------------------------------------------------------------------
// Disk persistence
// ---------------------------------------------------------------------------

/// Writes and loads SCIX files under the cache directory, one file per
/// fingerprint, via write-temp-then-rename. In-process writers are
/// serialized; other processes are fended off with a best-effort advisory
/// lock file.
pub struct Persister {
    dir: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl Persister {
    /// Create the persister, ensuring the cache directory exists.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the cache file for a fingerprint.
    pub fn path_for(&self, fingerprint: &CatalogFingerprint) -> PathBuf {
        self.dir.join(format!("{}.idx", fingerprint.to_hex()))
    }

    /// Persist a snapshot atomically.
    pub async fn save(&self, snapshot: &CacheSnapshot) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let bytes = encode(snapshot);
        let path = self.path_for(&snapshot.fingerprint);
        let byte_count = bytes.len();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| OrascopeError::Internal(format!("blocking task failed: {e}")))??;
        tracing::debug!(bytes = byte_count, "persisted cache snapshot");
        Ok(())
    }

    /// Load the snapshot for a fingerprint. A missing or corrupt file is
    /// `None`; corruption is logged and the file discarded so the caller
    /// rebuilds.
    pub async fn load(&self, fingerprint: &CatalogFingerprint) -> Result<Option<CacheSnapshot>> {
        let path = self.path_for(fingerprint);
        let expected = *fingerprint;
        tokio::task::spawn_blocking(move || {
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(err) => return Err(OrascopeError::Io(err)),
            };
            match decode(&bytes) {
                Ok(snapshot) if snapshot.fingerprint == expected => Ok(Some(snapshot)),
                Ok(snapshot) => {
                    tracing::warn!(
                        expected = %expected,
                        found = %snapshot.fingerprint,
                        "cache file fingerprint mismatch, discarding"
                    );
                    let _ = fs::remove_file(&path);
                    Ok(None)
                }
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "corrupt cache file, discarding and rebuilding"
                    );
                    let _ = fs::remove_file(&path);
                    Ok(None)
                }
            }
        })
        .await
        .map_err(|e| OrascopeError::Internal(format!("blocking task failed: {e}")))?
    }
}

/// Classic write-temp-then-rename with a best-effort cross-process lock.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let lock_path = path.with_extension("idx.lock");
    let _lock = match AdvisoryLock::acquire(&lock_path) {
        Some(lock) => lock,
        None => {
            tracing::warn!(
                lock = %lock_path.display(),
                "another process holds the cache lock, skipping persist"
            );
            return Ok(());
        }
    };

    let tmp_path = path.with_extension("idx.tmp");
    {
        use std::io::Write;
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Best-effort advisory lock file, broken when stale.
struct AdvisoryLock {
    path: PathBuf,
}

impl AdvisoryLock {
    fn acquire(path: &Path) -> Option<Self> {
        for _ in 0..2 {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
            {
                Ok(_) => {
                    return Some(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    let stale = fs::metadata(path)
                        .and_then(|m| m.modified())
                        .map(|modified| {
                            SystemTime::now()
                                .duration_since(modified)
                                .unwrap_or_default()
                                > STALE_LOCK_AGE
                        })
                        .unwrap_or(true);
                    if stale {
                        let _ = fs::remove_file(path);
                        continue;
                    }
                    return None;
                }
                Err(_) => return None,
            }
        }
        None
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orascope_core::TableKind;

    fn sample_snapshot() -> CacheSnapshot {
        let fingerprint = CatalogFingerprint::compute(
            "Oracle Database 19c",
            "HR",
            &CatalogGeneration {
                max_last_ddl: Some("2026-01-15 10:00:00".into()),
                object_count: 7,
            },
        );
        CacheSnapshot {
            fingerprint,
            schema: "HR".into(),
            generation: CatalogGeneration {
                max_last_ddl: Some("2026-01-15 10:00:00".into()),
                object_count: 7,
            },
            tables: vec![
                TableRecord {
                    schema: "HR".into(),
                    name: "DEPARTMENTS".into(),
                    kind: TableKind::Table,
                    columns: vec![ColumnRecord {
                        name: "DEPT_ID".into(),
                        position: 1,
                        data_type: "NUMBER(10)".into(),
                        nullable: false,
                        default_expr: None,
                        comment: Some("surrogate key".into()),
                    }],
                    primary_key: Some(vec!["DEPT_ID".into()]),
                    unique_keys: Vec::new(),
                    foreign_keys: Vec::new(),
                    check_constraints: Vec::new(),
                    indexes: vec![IndexRecord {
                        name: "PK_DEPT".into(),
                        unique: true,
                        columns: vec![IndexColumn {
                            name: "DEPT_ID".into(),
                            order: SortOrder::Asc,
                        }],
                        index_type: "NORMAL".into(),
                    }],
                    comment: None,
                    last_ddl: chrono::DateTime::from_timestamp(1_760_000_000, 0),
                },
                TableRecord {
                    schema: "HR".into(),
                    name: "EMPLOYEES".into(),
                    kind: TableKind::Table,
                    columns: vec![
                        ColumnRecord {
                            name: "EMP_ID".into(),
                            position: 1,
                            data_type: "NUMBER".into(),
                            nullable: false,
                            default_expr: None,
                            comment: None,
                        },
                        ColumnRecord {
                            name: "DEPT_ID".into(),
                            position: 2,
                            data_type: "NUMBER(10)".into(),
                            nullable: true,
                            default_expr: Some("NULL".into()),
                            comment: None,
                        },
                    ],
                    primary_key: Some(vec!["EMP_ID".into()]),
                    unique_keys: vec![vec!["EMP_ID".into()]],
                    foreign_keys: vec![ForeignKeyRecord {
                        name: "FK_DEPT".into(),
                        local_columns: vec!["DEPT_ID".into()],
                        target_schema: "HR".into(),
                        target_table: "DEPARTMENTS".into(),
                        target_columns: vec!["DEPT_ID".into()],
                        on_delete: ReferentialAction::SetNull,
                        deferrable: true,
                        status: ConstraintStatus::Enabled,
                        external: false,
                    }],
                    check_constraints: vec![CheckRecord {
                        name: "CK_SALARY".into(),
                        condition: "SALARY > 0".into(),
                        status: ConstraintStatus::Disabled,
                    }],
                    indexes: Vec::new(),
                    comment: Some("people".into()),
                    last_ddl: None,
                },
            ],
            plsql: vec![PlsqlObject {
                schema: "HR".into(),
                name: "PAY_PKG".into(),
                kind: ObjectKind::Package,
                status: "VALID".into(),
                last_ddl: chrono::DateTime::from_timestamp(1_750_000_000, 0),
                source_available: true,
            }],
            udts: vec![UserDefinedType {
                schema: "HR".into(),
                name: "ADDRESS_T".into(),
                typecode: TypeCode::Object,
                attributes: vec![TypeAttr {
                    name: "STREET".into(),
                    data_type: "VARCHAR2(100 BYTE)".into(),
                    position: 1,
                }],
            }],
            edges: vec![DependencyEdge {
                referrer: ObjectRef::new("HR", "EMP_VIEW", ObjectKind::View),
                referenced: ObjectRef::new("HR", "EMPLOYEES", ObjectKind::Table),
            }],
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let snapshot = sample_snapshot();
        let bytes = encode(&snapshot);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn header_layout_is_fixed() {
        let bytes = encode(&sample_snapshot());
        assert_eq!(&bytes[0..4], b"SCIX");
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), VERSION);
        // 4 magic + 2 version + 32 fingerprint + 2 section count.
        assert_eq!(u16::from_le_bytes([bytes[38], bytes[39]]), 10);
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let bytes = encode(&sample_snapshot());
        for cut in [3, 30, 41, bytes.len() / 2, bytes.len() - 1] {
            let err = decode(&bytes[..cut]).unwrap_err();
            assert_eq!(err.code(), "cache_corrupt", "cut at {cut}");
        }
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let mut bytes = encode(&sample_snapshot());
        bytes[0] = b'X';
        assert_eq!(decode(&bytes).unwrap_err().code(), "cache_corrupt");
    }

    #[test]
    fn unknown_sections_are_skipped() {
        let mut bytes = encode(&sample_snapshot());
        // Append a section with an id this reader does not know and bump
        // the section count (offset 38, little-endian).
        let count = u16::from_le_bytes([bytes[38], bytes[39]]);
        bytes[38..40].copy_from_slice(&(count + 1).to_le_bytes());
        bytes.extend_from_slice(&999u16.to_le_bytes());
        bytes.extend_from_slice(&4u64.to_le_bytes());
        bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, sample_snapshot());
    }

    #[tokio::test]
    async fn persister_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let persister = Persister::new(dir.path()).unwrap();
        let snapshot = sample_snapshot();

        persister.save(&snapshot).await.unwrap();
        let loaded = persister.load(&snapshot.fingerprint).await.unwrap();
        assert_eq!(loaded, Some(snapshot));
    }

    #[tokio::test]
    async fn missing_file_loads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let persister = Persister::new(dir.path()).unwrap();
        let fp = sample_snapshot().fingerprint;
        assert_eq!(persister.load(&fp).await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_file_loads_as_absent_and_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let persister = Persister::new(dir.path()).unwrap();
        let snapshot = sample_snapshot();
        persister.save(&snapshot).await.unwrap();

        // Simulate a crashed writer: truncate the committed file.
        let path = persister.path_for(&snapshot.fingerprint);
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 3]).unwrap();

        assert_eq!(persister.load(&snapshot.fingerprint).await.unwrap(), None);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn interrupted_persist_leaves_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let persister = Persister::new(dir.path()).unwrap();
        let snapshot = sample_snapshot();
        persister.save(&snapshot).await.unwrap();

        // A crash between temp write and rename leaves only the temp file;
        // the committed file still loads.
        let tmp = persister
            .path_for(&snapshot.fingerprint)
            .with_extension("idx.tmp");
        fs::write(&tmp, b"partial garbage").unwrap();

        let loaded = persister.load(&snapshot.fingerprint).await.unwrap();
        assert_eq!(loaded, Some(snapshot));
    }
}
