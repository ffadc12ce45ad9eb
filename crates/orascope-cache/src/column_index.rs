//! Inverted column index
//!
//! Answers "which tables contain a column called X" without touching the
//! database: `upper(column_name)` maps to the set of `(schema, table)`
//! pairs that carry it.

use std::collections::{BTreeSet, HashMap};

use crate::name_index::{NameIndex, SearchPattern};
use orascope_core::TableRecord;

/// `upper(column) -> {(schema, table)}` with a searchable name index over
/// the column names themselves
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    by_column: HashMap<String, BTreeSet<(String, String)>>,
    names: NameIndex,
}

impl ColumnIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every column of `table`.
    pub fn add_table(&mut self, table: &TableRecord) {
        let pair = (table.schema.clone(), table.name.clone());
        for column in &table.columns {
            let key = column.name.to_ascii_uppercase();
            self.by_column
                .entry(key.clone())
                .or_default()
                .insert(pair.clone());
            self.names.insert(&key);
        }
    }

    /// Drop every column entry of `table`.
    pub fn remove_table(&mut self, table: &TableRecord) {
        let pair = (table.schema.clone(), table.name.clone());
        for column in &table.columns {
            let key = column.name.to_ascii_uppercase();
            if let Some(set) = self.by_column.get_mut(&key) {
                set.remove(&pair);
                if set.is_empty() {
                    self.by_column.remove(&key);
                    self.names.remove(&key);
                }
            }
        }
    }

    /// Tables containing exactly this column name (case-insensitive).
    pub fn tables_with_column(&self, column: &str) -> Option<&BTreeSet<(String, String)>> {
        self.by_column.get(&column.to_ascii_uppercase())
    }

    /// Pattern search over column names, tier-ordered like table search;
    /// each hit expands to its `(schema, table)` pairs in alphabetical
    /// order. Bounded by `limit` result rows.
    pub fn search(
        &self,
        pattern: &SearchPattern,
        limit: usize,
    ) -> Vec<(String, String, String)> {
        let mut out = Vec::new();
        for column in self.names.search(pattern, self.names.len()) {
            if let Some(pairs) = self.by_column.get(&column) {
                for (schema, table) in pairs {
                    out.push((schema.clone(), table.clone(), column.clone()));
                    if out.len() >= limit {
                        return out;
                    }
                }
            }
        }
        out
    }

    pub fn column_count(&self) -> usize {
        self.by_column.len()
    }
}
