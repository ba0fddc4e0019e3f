//! In-memory route store.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

use super::{Condition, Lookup, RouteStore, StoreError};

type Row = HashMap<String, String>;

/// A thread-safe table → rows map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<DashMap<String, Vec<Row>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from configured seed rows.
    pub fn from_tables(tables: &HashMap<String, Vec<Row>>) -> Self {
        let store = Self::new();
        for (table, rows) in tables {
            for row in rows {
                store.insert_row(table, row.clone());
            }
        }
        tracing::debug!(tables = store.tables.len(), "Memory store seeded");
        store
    }

    /// Append a row to `table`, creating the table if needed.
    pub fn insert_row(&self, table: &str, row: Row) {
        self.tables.entry(table.to_string()).or_default().push(row);
    }

    /// Number of rows in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map(|rows| rows.len()).unwrap_or(0)
    }
}

impl RouteStore for MemoryStore {
    fn value(&self, lookup: &Lookup<'_>) -> Result<Option<String>, StoreError> {
        let Some(rows) = self.tables.get(lookup.table) else {
            return Ok(None);
        };

        let found = rows.iter().find_map(|row| {
            let cell = row.get(lookup.column)?;
            let matched = match lookup.condition {
                Condition::Equals => cell == lookup.value,
                Condition::Contains => cell.contains(lookup.value),
            };
            matched.then(|| cell.clone())
        });

        Ok(found)
    }
}
