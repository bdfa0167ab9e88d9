//! In-memory table store.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::error::EngineResult;

use super::{Row, TableStore, delete_from, upsert_into};

/// A [`TableStore`] held entirely in memory.
///
/// # Example
///
/// ```
/// use pto_balance_engine::storage::{MemoryTableStore, TableStore};
///
/// let store = MemoryTableStore::new();
/// assert!(store.read_all("Missing").unwrap().is_empty());
///
/// store.append_row("People", vec!["name".to_string()]).unwrap();
/// store.append_row("People", vec!["Ada".to_string()]).unwrap();
/// assert_eq!(store.read_all("People").unwrap().len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    tables: Mutex<HashMap<String, Vec<Row>>>,
}

impl MemoryTableStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut HashMap<String, Vec<Row>>) -> T) -> T {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut tables)
    }
}

impl TableStore for MemoryTableStore {
    fn read_all(&self, table: &str) -> EngineResult<Vec<Row>> {
        Ok(self.with_tables(|tables| tables.get(table).cloned().unwrap_or_default()))
    }

    fn delete_rows(&self, table: &str, start_row: usize, count: usize) -> EngineResult<usize> {
        self.with_tables(|tables| match tables.get_mut(table) {
            Some(rows) => delete_from(rows, table, start_row, count),
            None => Ok(0),
        })
    }

    fn append_row(&self, table: &str, row: Row) -> EngineResult<()> {
        self.with_tables(|tables| tables.entry(table.to_string()).or_default().push(row));
        Ok(())
    }

    fn upsert_row(&self, table: &str, key_columns: &[usize], row: Row) -> EngineResult<()> {
        self.with_tables(|tables| {
            upsert_into(tables.entry(table.to_string()).or_default(), key_columns, row)
        });
        Ok(())
    }
}
