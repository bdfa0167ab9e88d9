//! CSV directory table store.
//!
//! Each table is a `<table>.csv` file inside one directory. Every mutation
//! rewrites the file through a temporary sibling and a rename, so readers
//! never observe a half-written table.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::error::{EngineError, EngineResult};

use super::{Row, TableStore, delete_from, upsert_into};

/// A [`TableStore`] backed by CSV files in a directory.
#[derive(Debug)]
pub struct CsvTableStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvTableStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> EngineResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir.display().to_string(), &e))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// The directory holding the table files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", table))
    }

    fn read_rows(&self, table: &str) -> EngineResult<Vec<Row>> {
        let path = self.table_path(table);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)
            .map_err(|e| csv_error(table, e))?;

        reader
            .records()
            .map(|record| {
                record
                    .map(|r| r.iter().map(str::to_string).collect())
                    .map_err(|e| csv_error(table, e))
            })
            .collect()
    }

    fn write_rows(&self, table: &str, rows: &[Row]) -> EngineResult<()> {
        let path = self.table_path(table);
        let tmp = self.dir.join(format!(".{}.csv.tmp", table));

        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&tmp)
            .map_err(|e| csv_error(table, e))?;
        for row in rows {
            writer.write_record(row).map_err(|e| csv_error(table, e))?;
        }
        writer.flush().map_err(|e| io_error(table, &e))?;
        drop(writer);

        fs::rename(&tmp, &path).map_err(|e| io_error(table, &e))?;
        debug!(table, rows = rows.len(), "Rewrote table file");
        Ok(())
    }

    fn modify<T>(&self, table: &str, f: impl FnOnce(&mut Vec<Row>) -> EngineResult<T>) -> EngineResult<T> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut rows = self.read_rows(table)?;
        let result = f(&mut rows)?;
        self.write_rows(table, &rows)?;
        Ok(result)
    }
}

impl TableStore for CsvTableStore {
    fn read_all(&self, table: &str) -> EngineResult<Vec<Row>> {
        self.read_rows(table)
    }

    fn delete_rows(&self, table: &str, start_row: usize, count: usize) -> EngineResult<usize> {
        if !self.table_path(table).exists() {
            return Ok(0);
        }
        self.modify(table, |rows| delete_from(rows, table, start_row, count))
    }

    fn append_row(&self, table: &str, row: Row) -> EngineResult<()> {
        self.modify(table, |rows| {
            rows.push(row);
            Ok(())
        })
    }

    fn upsert_row(&self, table: &str, key_columns: &[usize], row: Row) -> EngineResult<()> {
        self.modify(table, |rows| {
            upsert_into(rows, key_columns, row);
            Ok(())
        })
    }
}

fn is_transient(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

fn io_error(table: &str, error: &io::Error) -> EngineError {
    EngineError::StorageUnavailable {
        table: table.to_string(),
        message: error.to_string(),
        transient: is_transient(error.kind()),
    }
}

fn csv_error(table: &str, error: csv::Error) -> EngineError {
    let transient = match error.kind() {
        csv::ErrorKind::Io(e) => is_transient(e.kind()),
        _ => false,
    };
    EngineError::StorageUnavailable {
        table: table.to_string(),
        message: error.to_string(),
        transient,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn temp_store() -> CsvTableStore {
        let dir = std::env::temp_dir().join(format!("pto-csv-{}", uuid::Uuid::new_v4()));
        CsvTableStore::open(dir).unwrap()
    }

    #[test]
    fn test_missing_table_reads_empty() {
        let store = temp_store();
        assert!(store.read_all("PtoBalances").unwrap().is_empty());
        assert_eq!(store.delete_rows("PtoBalances", 2, 100).unwrap(), 0);
        fs::remove_dir_all(store.dir()).unwrap();
    }

    #[test]
    fn test_rows_survive_reopen() {
        let store = temp_store();
        store.append_row("T", row(&["user_id", "note"])).unwrap();
        store.append_row("T", row(&["emp_001", "has, comma"])).unwrap();
        store.upsert_row("T", &[0], row(&["emp_001", "updated"])).unwrap();
        store.append_row("T", row(&["emp_002", ""])).unwrap();

        let reopened = CsvTableStore::open(store.dir()).unwrap();
        assert_eq!(
            reopened.read_all("T").unwrap(),
            vec![
                row(&["user_id", "note"]),
                row(&["emp_001", "updated"]),
                row(&["emp_002", ""]),
            ]
        );

        assert_eq!(reopened.delete_rows("T", 2, 2).unwrap(), 2);
        assert_eq!(reopened.read_all("T").unwrap(), vec![row(&["user_id", "note"])]);
        fs::remove_dir_all(store.dir()).unwrap();
    }
}
