//! Row-oriented table storage.
//!
//! The engine reads its ledger and persists its cache through the
//! [`TableStore`] trait. A table is a list of string rows; row 1 is the
//! header row and data starts at row 2. Columns are located by header
//! name through [`ColumnMap`], so column order in a table may change
//! without breaking readers.

mod csv_store;
mod memory;

use std::collections::HashMap;

pub use csv_store::CsvTableStore;
pub use memory::MemoryTableStore;

use crate::error::{EngineError, EngineResult};

/// A single table row.
pub type Row = Vec<String>;

/// Row number of the header row.
pub const HEADER_ROW: usize = 1;

/// Row number of the first data row.
pub const FIRST_DATA_ROW: usize = 2;

/// A row-oriented table store.
///
/// Row numbers are 1-based. Reading a table that does not exist yields
/// no rows, not an error.
pub trait TableStore: Send + Sync {
    /// Returns every row of `table`, header included.
    fn read_all(&self, table: &str) -> EngineResult<Vec<Row>>;

    /// Deletes up to `count` rows starting at `start_row`, returning how
    /// many rows were removed.
    fn delete_rows(&self, table: &str, start_row: usize, count: usize) -> EngineResult<usize>;

    /// Appends a row, creating the table if needed.
    fn append_row(&self, table: &str, row: Row) -> EngineResult<()>;

    /// Replaces the first data row whose cells at `key_columns` equal those
    /// of `row`, or appends `row` if none match. Positions are 0-based.
    fn upsert_row(&self, table: &str, key_columns: &[usize], row: Row) -> EngineResult<()>;
}

/// Deletes rows from an in-memory table, shared by the store implementations.
pub(crate) fn delete_from(
    rows: &mut Vec<Row>,
    table: &str,
    start_row: usize,
    count: usize,
) -> EngineResult<usize> {
    if start_row < HEADER_ROW {
        return Err(EngineError::StorageUnavailable {
            table: table.to_string(),
            message: format!("invalid start row {}, rows are numbered from 1", start_row),
            transient: false,
        });
    }
    let start = start_row - 1;
    if start >= rows.len() {
        return Ok(0);
    }
    let end = start.saturating_add(count).min(rows.len());
    rows.drain(start..end);
    Ok(end - start)
}

/// Upserts into an in-memory table, shared by the store implementations.
pub(crate) fn upsert_into(rows: &mut Vec<Row>, key_columns: &[usize], row: Row) {
    let existing = rows
        .iter()
        .enumerate()
        .skip(FIRST_DATA_ROW - 1)
        .find(|(_, candidate)| {
            key_columns
                .iter()
                .all(|&column| candidate.get(column) == row.get(column))
        })
        .map(|(index, _)| index);

    match existing {
        Some(index) => rows[index] = row,
        None => rows.push(row),
    }
}

/// Maps header names to column positions.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    columns: HashMap<String, usize>,
    width: usize,
}

impl ColumnMap {
    /// Builds a map from a header row, requiring every name in `required`.
    ///
    /// Header names are matched case-insensitively after trimming.
    pub fn from_header(header: &[String], required: &[&str]) -> Result<Self, String> {
        let columns: HashMap<String, usize> = header
            .iter()
            .enumerate()
            .map(|(index, name)| (name.trim().to_ascii_lowercase(), index))
            .collect();

        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|name| !columns.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            return Err(format!("missing columns: {}", missing.join(", ")));
        }

        Ok(Self {
            columns,
            width: header.len(),
        })
    }

    /// Returns the position of column `name`.
    pub fn index(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }

    /// Lays `cells` out in header order. Header columns without a value are
    /// left empty.
    ///
    /// Fails if a non-empty value names a column the header lacks.
    pub fn encode(&self, cells: &[(&str, String)]) -> Result<Row, String> {
        let mut row = vec![String::new(); self.width];
        for (name, value) in cells {
            match self.index(name) {
                Some(index) => row[index] = value.clone(),
                None if value.is_empty() => {}
                None => return Err(format!("no column '{}' for value '{}'", name, value)),
            }
        }
        Ok(row)
    }

    /// Returns the trimmed cell for `name`, or an empty string if the column
    /// or cell is absent.
    pub fn cell<'a>(&self, row: &'a [String], name: &str) -> &'a str {
        self.columns
            .get(name)
            .and_then(|&index| row.get(index))
            .map(|cell| cell.trim())
            .unwrap_or("")
    }
}
