//! The `PtoBalances` cache table.
//!
//! Row 1 holds the header; every following row is one cached
//! [`BalanceRecord`] keyed by its leading `user_id` and `year` cells. A row
//! whose `invalidated_at` is later than its `computed_at` is stale.

use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::models::{BalanceKey, BalanceRecord};
use crate::storage::{FIRST_DATA_ROW, HEADER_ROW, Row, TableStore};

/// Name of the balance cache table.
pub const BALANCES_TABLE: &str = "PtoBalances";

/// Column names of the cache table, in order.
pub const BALANCE_COLUMNS: [&str; 8] = [
    "user_id",
    "year",
    "total_hours",
    "available_hours",
    "used_hours",
    "pending_hours",
    "computed_at",
    "invalidated_at",
];

const KEY_COLUMNS: [usize; 2] = [0, 1];

/// A decoded cache row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBalance {
    /// The 1-based table row the record was read from.
    pub row: usize,
    /// The cached record.
    pub record: BalanceRecord,
    /// When the record was last invalidated, if ever.
    pub invalidated_at: Option<DateTime<Utc>>,
}

impl CachedBalance {
    /// A record is fresh unless an invalidation landed after it was computed.
    pub fn is_fresh(&self) -> bool {
        self.invalidated_at
            .is_none_or(|invalidated| invalidated < self.record.computed_at)
    }
}

/// Typed access to the cache table over a [`TableStore`].
///
/// Reads go straight to the store. Writes are serialized through an
/// internal lock so each read-modify-write of the table is atomic within
/// the process.
pub struct BalanceTable {
    store: Arc<dyn TableStore>,
    write_lock: Mutex<()>,
}

impl BalanceTable {
    /// Creates a table view over `store`.
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Reads the raw data rows, without the header.
    ///
    /// An absent table, or one whose header does not match the current
    /// column layout, yields no rows.
    pub fn data_rows(&self) -> EngineResult<Vec<Row>> {
        let mut rows = self.store.read_all(BALANCES_TABLE)?;
        if rows.is_empty() {
            return Ok(rows);
        }
        if !has_current_header(&rows) {
            warn!(
                table = BALANCES_TABLE,
                "Cache table header does not match the current layout; treating cache as empty"
            );
            return Ok(Vec::new());
        }
        rows.remove(0);
        Ok(rows)
    }

    /// Looks up the cached row for `key`.
    ///
    /// A row that cannot be decoded is reported as absent so the next
    /// computation overwrites it.
    pub fn find(&self, key: &BalanceKey) -> EngineResult<Option<CachedBalance>> {
        let year = key.year.to_string();
        let found = self
            .data_rows()?
            .into_iter()
            .enumerate()
            .find(|(_, row)| row_matches(row, &key.user_id, &year));

        let Some((offset, row)) = found else {
            return Ok(None);
        };
        match decode_row(&row, FIRST_DATA_ROW + offset) {
            Ok(cached) => Ok(Some(cached)),
            Err(err) => {
                warn!(key = %key, error = %err, "Ignoring undecodable cache row");
                Ok(None)
            }
        }
    }

    /// Stores `record` as the live row for its key.
    ///
    /// If the existing row carries an invalidation later than
    /// `record.computed_at`, that invalidation is kept and the written row
    /// stays stale. Returns the row that was replaced, if any.
    pub fn write(&self, record: &BalanceRecord) -> EngineResult<Option<CachedBalance>> {
        let _guard = self.lock();
        self.ensure_current_header()?;

        let previous = self.find(&record.key())?;
        let invalidated_at = previous
            .as_ref()
            .and_then(|p| p.invalidated_at)
            .filter(|&at| at > record.computed_at);

        self.store
            .upsert_row(BALANCES_TABLE, &KEY_COLUMNS, encode_row(record, invalidated_at))?;
        Ok(previous)
    }

    /// Marks the row for `key` stale as of `at`. Returns false if there is
    /// no row to mark.
    pub fn mark_stale(&self, key: &BalanceKey, at: DateTime<Utc>) -> EngineResult<bool> {
        let _guard = self.lock();
        let Some(cached) = self.find(key)? else {
            return Ok(false);
        };
        let invalidated_at = cached.invalidated_at.map_or(at, |existing| existing.max(at));
        self.store.upsert_row(
            BALANCES_TABLE,
            &KEY_COLUMNS,
            encode_row(&cached.record, Some(invalidated_at)),
        )?;
        Ok(true)
    }

    /// Deletes the row for `key`. Returns false if there was none.
    pub fn remove(&self, key: &BalanceKey) -> EngineResult<bool> {
        let _guard = self.lock();
        let year = key.year.to_string();
        let position = self
            .data_rows()?
            .iter()
            .position(|row| row_matches(row, &key.user_id, &year));

        match position {
            Some(offset) => {
                let removed = self
                    .store
                    .delete_rows(BALANCES_TABLE, FIRST_DATA_ROW + offset, 1)?;
                Ok(removed == 1)
            }
            None => Ok(false),
        }
    }

    /// Deletes every cached record and returns how many were removed.
    ///
    /// The header row is kept. A table with an outdated header is dropped
    /// entirely so the next write recreates it.
    pub fn clear(&self) -> EngineResult<usize> {
        let _guard = self.lock();
        let rows = self.store.read_all(BALANCES_TABLE)?;
        if rows.is_empty() {
            return Ok(0);
        }
        if !has_current_header(&rows) {
            let removed = self.store.delete_rows(BALANCES_TABLE, HEADER_ROW, rows.len())?;
            info!(table = BALANCES_TABLE, "Dropped cache table with outdated header");
            return Ok(removed.saturating_sub(1));
        }
        self.store
            .delete_rows(BALANCES_TABLE, FIRST_DATA_ROW, rows.len() - 1)
    }

    fn ensure_current_header(&self) -> EngineResult<()> {
        let rows = self.store.read_all(BALANCES_TABLE)?;
        if !rows.is_empty() && has_current_header(&rows) {
            return Ok(());
        }
        if !rows.is_empty() {
            self.store.delete_rows(BALANCES_TABLE, HEADER_ROW, rows.len())?;
            info!(table = BALANCES_TABLE, "Rebuilding cache table with current header");
        }
        self.store.append_row(
            BALANCES_TABLE,
            BALANCE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        )
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn has_current_header(rows: &[Row]) -> bool {
    rows.first().is_some_and(|header| {
        header.len() == BALANCE_COLUMNS.len()
            && header
                .iter()
                .zip(BALANCE_COLUMNS)
                .all(|(cell, expected)| cell.trim().eq_ignore_ascii_case(expected))
    })
}

fn row_matches(row: &[String], user_id: &str, year: &str) -> bool {
    row.first().is_some_and(|cell| cell == user_id) && row.get(1).is_some_and(|cell| cell == year)
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn encode_row(record: &BalanceRecord, invalidated_at: Option<DateTime<Utc>>) -> Row {
    vec![
        record.user_id.clone(),
        record.year.to_string(),
        record.total_hours.to_string(),
        record.available_hours.to_string(),
        record.used_hours.to_string(),
        record.pending_hours.to_string(),
        format_timestamp(record.computed_at),
        invalidated_at.map(format_timestamp).unwrap_or_default(),
    ]
}

pub(crate) fn decode_row(row: &[String], row_number: usize) -> EngineResult<CachedBalance> {
    let invalid = |message: String| EngineError::InvalidCacheRow {
        row: row_number,
        message,
    };
    let cell = |index: usize| row.get(index).map(|c| c.trim()).unwrap_or("");
    let hours = |index: usize| {
        Decimal::from_str(cell(index)).map_err(|e| {
            invalid(format!(
                "invalid {} '{}': {}",
                BALANCE_COLUMNS[index],
                cell(index),
                e
            ))
        })
    };
    let timestamp = |index: usize| {
        DateTime::parse_from_rfc3339(cell(index))
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                invalid(format!(
                    "invalid {} '{}': {}",
                    BALANCE_COLUMNS[index],
                    cell(index),
                    e
                ))
            })
    };

    let user_id = cell(0);
    if user_id.is_empty() {
        return Err(invalid("empty user_id".to_string()));
    }
    let year = cell(1)
        .parse::<i32>()
        .map_err(|e| invalid(format!("invalid year '{}': {}", cell(1), e)))?;

    let record = BalanceRecord {
        user_id: user_id.to_string(),
        year,
        total_hours: hours(2)?,
        available_hours: hours(3)?,
        used_hours: hours(4)?,
        pending_hours: hours(5)?,
        computed_at: timestamp(6)?,
    };
    if record.total_hours - record.used_hours - record.pending_hours != record.available_hours {
        return Err(invalid(
            "available_hours does not equal total_hours - used_hours - pending_hours".to_string(),
        ));
    }

    let invalidated_at = match cell(7) {
        "" => None,
        _ => Some(timestamp(7)?),
    };

    Ok(CachedBalance {
        row: row_number,
        record,
        invalidated_at,
    })
}
