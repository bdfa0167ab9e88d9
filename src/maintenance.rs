//! Operator maintenance of the balance cache.
//!
//! [`MaintenanceApi`] exposes the two operator commands,
//! `clear-balances-cache` and `inspect-balances-cache`. Each command returns a
//! [`CommandOutcome`] carrying both a machine-readable status and a report
//! for humans, and never fails outright.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::cache::{BALANCES_TABLE, BalanceCache, CachedBalance};
use crate::error::EngineResult;
use crate::models::BalanceRecord;
use crate::storage::{FIRST_DATA_ROW, Row};

/// Result of clearing the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearReport {
    /// Number of records removed.
    pub removed: usize,
}

/// A snapshot of the cache table that decodes rows on demand.
///
/// Iterating yields records in table (insertion) order. Each call to
/// [`CacheListing::iter`] starts again from the first row. Rows that cannot
/// be decoded are skipped with a warning.
#[derive(Debug, Clone, Default)]
pub struct CacheListing {
    rows: Vec<Row>,
}

impl CacheListing {
    /// Number of raw data rows in the snapshot, decodable or not.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the snapshot holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates over the decodable rows with their freshness.
    pub fn entries(&self) -> impl Iterator<Item = CachedBalance> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(offset, row)| {
                match crate::cache::decode_row(row, FIRST_DATA_ROW + offset) {
                    Ok(cached) => Some(cached),
                    Err(err) => {
                        warn!(table = BALANCES_TABLE, error = %err, "Skipping undecodable cache row");
                        None
                    }
                }
            })
    }

    /// Iterates over the cached balance records.
    pub fn iter(&self) -> impl Iterator<Item = BalanceRecord> + '_ {
        self.entries().map(|cached| cached.record)
    }
}

/// Outcome of an operator command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// Whether the command succeeded.
    pub success: bool,
    /// Summary on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error description on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Records listed by an inspect command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<BalanceRecord>>,
    /// Human-readable report.
    #[serde(skip)]
    pub report: String,
}

impl CommandOutcome {
    fn succeeded(message: String, report: String) -> Self {
        Self {
            success: true,
            message: Some(message),
            error: None,
            records: None,
            report,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            message: None,
            report: format!("Error: {}", error),
            error: Some(error),
            records: None,
        }
    }
}

/// Cache maintenance operations for operators.
#[derive(Clone)]
pub struct MaintenanceApi {
    cache: Arc<BalanceCache>,
}

impl MaintenanceApi {
    /// Creates the API over `cache`.
    pub fn new(cache: Arc<BalanceCache>) -> Self {
        Self { cache }
    }

    /// Removes every cached record. Clearing an empty or absent table
    /// removes nothing.
    pub fn clear_all(&self) -> EngineResult<ClearReport> {
        let removed = self.cache.clear_all()?;
        Ok(ClearReport { removed })
    }

    /// Reads every data row of the cache table in one pass. Decoding is
    /// deferred until the listing is iterated, and writes made after this
    /// call are not reflected in it.
    pub fn inspect(&self) -> EngineResult<CacheListing> {
        let rows = self.cache.table().data_rows()?;
        Ok(CacheListing { rows })
    }

    /// The `clear-balances-cache` command.
    pub fn clear_balances_cache(&self) -> CommandOutcome {
        match self.clear_all() {
            Ok(ClearReport { removed }) => {
                info!(removed, "clear-balances-cache completed");
                let message = format!("Cleared {} cached balance record(s)", removed);
                let report = format!(
                    "{}.\nBalances will be recalculated on the next request.",
                    message
                );
                CommandOutcome::succeeded(message, report)
            }
            Err(err) => {
                error!(error = %err, "clear-balances-cache failed");
                CommandOutcome::failed(format!("Failed to clear balances cache: {}", err))
            }
        }
    }

    /// The `inspect-balances-cache` command.
    pub fn inspect_balances_cache(&self) -> CommandOutcome {
        let listing = match self.inspect() {
            Ok(listing) => listing,
            Err(err) => {
                error!(error = %err, "inspect-balances-cache failed");
                return CommandOutcome::failed(format!(
                    "Failed to inspect balances cache: {}",
                    err
                ));
            }
        };

        let entries: Vec<CachedBalance> = listing.entries().collect();
        let message = format!("{} cached balance record(s)", entries.len());
        let mut report = format!("{} cache: {}", BALANCES_TABLE, message);
        if entries.is_empty() {
            report.push_str("\n  (empty)");
        }
        for cached in &entries {
            let record = &cached.record;
            let _ = write!(
                report,
                "\n  {:<12} {}  total={}  available={}  used={}  pending={}  computed_at={}  [{}]",
                record.user_id,
                record.year,
                record.total_hours,
                record.available_hours,
                record.used_hours,
                record.pending_hours,
                record.computed_at.format("%Y-%m-%d %H:%M:%S"),
                if cached.is_fresh() { "fresh" } else { "stale" },
            );
        }
        let skipped = listing.row_count() - entries.len();
        if skipped > 0 {
            let _ = write!(report, "\n  {} undecodable row(s) skipped", skipped);
        }

        let mut outcome = CommandOutcome::succeeded(message, report);
        outcome.records = Some(entries.into_iter().map(|cached| cached.record).collect());
        outcome
    }
}
