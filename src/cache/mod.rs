//! The balance cache.
//!
//! [`BalanceCache`] keeps one [`BalanceRecord`] per (user, year) in the
//! `PtoBalances` table. A key moves through three states:
//!
//! ```text
//! Absent --get--> Fresh --invalidate--> Stale --get--> Fresh
//!    ^                                    |
//!    +------------- clear_all / evict ----+
//! ```
//!
//! There is no TTL. A record only goes stale when the ledger write path
//! calls [`BalanceCache::invalidate`] for its key.
//!
//! Concurrent `get` calls for the same key are funneled through a per-key
//! lock, so at most one computation per key runs at a time and callers
//! arriving while it runs receive the record it stored. `clear_all` waits
//! for every keyed operation in flight and holds new ones off until it is
//! done.

mod table;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use table::{BALANCE_COLUMNS, BALANCES_TABLE, BalanceTable, CachedBalance};
pub(crate) use table::decode_row;

use crate::calculation::BalanceSource;
use crate::error::EngineResult;
use crate::models::{BalanceKey, BalanceRecord};
use crate::notify::ChangeNotifier;

/// The lifecycle state of a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    /// No record is stored.
    Absent,
    /// The stored record reflects the ledger as of its last invalidation.
    Fresh,
    /// The ledger changed after the stored record was computed.
    Stale,
}

/// Keyed cache of computed balances with on-demand recomputation.
pub struct BalanceCache {
    table: Arc<BalanceTable>,
    source: Arc<dyn BalanceSource>,
    key_locks: Mutex<HashMap<BalanceKey, Arc<Mutex<()>>>>,
    // Shared by keyed operations, exclusive for clear_all.
    gate: RwLock<()>,
    notifier: Option<ChangeNotifier>,
}

impl BalanceCache {
    /// Creates a cache persisting to `table` and computing through `source`.
    pub fn new(table: Arc<BalanceTable>, source: Arc<dyn BalanceSource>) -> Self {
        Self {
            table,
            source,
            key_locks: Mutex::new(HashMap::new()),
            gate: RwLock::new(()),
            notifier: None,
        }
    }

    /// Notifies employees when a recomputation changes their balance
    /// materially.
    pub fn with_notifier(mut self, notifier: ChangeNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// The backing table.
    pub fn table(&self) -> &Arc<BalanceTable> {
        &self.table
    }

    /// Returns the balance for `user_id` in `year`, computing and storing it
    /// if the key is absent or stale.
    ///
    /// Transient storage failures are retried once.
    ///
    /// # Errors
    ///
    /// `UserNotFound` for unknown users; storage errors with their original
    /// kind if the retry also fails. Nothing is written on failure.
    pub fn get(&self, user_id: &str, year: i32) -> EngineResult<BalanceRecord> {
        let key = BalanceKey::new(user_id, year);
        self.with_key_lock(&key, || {
            match self.load_or_compute(&key) {
                Err(err) if err.is_transient() => {
                    warn!(key = %key, error = %err, "Transient storage error, retrying once");
                    self.load_or_compute(&key)
                }
                result => result,
            }
        })
    }

    /// Returns the stored record for the key without computing, whatever
    /// its state.
    pub fn peek(&self, user_id: &str, year: i32) -> EngineResult<Option<BalanceRecord>> {
        Ok(self
            .table
            .find(&BalanceKey::new(user_id, year))?
            .map(|cached| cached.record))
    }

    /// Returns the current state of the key.
    pub fn state(&self, user_id: &str, year: i32) -> EngineResult<CacheState> {
        self.state_of(&BalanceKey::new(user_id, year))
    }

    /// Marks the key stale so the next `get` recomputes it. Returns the
    /// state the key was in. Invalidating an absent key is a no-op.
    pub fn invalidate(&self, user_id: &str, year: i32) -> EngineResult<CacheState> {
        let key = BalanceKey::new(user_id, year);
        self.with_key_lock(&key, || {
            let state = self.state_of(&key)?;
            if state != CacheState::Absent {
                self.table.mark_stale(&key, Utc::now())?;
            }
            info!(key = %key, previous = ?state, "Invalidated cached balance");
            Ok(state)
        })
    }

    /// Removes the key's record. Returns false if there was none.
    pub fn evict(&self, user_id: &str, year: i32) -> EngineResult<bool> {
        let key = BalanceKey::new(user_id, year);
        self.with_key_lock(&key, || {
            let removed = self.table.remove(&key)?;
            debug!(key = %key, removed, "Evicted cached balance");
            Ok(removed)
        })
    }

    /// Removes every record and returns how many were removed.
    ///
    /// Runs once no `get`, `invalidate` or `evict` is in flight, so nothing
    /// computed before the clear is written after it.
    pub fn clear_all(&self) -> EngineResult<usize> {
        let _exclusive = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        let removed = self.table.clear()?;
        info!(removed, "Cleared balance cache");
        Ok(removed)
    }

    fn state_of(&self, key: &BalanceKey) -> EngineResult<CacheState> {
        Ok(match self.table.find(key)? {
            None => CacheState::Absent,
            Some(cached) if cached.is_fresh() => CacheState::Fresh,
            Some(_) => CacheState::Stale,
        })
    }

    fn load_or_compute(&self, key: &BalanceKey) -> EngineResult<BalanceRecord> {
        let previous = self.table.find(key)?;
        if let Some(cached) = &previous {
            if cached.is_fresh() {
                debug!(key = %key, "Balance cache hit");
                return Ok(cached.record.clone());
            }
        }

        debug!(
            key = %key,
            state = if previous.is_some() { "stale" } else { "absent" },
            "Balance cache miss"
        );
        let record = self.source.compute_balance(&key.user_id, key.year)?;
        self.table.write(&record)?;

        if let (Some(notifier), Some(previous)) = (&self.notifier, previous) {
            notifier.balance_changed(&previous.record, &record);
        }
        Ok(record)
    }

    fn with_key_lock<T>(&self, key: &BalanceKey, f: impl FnOnce() -> T) -> T {
        let _shared = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        let lock = {
            let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.clone()).or_default())
        };

        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map and this call hold the lock: nobody is waiting on it.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
        result
    }
}
