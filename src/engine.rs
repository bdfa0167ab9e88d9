//! The assembled balance engine.
//!
//! [`BalanceEngine`] owns one instance of every component, wired over a
//! single [`TableStore`]:
//!
//! ```text
//! LedgerReader ──> BalanceCalculator ──> BalanceCache ──> MaintenanceApi
//!                        ^                    │
//!                        └── prior-year ──────┘
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Datelike;
use tracing::info;

use crate::cache::{BalanceCache, BalanceTable, CacheState};
use crate::calculation::BalanceCalculator;
use crate::config::ConfigLoader;
use crate::error::EngineResult;
use crate::ledger::{LedgerReader, LedgerWriter};
use crate::maintenance::MaintenanceApi;
use crate::models::{BalanceRecord, Employee, LeaveRequest};
use crate::notify::{ChangeNotifier, LogNotifier, Notifier};
use crate::storage::TableStore;

fn request_years(request: &LeaveRequest) -> impl Iterator<Item = i32> {
    (request.start_date.year()..=request.end_date.year()).chain(std::iter::once(request.year))
}

/// The PTO balance engine.
pub struct BalanceEngine {
    config: ConfigLoader,
    ledger: LedgerReader,
    writer: LedgerWriter,
    calculator: BalanceCalculator,
    cache: Arc<BalanceCache>,
    maintenance: MaintenanceApi,
}

impl BalanceEngine {
    /// Builds an engine over `store`. Balance change notifications, if a
    /// threshold is configured, go to the log.
    pub fn new(store: Arc<dyn TableStore>, config: ConfigLoader) -> Self {
        Self::with_notifier(store, config, Arc::new(LogNotifier))
    }

    /// Builds an engine that sends balance change notifications through
    /// `notifier` when a threshold is configured.
    pub fn with_notifier(
        store: Arc<dyn TableStore>,
        config: ConfigLoader,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let ledger = LedgerReader::new(store.clone());
        let table = Arc::new(BalanceTable::new(store.clone()));
        let calculator =
            BalanceCalculator::new(ledger.clone(), config.policy().clone()).with_snapshots(table.clone());

        let mut cache = BalanceCache::new(table, Arc::new(calculator.clone()));
        if let Some(threshold) = config.notifications().threshold_hours {
            cache = cache.with_notifier(ChangeNotifier::new(notifier, ledger.clone(), threshold));
        }
        let cache = Arc::new(cache);

        Self {
            maintenance: MaintenanceApi::new(cache.clone()),
            writer: LedgerWriter::new(store),
            config,
            ledger,
            calculator,
            cache,
        }
    }

    /// Returns the balance for `user_id` in `year`, served from the cache.
    pub fn balance(&self, user_id: &str, year: i32) -> EngineResult<BalanceRecord> {
        self.cache.get(user_id, year)
    }

    /// Marks the cached balance stale. Returns the state it was in.
    pub fn invalidate(&self, user_id: &str, year: i32) -> EngineResult<CacheState> {
        self.cache.invalidate(user_id, year)
    }

    /// Writes a leave request to the ledger and invalidates every balance it
    /// can affect.
    ///
    /// If the request already exists, the years and user it was filed under
    /// before are invalidated too. With carryover enabled, every cached
    /// year after the earliest touched one is invalidated as well, since its
    /// entitlement may derive from the changed year.
    pub fn record_leave_request(&self, request: &LeaveRequest) -> EngineResult<()> {
        let previous = self.ledger.request(&request.request_id)?;
        self.writer.upsert_request(request)?;

        let mut touched: BTreeMap<&str, BTreeSet<i32>> = BTreeMap::new();
        for filed in previous.iter().chain(std::iter::once(request)) {
            touched
                .entry(filed.user_id.as_str())
                .or_default()
                .extend(request_years(filed));
        }

        let mut invalidated = 0;
        for (user_id, years) in touched {
            let years = self.with_later_cached_years(user_id, years)?;
            for &year in &years {
                self.cache.invalidate(user_id, year)?;
            }
            invalidated += years.len();
        }
        info!(
            request_id = %request.request_id,
            user_id = %request.user_id,
            moved = previous.as_ref().is_some_and(|p| p.user_id != request.user_id),
            invalidated,
            "Recorded leave request"
        );
        Ok(())
    }

    /// Writes an employee to the directory and invalidates every cached
    /// balance of theirs.
    pub fn record_employee(&self, employee: &Employee) -> EngineResult<()> {
        self.writer.upsert_employee(employee)?;

        let years = self.cached_years(&employee.user_id)?;
        for &year in &years {
            self.cache.invalidate(&employee.user_id, year)?;
        }
        info!(user_id = %employee.user_id, invalidated = years.len(), "Recorded employee");
        Ok(())
    }

    fn cached_years(&self, user_id: &str) -> EngineResult<BTreeSet<i32>> {
        Ok(self
            .maintenance
            .inspect()?
            .iter()
            .filter(|record| record.user_id == user_id)
            .map(|record| record.year)
            .collect())
    }

    fn with_later_cached_years(
        &self,
        user_id: &str,
        mut years: BTreeSet<i32>,
    ) -> EngineResult<BTreeSet<i32>> {
        if !self.config.policy().carryover.enabled {
            return Ok(years);
        }
        if let Some(&earliest) = years.first() {
            let later: Vec<i32> = self
                .cached_years(user_id)?
                .into_iter()
                .filter(|&year| year > earliest)
                .collect();
            years.extend(later);
        }
        Ok(years)
    }

    /// The loaded configuration.
    pub fn config(&self) -> &ConfigLoader {
        &self.config
    }

    /// The uncached calculator.
    pub fn calculator(&self) -> &BalanceCalculator {
        &self.calculator
    }

    /// The balance cache.
    pub fn cache(&self) -> &Arc<BalanceCache> {
        &self.cache
    }

    /// The operator maintenance API.
    pub fn maintenance(&self) -> &MaintenanceApi {
        &self.maintenance
    }
}
