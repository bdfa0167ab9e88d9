//! Balance calculation.
//!
//! [`BalanceCalculator`] derives a [`BalanceRecord`] for a user and year
//! from the accrual policy and the leave ledger.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::cache::BalanceTable;
use crate::config::AccrualPolicy;
use crate::error::EngineResult;
use crate::ledger::LedgerReader;
use crate::models::{BalanceKey, BalanceRecord, Employee};

use super::BalanceSource;
use super::accrual::{EntitlementResult, compute_entitlement};
use super::usage::summarize_usage;

/// Computes leave balances from the ledger and the accrual policy.
///
/// When carryover is enabled, the prior year's available balance is
/// recomputed, walking back at most `carryover.max_depth` years. A fresh
/// record in the cache table stands in for the recomputation when that walk
/// would reach the hire year anyway, so the result never depends on what is
/// cached.
#[derive(Clone)]
pub struct BalanceCalculator {
    ledger: LedgerReader,
    policy: AccrualPolicy,
    snapshots: Option<Arc<BalanceTable>>,
}

impl BalanceCalculator {
    /// Creates a calculator without access to cached prior-year records.
    pub fn new(ledger: LedgerReader, policy: AccrualPolicy) -> Self {
        Self {
            ledger,
            policy,
            snapshots: None,
        }
    }

    /// Lets carryover resolution reuse fresh records from `table`.
    pub fn with_snapshots(mut self, table: Arc<BalanceTable>) -> Self {
        self.snapshots = Some(table);
        self
    }

    /// Returns the accrual policy in use.
    pub fn policy(&self) -> &AccrualPolicy {
        &self.policy
    }

    /// Computes the balance for `user_id` in `year`.
    ///
    /// The record's `computed_at` is taken before the ledger is read, so it
    /// is the as-of time of the data the record reflects.
    ///
    /// # Errors
    ///
    /// `UserNotFound` if the user is unknown, or any storage error raised
    /// while reading the ledger.
    pub fn compute_balance(&self, user_id: &str, year: i32) -> EngineResult<BalanceRecord> {
        let started = Instant::now();
        let computed_at = Utc::now();

        let employee = self.ledger.employee(user_id)?;
        let entitlement = self.entitlement_at_depth(&employee, year, 0)?;
        let requests = self.ledger.requests_for_known_user(user_id, year)?;
        let usage = summarize_usage(&requests, year, self.policy.split_across_years);

        let record = BalanceRecord::new(
            user_id,
            year,
            entitlement.total_hours,
            usage.used_hours,
            usage.pending_hours,
            computed_at,
        );

        if let Some(inconsistency) = record.inconsistency() {
            warn!(
                user_id,
                year,
                available_hours = %record.available_hours,
                committed_hours = %inconsistency.committed_hours,
                "BalanceInconsistency: {}",
                inconsistency
            );
        }

        info!(
            user_id,
            year,
            total_hours = %record.total_hours,
            used_hours = %record.used_hours,
            pending_hours = %record.pending_hours,
            available_hours = %record.available_hours,
            carryover_hours = %entitlement.carryover_hours,
            capped = entitlement.capped,
            requests = usage.counted_requests,
            excluded = usage.excluded_requests,
            duration_us = started.elapsed().as_micros(),
            "Computed balance"
        );
        Ok(record)
    }

    /// Computes the entitlement for `employee` in `year`, resolving
    /// carryover as needed.
    pub fn compute_entitlement(
        &self,
        employee: &Employee,
        year: i32,
    ) -> EngineResult<EntitlementResult> {
        self.entitlement_at_depth(employee, year, 0)
    }

    fn entitlement_at_depth(
        &self,
        employee: &Employee,
        year: i32,
        depth: u32,
    ) -> EngineResult<EntitlementResult> {
        let prior_available = match year.checked_sub(1) {
            Some(prior_year) if self.policy.carryover.enabled => {
                self.prior_available(employee, prior_year, depth + 1)?
            }
            _ => Decimal::ZERO,
        };
        Ok(compute_entitlement(
            &self.policy,
            employee,
            year,
            prior_available,
        ))
    }

    fn prior_available(&self, employee: &Employee, year: i32, depth: u32) -> EngineResult<Decimal> {
        if depth > self.policy.carryover.max_depth || year < employee.hire_year() {
            return Ok(Decimal::ZERO);
        }

        let snapshots = self
            .snapshots
            .as_ref()
            .filter(|_| self.snapshot_covers(employee, year, depth));
        if let Some(table) = snapshots {
            let key = BalanceKey::new(employee.user_id.clone(), year);
            if let Some(cached) = table.find(&key)?.filter(|c| c.is_fresh()) {
                debug!(key = %key, "Using cached balance for carryover");
                return Ok(cached.record.available_hours);
            }
        }

        let entitlement = self.entitlement_at_depth(employee, year, depth)?;
        let requests = self
            .ledger
            .requests_for_known_user(&employee.user_id, year)?;
        let usage = summarize_usage(&requests, year, self.policy.split_across_years);
        debug!(
            user_id = %employee.user_id,
            year,
            depth,
            "Recomputed prior year balance for carryover"
        );
        Ok(entitlement.total_hours - usage.used_hours - usage.pending_hours)
    }

    /// A cached record for `year` walked back its own `max_depth` years,
    /// while recomputing at `depth` walks back `max_depth - depth`. The two
    /// agree only when the shorter walk already reaches the hire year.
    fn snapshot_covers(&self, employee: &Employee, year: i32, depth: u32) -> bool {
        let remaining = i64::from(self.policy.carryover.max_depth) - i64::from(depth);
        i64::from(year) - remaining <= i64::from(employee.hire_year())
    }
}

impl BalanceSource for BalanceCalculator {
    fn compute_balance(&self, user_id: &str, year: i32) -> EngineResult<BalanceRecord> {
        BalanceCalculator::compute_balance(self, user_id, year)
    }
}
