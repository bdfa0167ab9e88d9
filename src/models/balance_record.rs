//! Balance record models.
//!
//! This module contains the [`BalanceRecord`] type, the derived snapshot of an
//! employee's leave standing for a year, and the [`BalanceInconsistency`]
//! warning raised when the ledger over-allocates an entitlement.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The cache key of a balance record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BalanceKey {
    /// The employee.
    pub user_id: String,
    /// The leave year.
    pub year: i32,
}

impl BalanceKey {
    /// Creates a key for `user_id` and `year`.
    pub fn new(user_id: impl Into<String>, year: i32) -> Self {
        Self {
            user_id: user_id.into(),
            year,
        }
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.year)
    }
}

/// An employee's leave balance for one year.
///
/// `available_hours` always equals `total_hours - used_hours - pending_hours`.
/// It is negative only when the ledger holds more approved and pending hours
/// than the entitlement, see [`BalanceRecord::inconsistency`].
///
/// # Example
///
/// ```
/// use pto_balance_engine::models::BalanceRecord;
/// use chrono::Utc;
/// use rust_decimal::Decimal;
///
/// let record = BalanceRecord::new(
///     "emp_001",
///     2024,
///     Decimal::from(60),
///     Decimal::from(8),
///     Decimal::from(4),
///     Utc::now(),
/// );
/// assert_eq!(record.available_hours, Decimal::from(48));
/// assert!(record.inconsistency().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    /// The employee.
    pub user_id: String,
    /// The leave year.
    pub year: i32,
    /// Hours the employee is entitled to for the year.
    pub total_hours: Decimal,
    /// Hours still available to request.
    pub available_hours: Decimal,
    /// Hours consumed by approved requests.
    pub used_hours: Decimal,
    /// Hours reserved by pending requests.
    pub pending_hours: Decimal,
    /// As-of time of the ledger snapshot this record was derived from.
    pub computed_at: DateTime<Utc>,
}

impl BalanceRecord {
    /// Builds a record, deriving `available_hours` from the other totals.
    pub fn new(
        user_id: impl Into<String>,
        year: i32,
        total_hours: Decimal,
        used_hours: Decimal,
        pending_hours: Decimal,
        computed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            year,
            total_hours,
            available_hours: total_hours - used_hours - pending_hours,
            used_hours,
            pending_hours,
            computed_at,
        }
    }

    /// The cache key of this record.
    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.user_id.clone(), self.year)
    }

    /// Returns the over-allocation warning if available hours went negative.
    pub fn inconsistency(&self) -> Option<BalanceInconsistency> {
        (self.available_hours < Decimal::ZERO).then(|| BalanceInconsistency {
            user_id: self.user_id.clone(),
            year: self.year,
            total_hours: self.total_hours,
            committed_hours: self.used_hours + self.pending_hours,
            available_hours: self.available_hours,
        })
    }

    /// Compares the hour totals, ignoring `computed_at`.
    pub fn same_balance(&self, other: &BalanceRecord) -> bool {
        self.user_id == other.user_id
            && self.year == other.year
            && self.total_hours == other.total_hours
            && self.available_hours == other.available_hours
            && self.used_hours == other.used_hours
            && self.pending_hours == other.pending_hours
    }
}

/// Warning raised when approved and pending hours exceed the entitlement.
///
/// This is reported, not fatal: the record is still stored with its
/// negative `available_hours` so the over-allocation stays visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceInconsistency {
    /// The employee.
    pub user_id: String,
    /// The leave year.
    pub year: i32,
    /// The entitlement for the year.
    pub total_hours: Decimal,
    /// Approved plus pending hours.
    pub committed_hours: Decimal,
    /// The negative available balance.
    pub available_hours: Decimal,
}

impl fmt::Display for BalanceInconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "balance for {}/{} is over-allocated: {} hours committed against {} entitled ({} available)",
            self.user_id, self.year, self.committed_hours, self.total_hours, self.available_hours
        )
    }
}
