//! Calculation logic for the PTO balance engine.
//!
//! This module contains accrual entitlement (proration, carryover and cap),
//! leave usage summarization, and the balance calculator that combines them
//! into a [`BalanceRecord`].

mod accrual;
mod balance;
mod usage;

pub use accrual::{
    EntitlementResult, accrual_window, calculate_accrued_hours, carryover_allowance,
    compute_entitlement,
};
pub use balance::BalanceCalculator;
pub use usage::{UsageSummary, summarize_usage};

use crate::error::EngineResult;
use crate::models::BalanceRecord;

/// Anything that can derive a fresh balance for a user and year.
///
/// The cache depends on this trait rather than on [`BalanceCalculator`]
/// directly.
pub trait BalanceSource: Send + Sync {
    /// Computes the balance for `user_id` in `year` from the source of truth.
    fn compute_balance(&self, user_id: &str, year: i32) -> EngineResult<BalanceRecord>;
}
