//! Core data models for the PTO balance engine.
//!
//! This module contains the ledger records the engine reads and the balance
//! records it derives and caches.

mod balance_record;
mod employee;
mod leave_request;

use rust_decimal::{Decimal, RoundingStrategy};

pub use balance_record::{BalanceInconsistency, BalanceKey, BalanceRecord};
pub use employee::Employee;
pub use leave_request::{LeaveRequest, LeaveStatus};

pub(crate) use leave_request::{inclusive_days, year_bounds};

/// Rounds an hour amount to 2 decimal places, midpoints away from zero.
pub(crate) fn round_hours(hours: Decimal) -> Decimal {
    hours.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
