//! Leave request ledger model.
//!
//! This module contains the [`LeaveRequest`] record read from the request
//! ledger, its [`LeaveStatus`], and the date arithmetic used to attribute a
//! request's hours to a calendar year.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::round_hours;

/// Returns the first and last day of `year`, or `None` if the year is out of
/// chrono's supported range.
pub(crate) fn year_bounds(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

/// Inclusive count of days from `start` to `end`.
pub(crate) fn inclusive_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

/// Lifecycle status of a leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    /// Submitted and awaiting a decision. Reserves hours.
    Pending,
    /// Approved. Consumes hours.
    Approved,
    /// Declined by an approver.
    Rejected,
    /// Withdrawn after submission or approval.
    Cancelled,
}

impl LeaveStatus {
    /// The canonical lowercase name used in ledger rows.
    pub fn as_str(self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
            LeaveStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaveStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(LeaveStatus::Pending),
            "approved" => Ok(LeaveStatus::Approved),
            "rejected" => Ok(LeaveStatus::Rejected),
            "cancelled" | "canceled" => Ok(LeaveStatus::Cancelled),
            other => Err(format!("unknown leave status '{}'", other)),
        }
    }
}

/// A leave request as recorded in the ledger.
///
/// # Example
///
/// ```
/// use pto_balance_engine::models::{LeaveRequest, LeaveStatus};
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let request = LeaveRequest {
///     request_id: "req_001".to_string(),
///     user_id: "emp_001".to_string(),
///     year: 2024,
///     start_date: NaiveDate::from_ymd_opt(2024, 12, 30).unwrap(),
///     end_date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
///     hours_requested: Decimal::from(32),
///     status: LeaveStatus::Approved,
/// };
/// assert!(request.intersects_year(2025));
/// assert_eq!(request.hours_attributed_to(2025, true), Decimal::from(16));
/// assert_eq!(request.hours_attributed_to(2025, false), Decimal::ZERO);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    /// Ledger identifier of the request.
    pub request_id: String,
    /// The requesting employee.
    pub user_id: String,
    /// The leave year the request was filed under.
    pub year: i32,
    /// First day of leave (inclusive).
    pub start_date: NaiveDate,
    /// Last day of leave (inclusive).
    pub end_date: NaiveDate,
    /// Total hours requested across the whole date range.
    pub hours_requested: Decimal,
    /// Current status.
    pub status: LeaveStatus,
}

impl LeaveRequest {
    /// Returns true if any day of the request falls within `year`.
    pub fn intersects_year(&self, year: i32) -> bool {
        self.start_date.year() <= year && self.end_date.year() >= year
    }

    /// Number of calendar days covered by the request.
    pub fn calendar_days(&self) -> i64 {
        inclusive_days(self.start_date, self.end_date).max(1)
    }

    /// Number of the request's calendar days that fall inside `year`.
    pub fn days_in_year(&self, year: i32) -> i64 {
        let Some((year_start, year_end)) = year_bounds(year) else {
            return 0;
        };
        let start = self.start_date.max(year_start);
        let end = self.end_date.min(year_end);
        if start > end {
            0
        } else {
            inclusive_days(start, end)
        }
    }

    /// Hours of this request charged against `year`.
    ///
    /// With `split_across_years` the hours are divided by the fraction of
    /// calendar days inside the year, rounded to 2 decimal places. Otherwise
    /// every hour is charged to the year of the start date.
    pub fn hours_attributed_to(&self, year: i32, split_across_years: bool) -> Decimal {
        if !split_across_years {
            return if self.start_date.year() == year {
                self.hours_requested
            } else {
                Decimal::ZERO
            };
        }

        let inside = self.days_in_year(year);
        let total = self.calendar_days();
        if inside == 0 {
            return Decimal::ZERO;
        }
        if inside >= total {
            return self.hours_requested;
        }
        round_hours(self.hours_requested * Decimal::from(inside) / Decimal::from(total))
    }
}
