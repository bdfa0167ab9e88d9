//! Leave usage summarization.
//!
//! Approved requests consume hours, pending requests reserve them, and
//! rejected or cancelled requests are ignored.

use rust_decimal::Decimal;

use crate::models::{LeaveRequest, LeaveStatus};

/// Hours charged against a year by the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageSummary {
    /// Hours from approved requests.
    pub used_hours: Decimal,
    /// Hours from pending requests.
    pub pending_hours: Decimal,
    /// Requests that contributed hours.
    pub counted_requests: usize,
    /// Rejected and cancelled requests that were skipped.
    pub excluded_requests: usize,
}

/// Sums approved and pending hours attributed to `year`.
///
/// # Examples
///
/// ```
/// use pto_balance_engine::calculation::summarize_usage;
/// use pto_balance_engine::models::{LeaveRequest, LeaveStatus};
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
/// let request = |id: &str, hours: i64, status| LeaveRequest {
///     request_id: id.to_string(),
///     user_id: "emp_001".to_string(),
///     year: 2024,
///     start_date: day,
///     end_date: day,
///     hours_requested: Decimal::from(hours),
///     status,
/// };
/// let summary = summarize_usage(
///     &[
///         request("a", 8, LeaveStatus::Approved),
///         request("b", 4, LeaveStatus::Pending),
///         request("c", 6, LeaveStatus::Cancelled),
///     ],
///     2024,
///     false,
/// );
/// assert_eq!(summary.used_hours, Decimal::from(8));
/// assert_eq!(summary.pending_hours, Decimal::from(4));
/// assert_eq!(summary.excluded_requests, 1);
/// ```
pub fn summarize_usage(
    requests: &[LeaveRequest],
    year: i32,
    split_across_years: bool,
) -> UsageSummary {
    requests
        .iter()
        .fold(UsageSummary::default(), |mut summary, request| {
            match request.status {
                LeaveStatus::Approved => {
                    summary.used_hours += request.hours_attributed_to(year, split_across_years);
                    summary.counted_requests += 1;
                }
                LeaveStatus::Pending => {
                    summary.pending_hours += request.hours_attributed_to(year, split_across_years);
                    summary.counted_requests += 1;
                }
                LeaveStatus::Rejected | LeaveStatus::Cancelled => {
                    summary.excluded_requests += 1;
                }
            }
            summary
        })
}
