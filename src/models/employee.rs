//! Employee directory model.
//!
//! This module defines the [`Employee`] struct used by the ledger to decide
//! whether a user is known and by the accrual policy to prorate entitlement.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::leave_request::year_bounds;

/// Represents an employee in the leave ledger's directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Unique identifier for the employee.
    pub user_id: String,
    /// The date the employee started employment.
    pub hire_date: NaiveDate,
    /// The last day of employment, if the employee has left.
    #[serde(default)]
    pub termination_date: Option<NaiveDate>,
    /// Address for balance change notifications.
    #[serde(default)]
    pub email: Option<String>,
}

impl Employee {
    /// Returns the inclusive range of dates within `year` during which the
    /// employee was employed, or `None` if there is no overlap.
    ///
    /// # Examples
    ///
    /// ```
    /// use pto_balance_engine::models::Employee;
    /// use chrono::NaiveDate;
    ///
    /// let employee = Employee {
    ///     user_id: "emp_001".to_string(),
    ///     hire_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
    ///     termination_date: None,
    ///     email: None,
    /// };
    /// let (start, end) = employee.employment_window(2024).unwrap();
    /// assert_eq!(start, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
    /// assert_eq!(end, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    /// assert!(employee.employment_window(2023).is_none());
    /// ```
    pub fn employment_window(&self, year: i32) -> Option<(NaiveDate, NaiveDate)> {
        let (year_start, year_end) = year_bounds(year)?;
        let start = self.hire_date.max(year_start);
        let end = match self.termination_date {
            Some(terminated) => terminated.min(year_end),
            None => year_end,
        };
        (start <= end).then_some((start, end))
    }

    /// The calendar year the employee was hired in.
    pub fn hire_year(&self) -> i32 {
        self.hire_date.year()
    }
}
