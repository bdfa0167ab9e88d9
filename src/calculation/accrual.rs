//! Accrual entitlement calculation.
//!
//! This module computes how many hours an employee is entitled to for a
//! year: the hours accrued under the policy, prorated by the days the
//! employee was employed, plus any carryover from the prior year, clamped
//! to the policy cap.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::config::{AccrualPeriod, AccrualPolicy};
use crate::models::{Employee, inclusive_days, round_hours, year_bounds};

/// The breakdown of an employee's entitlement for one year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementResult {
    /// Hours accrued during the year, prorated and rounded.
    pub accrued_hours: Decimal,
    /// Hours carried in from the prior year after the carryover limit.
    pub carryover_hours: Decimal,
    /// The entitlement after the cap.
    pub total_hours: Decimal,
    /// Whether the cap reduced the entitlement.
    pub capped: bool,
}

/// Returns the dates within `year` on which the employee accrues leave.
///
/// Accrual starts at the later of the hire date and the policy's effective
/// date, and stops at the termination date.
pub fn accrual_window(
    policy: &AccrualPolicy,
    employee: &Employee,
    year: i32,
) -> Option<(NaiveDate, NaiveDate)> {
    let (start, end) = employee.employment_window(year)?;
    let start = start.max(policy.effective_date);
    (start <= end).then_some((start, end))
}

/// Calculates the hours accrued in `year`, before carryover and cap.
///
/// Monthly policies earn `rate_per_period` for every month, scaled by the
/// fraction of that month's days inside the accrual window. Annual
/// policies scale `rate_per_period` by the fraction of the year's days
/// inside the window. The sum is rounded to 2 decimal places.
///
/// # Examples
///
/// ```
/// use pto_balance_engine::calculation::calculate_accrued_hours;
/// use pto_balance_engine::config::AccrualPolicy;
/// use pto_balance_engine::models::Employee;
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let policy = AccrualPolicy::monthly(Decimal::from(10));
/// let employee = Employee {
///     user_id: "emp_001".to_string(),
///     hire_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
///     termination_date: None,
///     email: None,
/// };
/// assert_eq!(calculate_accrued_hours(&policy, &employee, 2024), Decimal::from(60));
/// ```
pub fn calculate_accrued_hours(policy: &AccrualPolicy, employee: &Employee, year: i32) -> Decimal {
    let Some((start, end)) = accrual_window(policy, employee, year) else {
        return Decimal::ZERO;
    };

    let accrued = match policy.period {
        AccrualPeriod::Monthly => (1..=12)
            .filter_map(|month| month_bounds(year, month))
            .map(|(month_start, month_end)| {
                let overlap = overlap_days(start, end, month_start, month_end);
                if overlap == 0 {
                    Decimal::ZERO
                } else {
                    policy.rate_per_period * Decimal::from(overlap)
                        / Decimal::from(inclusive_days(month_start, month_end))
                }
            })
            .sum::<Decimal>(),
        AccrualPeriod::Annual => match year_bounds(year) {
            Some((year_start, year_end)) => {
                policy.rate_per_period * Decimal::from(inclusive_days(start, end))
                    / Decimal::from(inclusive_days(year_start, year_end))
            }
            None => Decimal::ZERO,
        },
    };

    round_hours(accrued)
}

/// Limits a prior year's unused balance to what may be carried over.
///
/// Negative balances carry nothing. Returns zero when carryover is disabled.
pub fn carryover_allowance(policy: &AccrualPolicy, prior_available: Decimal) -> Decimal {
    if !policy.carryover.enabled {
        return Decimal::ZERO;
    }
    let carried = prior_available.max(Decimal::ZERO);
    match policy.carryover.max_hours {
        Some(max) => carried.min(max),
        None => carried,
    }
}

/// Computes the full entitlement for `year`.
///
/// `prior_available` is the prior year's available balance; it only
/// counts when the policy enables carryover.
pub fn compute_entitlement(
    policy: &AccrualPolicy,
    employee: &Employee,
    year: i32,
    prior_available: Decimal,
) -> EntitlementResult {
    let accrued_hours = calculate_accrued_hours(policy, employee, year);
    let carryover_hours = carryover_allowance(policy, prior_available);
    let uncapped = accrued_hours + carryover_hours;

    let (total_hours, capped) = match policy.cap_hours {
        Some(cap) if uncapped > cap => (cap, true),
        _ => (uncapped, false),
    };

    EntitlementResult {
        accrued_hours,
        carryover_hours,
        total_hours,
        capped,
    }
}

fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?.pred_opt()?
    };
    Some((start, end))
}

fn overlap_days(a_start: NaiveDate, a_end: NaiveDate, b_start: NaiveDate, b_end: NaiveDate) -> i64 {
    let start = a_start.max(b_start);
    let end = a_end.min(b_end);
    if start > end {
        0
    } else {
        inclusive_days(start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn employee(hire: NaiveDate, termination: Option<NaiveDate>) -> Employee {
        Employee {
            user_id: "emp_001".to_string(),
            hire_date: hire,
            termination_date: termination,
            email: None,
        }
    }

    #[test]
    fn test_full_year_monthly_accrual() {
        let policy = AccrualPolicy::monthly(dec("10"));
        let e = employee(date(2019, 5, 20), None);
        assert_eq!(calculate_accrued_hours(&policy, &e, 2024), dec("120"));
    }

    #[test]
    fn test_hired_mid_year_on_first_of_month() {
        let policy = AccrualPolicy::monthly(dec("10"));
        let e = employee(date(2024, 7, 1), None);
        assert_eq!(calculate_accrued_hours(&policy, &e, 2024), dec("60"));
    }

    #[test]
    fn test_partial_first_month_is_prorated_by_days() {
        // Hired 2024-07-16: 16 of 31 July days, then 5 full months.
        let policy = AccrualPolicy::monthly(dec("10"));
        let e = employee(date(2024, 7, 16), None);
        // 10 * 16 / 31 = 5.1612.. -> 55.16
        assert_eq!(calculate_accrued_hours(&policy, &e, 2024), dec("55.16"));
    }

    #[test]
    fn test_termination_stops_accrual() {
        let policy = AccrualPolicy::monthly(dec("10"));
        let e = employee(date(2020, 1, 1), Some(date(2024, 3, 31)));
        assert_eq!(calculate_accrued_hours(&policy, &e, 2024), dec("30"));
        assert_eq!(calculate_accrued_hours(&policy, &e, 2025), Decimal::ZERO);
    }

    #[test]
    fn test_no_accrual_before_hire_year() {
        let policy = AccrualPolicy::monthly(dec("10"));
        let e = employee(date(2024, 7, 1), None);
        assert_eq!(calculate_accrued_hours(&policy, &e, 2023), Decimal::ZERO);
    }

    #[test]
    fn test_effective_date_limits_accrual() {
        let mut policy = AccrualPolicy::monthly(dec("10"));
        policy.effective_date = date(2024, 10, 1);
        let e = employee(date(2020, 1, 1), None);
        assert_eq!(calculate_accrued_hours(&policy, &e, 2024), dec("30"));
        assert_eq!(calculate_accrued_hours(&policy, &e, 2023), Decimal::ZERO);
    }

    #[test]
    fn test_annual_accrual_prorated_by_days() {
        let mut policy = AccrualPolicy::monthly(dec("120"));
        policy.period = AccrualPeriod::Annual;
        // 2023 has 365 days; hired 2023-07-02 leaves 183 days.
        let e = employee(date(2023, 7, 2), None);
        // 120 * 183 / 365 = 60.164.. -> 60.16
        assert_eq!(calculate_accrued_hours(&policy, &e, 2023), dec("60.16"));
        assert_eq!(calculate_accrued_hours(&policy, &e, 2024), dec("120"));
    }

    #[test]
    fn test_cap_clamps_total() {
        let mut policy = AccrualPolicy::monthly(dec("10"));
        policy.cap_hours = Some(dec("100"));
        let e = employee(date(2020, 1, 1), None);
        let result = compute_entitlement(&policy, &e, 2024, Decimal::ZERO);
        assert_eq!(result.accrued_hours, dec("120"));
        assert_eq!(result.total_hours, dec("100"));
        assert!(result.capped);
    }

    #[test]
    fn test_carryover_ignored_when_disabled() {
        let policy = AccrualPolicy::monthly(dec("10"));
        let e = employee(date(2020, 1, 1), None);
        let result = compute_entitlement(&policy, &e, 2024, dec("25"));
        assert_eq!(result.carryover_hours, Decimal::ZERO);
        assert_eq!(result.total_hours, dec("120"));
    }

    #[test]
    fn test_carryover_is_limited_and_floored() {
        let mut policy = AccrualPolicy::monthly(dec("10"));
        policy.carryover.enabled = true;
        policy.carryover.max_hours = Some(dec("16"));

        assert_eq!(carryover_allowance(&policy, dec("25")), dec("16"));
        assert_eq!(carryover_allowance(&policy, dec("4.5")), dec("4.5"));
        assert_eq!(carryover_allowance(&policy, dec("-8")), Decimal::ZERO);
    }

    #[test]
    fn test_cap_applies_after_carryover() {
        let mut policy = AccrualPolicy::monthly(dec("10"));
        policy.carryover.enabled = true;
        policy.cap_hours = Some(dec("130"));
        let e = employee(date(2020, 1, 1), None);

        let result = compute_entitlement(&policy, &e, 2024, dec("40"));
        assert_eq!(result.carryover_hours, dec("40"));
        assert_eq!(result.total_hours, dec("130"));
        assert!(result.capped);
    }

    #[test]
    fn test_month_bounds_handles_february() {
        assert_eq!(
            month_bounds(2024, 2),
            Some((date(2024, 2, 1), date(2024, 2, 29)))
        );
        assert_eq!(
            month_bounds(2023, 12),
            Some((date(2023, 12, 1), date(2023, 12, 31)))
        );
    }
}
