//! Configuration types for balance computation.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from the YAML policy file.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Default number of prior years walked when resolving carryover.
pub const DEFAULT_CARRYOVER_DEPTH: u32 = 3;

/// How often `rate_per_period` hours are earned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccrualPeriod {
    /// `rate_per_period` hours per calendar month.
    Monthly,
    /// `rate_per_period` hours per calendar year.
    Annual,
}

/// Rules for carrying unused hours into the next year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryoverRules {
    /// Whether unused hours carry over at all.
    #[serde(default)]
    pub enabled: bool,
    /// Upper bound on hours carried into a year.
    #[serde(default)]
    pub max_hours: Option<Decimal>,
    /// How many prior years may be recomputed to resolve a carryover chain.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

fn default_max_depth() -> u32 {
    DEFAULT_CARRYOVER_DEPTH
}

impl Default for CarryoverRules {
    fn default() -> Self {
        Self {
            enabled: false,
            max_hours: None,
            max_depth: DEFAULT_CARRYOVER_DEPTH,
        }
    }
}

/// The process-wide accrual policy.
///
/// # Example
///
/// ```
/// use pto_balance_engine::config::{AccrualPeriod, AccrualPolicy};
/// use rust_decimal::Decimal;
///
/// let policy = AccrualPolicy::monthly(Decimal::from(10));
/// assert_eq!(policy.period, AccrualPeriod::Monthly);
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualPolicy {
    /// Hours earned per accrual period.
    pub rate_per_period: Decimal,
    /// The accrual period.
    pub period: AccrualPeriod,
    /// Nothing accrues before this date.
    pub effective_date: NaiveDate,
    /// Optional ceiling on the yearly entitlement, carryover included.
    #[serde(default)]
    pub cap_hours: Option<Decimal>,
    /// Carryover of unused hours from the prior year.
    #[serde(default)]
    pub carryover: CarryoverRules,
    /// Split requests that span a year boundary by days in each year.
    #[serde(default)]
    pub split_across_years: bool,
}

impl AccrualPolicy {
    /// A monthly policy with no cap, no carryover and no splitting that has
    /// always been in effect.
    pub fn monthly(rate_per_period: Decimal) -> Self {
        Self {
            rate_per_period,
            period: AccrualPeriod::Monthly,
            effective_date: NaiveDate::MIN,
            cap_hours: None,
            carryover: CarryoverRules::default(),
            split_across_years: false,
        }
    }

    /// Checks the policy for values the engine cannot work with.
    pub fn validate(&self) -> EngineResult<()> {
        if self.rate_per_period < Decimal::ZERO {
            return Err(policy_error("rate_per_period", "must not be negative"));
        }
        if self.cap_hours.is_some_and(|cap| cap < Decimal::ZERO) {
            return Err(policy_error("cap_hours", "must not be negative"));
        }
        if self
            .carryover
            .max_hours
            .is_some_and(|max| max < Decimal::ZERO)
        {
            return Err(policy_error("carryover.max_hours", "must not be negative"));
        }
        if self.carryover.enabled && self.carryover.max_depth == 0 {
            return Err(policy_error(
                "carryover.max_depth",
                "must be at least 1 when carryover is enabled",
            ));
        }
        Ok(())
    }
}

fn policy_error(field: &str, message: &str) -> EngineError {
    EngineError::PolicyConfig {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Settings for material-change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Minimum change in available hours that triggers a notification.
    /// Notifications are off when unset.
    #[serde(default)]
    pub threshold_hours: Option<Decimal>,
}

/// The policy file structure (`policy.yaml`).
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyFile {
    /// The accrual policy.
    pub accrual: AccrualPolicy,
    /// Notification settings.
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_policy_with_defaults() {
        let yaml = r#"
rate_per_period: 10
period: monthly
effective_date: 2020-01-01
"#;
        let policy: AccrualPolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy.rate_per_period, Decimal::from(10));
        assert_eq!(policy.cap_hours, None);
        assert!(!policy.carryover.enabled);
        assert_eq!(policy.carryover.max_depth, DEFAULT_CARRYOVER_DEPTH);
        assert!(!policy.split_across_years);
    }

    #[test]
    fn test_deserialize_full_policy() {
        let yaml = r#"
rate_per_period: 80
period: annual
effective_date: 2020-01-01
cap_hours: 120
split_across_years: true
carryover:
  enabled: true
  max_hours: 40
  max_depth: 2
"#;
        let policy: AccrualPolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy.period, AccrualPeriod::Annual);
        assert_eq!(policy.cap_hours, Some(Decimal::from(120)));
        assert_eq!(policy.carryover.max_hours, Some(Decimal::from(40)));
        assert_eq!(policy.carryover.max_depth, 2);
        assert!(policy.split_across_years);
    }

    #[test]
    fn test_validate_rejects_negative_rate() {
        let policy = AccrualPolicy::monthly(Decimal::from(-1));
        assert_eq!(
            policy.validate(),
            Err(EngineError::PolicyConfig {
                field: "rate_per_period".to_string(),
                message: "must not be negative".to_string(),
            })
        );
    }

    #[test]
    fn test_validate_rejects_zero_depth_with_carryover() {
        let mut policy = AccrualPolicy::monthly(Decimal::from(10));
        policy.carryover.enabled = true;
        policy.carryover.max_depth = 0;
        assert!(matches!(
            policy.validate(),
            Err(EngineError::PolicyConfig { field, .. }) if field == "carryover.max_depth"
        ));
    }

    #[test]
    fn test_validate_rejects_negative_cap() {
        let mut policy = AccrualPolicy::monthly(Decimal::from(10));
        policy.cap_hours = Some(Decimal::from(-5));
        assert!(policy.validate().is_err());
    }
}
