//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading the accrual
//! policy from a YAML file.

use std::fs;
use std::path::Path;

use rust_decimal::Decimal;
use tracing::info;

use crate::error::{EngineError, EngineResult};

use super::types::{AccrualPolicy, NotificationConfig, PolicyFile};

/// File name of the policy inside a configuration directory.
pub const POLICY_FILE_NAME: &str = "policy.yaml";

/// Loads and provides access to the engine configuration.
///
/// # Directory Structure
///
/// ```text
/// config/
/// └── policy.yaml   # Accrual policy and notification settings
/// ```
///
/// # Example
///
/// ```no_run
/// use pto_balance_engine::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config")?;
/// println!("Accruing {} hours per period", loader.policy().rate_per_period);
/// # Ok::<(), pto_balance_engine::error::EngineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    policy: AccrualPolicy,
    notifications: NotificationConfig,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` on success, or an error if:
    /// - `policy.yaml` is missing (`ConfigNotFound`)
    /// - the file contains invalid YAML or misses a required field (`ConfigParseError`)
    /// - the policy values are unusable (`PolicyConfig`)
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let policy_path = path.as_ref().join(POLICY_FILE_NAME);
        let file = Self::load_yaml::<PolicyFile>(&policy_path)?;
        let loader = Self::from_parts(file.accrual, file.notifications)?;

        info!(
            path = %policy_path.display(),
            rate_per_period = %loader.policy.rate_per_period,
            period = ?loader.policy.period,
            carryover = loader.policy.carryover.enabled,
            "Loaded accrual policy"
        );
        Ok(loader)
    }

    /// Builds a loader from an in-memory policy, validating it.
    pub fn from_parts(
        policy: AccrualPolicy,
        notifications: NotificationConfig,
    ) -> EngineResult<Self> {
        policy.validate()?;
        if notifications
            .threshold_hours
            .is_some_and(|threshold| threshold < Decimal::ZERO)
        {
            return Err(EngineError::PolicyConfig {
                field: "notifications.threshold_hours".to_string(),
                message: "must not be negative".to_string(),
            });
        }
        Ok(Self {
            policy,
            notifications,
        })
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Returns the accrual policy.
    pub fn policy(&self) -> &AccrualPolicy {
        &self.policy
    }

    /// Returns the notification settings.
    pub fn notifications(&self) -> &NotificationConfig {
        &self.notifications
    }
}
