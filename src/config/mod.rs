//! Configuration loading and management for the PTO balance engine.
//!
//! This module loads the accrual policy from YAML, including the accrual
//! rate and period, cap, carryover rules, year-boundary splitting and
//! notification thresholds.
//!
//! # Example
//!
//! ```no_run
//! use pto_balance_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config").unwrap();
//! println!("Cap: {:?}", config.policy().cap_hours);
//! ```

mod loader;
mod types;

pub use loader::{ConfigLoader, POLICY_FILE_NAME};
pub use types::{
    AccrualPeriod, AccrualPolicy, CarryoverRules, DEFAULT_CARRYOVER_DEPTH, NotificationConfig,
    PolicyFile,
};
