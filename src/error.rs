//! Error types for the PTO balance engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for all error conditions that can occur while computing and caching
//! leave balances.

use thiserror::Error;

/// The main error type for the PTO balance engine.
///
/// All core operations return this error type. It is `Clone` so the same
/// failure can be reported to every caller waiting on a shared computation.
///
/// # Example
///
/// ```
/// use pto_balance_engine::error::EngineError;
///
/// let error = EngineError::UserNotFound {
///     user_id: "emp_404".to_string(),
/// };
/// assert_eq!(error.to_string(), "User not found: emp_404");
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The user is not present in the employee directory.
    #[error("User not found: {user_id}")]
    UserNotFound {
        /// The user that was not found.
        user_id: String,
    },

    /// The accrual policy is malformed.
    #[error("Invalid accrual policy field '{field}': {message}")]
    PolicyConfig {
        /// The offending policy field.
        field: String,
        /// A description of what made the field invalid.
        message: String,
    },

    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// The storage collaborator failed.
    #[error("Storage unavailable for table '{table}': {message}")]
    StorageUnavailable {
        /// The table being accessed.
        table: String,
        /// A description of the I/O failure.
        message: String,
        /// Whether a retry may succeed.
        transient: bool,
    },

    /// A ledger row could not be decoded.
    #[error("Invalid ledger row {row} in '{table}': {message}")]
    InvalidLedgerRow {
        /// The ledger table.
        table: String,
        /// The 1-based row number.
        row: usize,
        /// A description of the decoding failure.
        message: String,
    },

    /// A cache row could not be decoded.
    #[error("Invalid cache row {row}: {message}")]
    InvalidCacheRow {
        /// The 1-based row number.
        row: usize,
        /// A description of the decoding failure.
        message: String,
    },
}

impl EngineError {
    /// Returns true if this is a storage failure worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::StorageUnavailable {
                transient: true,
                ..
            }
        )
    }

    /// A stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::UserNotFound { .. } => "USER_NOT_FOUND",
            EngineError::PolicyConfig { .. } => "POLICY_CONFIG_ERROR",
            EngineError::ConfigNotFound { .. } | EngineError::ConfigParseError { .. } => {
                "CONFIG_ERROR"
            }
            EngineError::StorageUnavailable { .. } => "STORAGE_UNAVAILABLE",
            EngineError::InvalidLedgerRow { .. } => "INVALID_LEDGER_ROW",
            EngineError::InvalidCacheRow { .. } => "INVALID_CACHE_ROW",
        }
    }
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_not_found_displays_user() {
        let error = EngineError::UserNotFound {
            user_id: "emp_001".to_string(),
        };
        assert_eq!(error.to_string(), "User not found: emp_001");
    }

    #[test]
    fn test_policy_config_displays_field_and_message() {
        let error = EngineError::PolicyConfig {
            field: "rate_per_period".to_string(),
            message: "must not be negative".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid accrual policy field 'rate_per_period': must not be negative"
        );
    }

    #[test]
    fn test_config_parse_error_displays_path_and_message() {
        let error = EngineError::ConfigParseError {
            path: "/config/policy.yaml".to_string(),
            message: "invalid YAML syntax".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to parse configuration file '/config/policy.yaml': invalid YAML syntax"
        );
    }

    #[test]
    fn test_storage_unavailable_displays_table() {
        let error = EngineError::StorageUnavailable {
            table: "PtoBalances".to_string(),
            message: "disk full".to_string(),
            transient: false,
        };
        assert_eq!(
            error.to_string(),
            "Storage unavailable for table 'PtoBalances': disk full"
        );
    }

    #[test]
    fn test_invalid_ledger_row_displays_location() {
        let error = EngineError::InvalidLedgerRow {
            table: "LeaveRequests".to_string(),
            row: 3,
            message: "bad date".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid ledger row 3 in 'LeaveRequests': bad date"
        );
    }

    #[test]
    fn test_only_transient_storage_errors_are_retryable() {
        let transient = EngineError::StorageUnavailable {
            table: "t".to_string(),
            message: "timeout".to_string(),
            transient: true,
        };
        let persistent = EngineError::StorageUnavailable {
            table: "t".to_string(),
            message: "gone".to_string(),
            transient: false,
        };
        let not_found = EngineError::UserNotFound {
            user_id: "u".to_string(),
        };
        assert!(transient.is_transient());
        assert!(!persistent.is_transient());
        assert!(!not_found.is_transient());
    }

    #[test]
    fn test_error_codes() {
        let error = EngineError::ConfigNotFound {
            path: "x".to_string(),
        };
        assert_eq!(error.code(), "CONFIG_ERROR");
        let error = EngineError::InvalidCacheRow {
            row: 2,
            message: "x".to_string(),
        };
        assert_eq!(error.code(), "INVALID_CACHE_ROW");
    }

    #[test]
    fn test_errors_implement_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<EngineError>();
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn returns_not_found() -> EngineResult<()> {
            Err(EngineError::UserNotFound {
                user_id: "x".to_string(),
            })
        }

        fn propagates_error() -> EngineResult<()> {
            returns_not_found()?;
            Ok(())
        }

        assert!(propagates_error().is_err());
    }
}
