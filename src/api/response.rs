//! Response types for the PTO balance API.
//!
//! This module defines the success bodies and the error response structures
//! for the HTTP API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cache::CacheState;
use crate::error::EngineError;
use crate::models::{BalanceInconsistency, BalanceRecord};

/// Body of `GET /balances/:user_id/:year`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceResponse {
    /// The employee.
    pub user_id: String,
    /// The leave year.
    pub year: i32,
    /// Entitled hours.
    pub total_hours: Decimal,
    /// Hours still available.
    pub available_hours: Decimal,
    /// Hours taken by approved requests.
    pub used_hours: Decimal,
    /// Hours held by pending requests.
    pub pending_hours: Decimal,
    /// As-of time of the balance.
    pub computed_at: DateTime<Utc>,
    /// Present when the ledger over-allocates the entitlement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inconsistency: Option<BalanceInconsistency>,
}

impl From<BalanceRecord> for BalanceResponse {
    fn from(record: BalanceRecord) -> Self {
        let inconsistency = record.inconsistency();
        Self {
            user_id: record.user_id,
            year: record.year,
            total_hours: record.total_hours,
            available_hours: record.available_hours,
            used_hours: record.used_hours,
            pending_hours: record.pending_hours,
            computed_at: record.computed_at,
            inconsistency,
        }
    }
}

/// Body of `POST /balances/:user_id/:year/invalidate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidateResponse {
    /// The employee.
    pub user_id: String,
    /// The leave year.
    pub year: i32,
    /// The cache state before invalidation.
    pub previous_state: CacheState,
}

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Creates a validation error response.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Creates an internal error response.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

/// API error with HTTP status code.
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

impl From<EngineError> for ApiErrorResponse {
    fn from(error: EngineError) -> Self {
        let code = error.code();
        let message = error.to_string();
        let (status, details) = match &error {
            EngineError::UserNotFound { user_id } => (
                StatusCode::NOT_FOUND,
                format!("No employee directory entry for '{}'", user_id),
            ),
            EngineError::PolicyConfig { .. }
            | EngineError::ConfigNotFound { .. }
            | EngineError::ConfigParseError { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "The accrual policy configuration is unusable".to_string(),
            ),
            EngineError::StorageUnavailable { transient, .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                if *transient {
                    "Storage is temporarily unavailable, retry later".to_string()
                } else {
                    "Storage is unavailable".to_string()
                },
            ),
            EngineError::InvalidLedgerRow { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "The leave ledger contains a malformed row".to_string(),
            ),
            EngineError::InvalidCacheRow { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "The balance cache contains a malformed row".to_string(),
            ),
        };

        ApiErrorResponse {
            status,
            error: ApiError::with_details(code, message, details),
        }
    }
}
