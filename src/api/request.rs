//! Request types for the PTO balance API.
//!
//! This module defines the path parameters shared by the balance endpoints.

use serde::{Deserialize, Serialize};

/// Path parameters of `/balances/:user_id/:year` and its sub-routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancePath {
    /// The employee.
    pub user_id: String,
    /// The leave year.
    pub year: i32,
}
