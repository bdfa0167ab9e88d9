//! HTTP API module for the PTO balance engine.
//!
//! This module provides the REST endpoints for reading and invalidating
//! balances and for the cache maintenance commands.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::create_router;
pub use request::BalancePath;
pub use response::{ApiError, BalanceResponse, InvalidateResponse};
pub use state::AppState;
