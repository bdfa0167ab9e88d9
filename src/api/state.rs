//! Application state for the PTO balance API.
//!
//! This module defines the shared application state that is available
//! to all request handlers.

use std::sync::Arc;

use crate::engine::BalanceEngine;

/// Shared application state.
///
/// Holds the engine every handler reads balances from.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<BalanceEngine>,
}

impl AppState {
    /// Creates a new application state around `engine`.
    pub fn new(engine: BalanceEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Returns the shared engine.
    pub fn engine(&self) -> &Arc<BalanceEngine> {
        &self.engine
    }
}
