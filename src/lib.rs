//! PTO Balance Engine
//!
//! This crate computes employees' paid-time-off balances from a leave
//! ledger and an accrual policy, and keeps the results in a keyed cache
//! table that is invalidated when the ledger changes.

#![warn(missing_docs)]

pub mod api;
pub mod cache;
pub mod calculation;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod maintenance;
pub mod models;
pub mod notify;
pub mod storage;
