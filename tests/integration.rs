//! Integration tests for the PTO balance engine.
//!
//! This test suite covers:
//! - Balance computation through the HTTP API
//! - Invalidation after ledger changes
//! - Cache maintenance endpoints
//! - Persistence through the CSV table store
//! - Single computation per key under concurrent requests
//! - Error cases

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

use pto_balance_engine::api::{AppState, BalanceResponse, create_router};
use pto_balance_engine::cache::{BalanceCache, BalanceTable, CacheState};
use pto_balance_engine::calculation::BalanceSource;
use pto_balance_engine::config::{AccrualPolicy, ConfigLoader, NotificationConfig};
use pto_balance_engine::engine::BalanceEngine;
use pto_balance_engine::error::EngineResult;
use pto_balance_engine::ledger::LedgerWriter;
use pto_balance_engine::models::{BalanceRecord, Employee, LeaveRequest, LeaveStatus};
use pto_balance_engine::storage::{CsvTableStore, MemoryTableStore, TableStore};

// =============================================================================
// Test Helpers
// =============================================================================

fn decimal(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn employee(user_id: &str, hire_date: &str) -> Employee {
    Employee {
        user_id: user_id.to_string(),
        hire_date: date(hire_date),
        termination_date: None,
        email: None,
    }
}

fn leave(id: &str, user_id: &str, start: &str, end: &str, hours: &str, status: LeaveStatus) -> LeaveRequest {
    let start_date = date(start);
    LeaveRequest {
        request_id: id.to_string(),
        user_id: user_id.to_string(),
        year: start_date.year(),
        start_date,
        end_date: date(end),
        hours_requested: decimal(hours),
        status,
    }
}

fn config() -> ConfigLoader {
    ConfigLoader::from_parts(
        AccrualPolicy::monthly(Decimal::from(10)),
        NotificationConfig::default(),
    )
    .unwrap()
}

/// Seeds `emp_001` hired 2024-07-01 and returns the store and its state.
fn create_test_state() -> (Arc<MemoryTableStore>, AppState) {
    let store = Arc::new(MemoryTableStore::new());
    LedgerWriter::new(store.clone())
        .upsert_employee(&employee("emp_001", "2024-07-01"))
        .unwrap();
    let engine = BalanceEngine::new(store.clone(), config());
    (store, AppState::new(engine))
}

async fn send(router: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

async fn get_balance(state: &AppState, user_id: &str, year: i32) -> BalanceResponse {
    let (status, body) = send(
        create_router(state.clone()),
        "GET",
        &format!("/balances/{}/{}", user_id, year),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    serde_json::from_value(body).unwrap()
}

fn temp_data_dir() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("pto-integration-{}", uuid::Uuid::new_v4()))
}

// =============================================================================
// Balance computation
// =============================================================================

#[tokio::test]
async fn test_new_hire_accrues_six_months() {
    let (_, state) = create_test_state();
    let balance = get_balance(&state, "emp_001", 2024).await;

    assert_eq!(balance.total_hours, decimal("60"));
    assert_eq!(balance.available_hours, decimal("60"));
    assert_eq!(balance.used_hours, Decimal::ZERO);
    assert_eq!(balance.pending_hours, Decimal::ZERO);
    assert!(balance.inconsistency.is_none());
}

#[tokio::test]
async fn test_approved_and_pending_reduce_available() {
    let (store, state) = create_test_state();
    let writer = LedgerWriter::new(store);
    writer
        .upsert_request(&leave("req_1", "emp_001", "2024-08-05", "2024-08-05", "8", LeaveStatus::Approved))
        .unwrap();
    writer
        .upsert_request(&leave("req_2", "emp_001", "2024-11-11", "2024-11-11", "4", LeaveStatus::Pending))
        .unwrap();
    writer
        .upsert_request(&leave("req_3", "emp_001", "2024-12-02", "2024-12-02", "8", LeaveStatus::Rejected))
        .unwrap();
    writer
        .upsert_request(&leave("req_4", "emp_001", "2024-12-09", "2024-12-09", "8", LeaveStatus::Cancelled))
        .unwrap();

    let balance = get_balance(&state, "emp_001", 2024).await;
    assert_eq!(balance.total_hours, decimal("60"));
    assert_eq!(balance.used_hours, decimal("8"));
    assert_eq!(balance.pending_hours, decimal("4"));
    assert_eq!(balance.available_hours, decimal("48"));
}

#[tokio::test]
async fn test_over_allocation_is_reported_not_clamped() {
    let store = Arc::new(MemoryTableStore::new());
    let writer = LedgerWriter::new(store.clone());
    writer
        .upsert_employee(&employee("emp_002", "2024-09-01"))
        .unwrap();
    writer
        .upsert_request(&leave("req_1", "emp_002", "2024-10-01", "2024-10-07", "40", LeaveStatus::Approved))
        .unwrap();
    writer
        .upsert_request(&leave("req_2", "emp_002", "2024-11-04", "2024-11-04", "6", LeaveStatus::Pending))
        .unwrap();
    let state = AppState::new(BalanceEngine::new(store, config()));

    let balance = get_balance(&state, "emp_002", 2024).await;
    assert_eq!(balance.total_hours, decimal("40"));
    assert_eq!(balance.available_hours, decimal("-6"));
    let inconsistency = balance.inconsistency.expect("over-allocation flagged");
    assert_eq!(inconsistency.committed_hours, decimal("46"));
}

#[tokio::test]
async fn test_unknown_user_returns_404() {
    let (_, state) = create_test_state();
    let (status, body) = send(create_router(state), "GET", "/balances/nobody/2024").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "USER_NOT_FOUND");
}

#[tokio::test]
async fn test_known_user_without_requests_in_other_year() {
    let (_, state) = create_test_state();
    let balance = get_balance(&state, "emp_001", 2023).await;
    assert_eq!(balance.total_hours, Decimal::ZERO);
    assert_eq!(balance.available_hours, Decimal::ZERO);
}

// =============================================================================
// Invalidation
// =============================================================================

#[tokio::test]
async fn test_invalidate_reflects_ledger_mutation() {
    let (store, state) = create_test_state();
    let first = get_balance(&state, "emp_001", 2024).await;
    assert_eq!(first.available_hours, decimal("60"));

    LedgerWriter::new(store)
        .upsert_request(&leave("req_9", "emp_001", "2024-09-16", "2024-09-16", "8", LeaveStatus::Approved))
        .unwrap();

    // Not yet invalidated: the cached record is served.
    let cached = get_balance(&state, "emp_001", 2024).await;
    assert_eq!(cached.available_hours, decimal("60"));
    assert_eq!(cached.computed_at, first.computed_at);

    let (status, body) = send(
        create_router(state.clone()),
        "POST",
        "/balances/emp_001/2024/invalidate",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["previous_state"], "fresh");

    let refreshed = get_balance(&state, "emp_001", 2024).await;
    assert_eq!(refreshed.used_hours, decimal("8"));
    assert_eq!(refreshed.available_hours, decimal("52"));
    assert!(refreshed.computed_at >= first.computed_at);
}

#[tokio::test]
async fn test_year_boundary_request_split() {
    let store = Arc::new(MemoryTableStore::new());
    let writer = LedgerWriter::new(store.clone());
    writer
        .upsert_employee(&employee("emp_003", "2020-01-01"))
        .unwrap();
    writer
        .upsert_request(&leave("req_1", "emp_003", "2024-12-30", "2025-01-02", "32", LeaveStatus::Approved))
        .unwrap();

    let mut policy = AccrualPolicy::monthly(Decimal::from(10));
    policy.split_across_years = true;
    let config = ConfigLoader::from_parts(policy, NotificationConfig::default()).unwrap();
    let engine = BalanceEngine::new(store, config);

    assert_eq!(engine.balance("emp_003", 2024).unwrap().used_hours, decimal("16"));
    assert_eq!(engine.balance("emp_003", 2025).unwrap().used_hours, decimal("16"));
}

// =============================================================================
// Cache maintenance
// =============================================================================

#[tokio::test]
async fn test_inspect_and_clear_endpoints() {
    let (store, state) = create_test_state();
    LedgerWriter::new(store)
        .upsert_employee(&employee("emp_004", "2023-01-01"))
        .unwrap();

    let (status, body) = send(create_router(state.clone()), "GET", "/admin/balances-cache").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["records"], Value::Array(vec![]));

    get_balance(&state, "emp_001", 2024).await;
    get_balance(&state, "emp_004", 2024).await;

    let (_, body) = send(create_router(state.clone()), "GET", "/admin/balances-cache").await;
    let records = body["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["user_id"], "emp_001");
    assert_eq!(records[1]["user_id"], "emp_004");

    let (status, body) = send(
        create_router(state.clone()),
        "POST",
        "/admin/balances-cache/clear",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Cleared 2 cached balance record(s)");

    let (_, body) = send(create_router(state), "POST", "/admin/balances-cache/clear").await;
    assert_eq!(body["message"], "Cleared 0 cached balance record(s)");
}

#[test]
fn test_clear_all_is_idempotent() {
    let (_, state) = create_test_state();
    let engine = state.engine();
    engine.balance("emp_001", 2024).unwrap();
    engine.balance("emp_001", 2025).unwrap();

    assert_eq!(engine.maintenance().clear_all().unwrap().removed, 2);
    assert_eq!(engine.maintenance().clear_all().unwrap().removed, 0);
    assert_eq!(
        engine.cache().state("emp_001", 2024).unwrap(),
        CacheState::Absent
    );
}

// =============================================================================
// CSV persistence
// =============================================================================

#[test]
fn test_cache_survives_restart_with_csv_store() {
    let dir = temp_data_dir();
    {
        let store = CsvTableStore::open(&dir).unwrap();
        LedgerWriter::new(Arc::new(store))
            .upsert_employee(&employee("emp_001", "2024-07-01"))
            .unwrap();
    }

    let first = BalanceEngine::new(Arc::new(CsvTableStore::open(&dir).unwrap()), config())
        .balance("emp_001", 2024)
        .unwrap();

    let restarted = BalanceEngine::new(Arc::new(CsvTableStore::open(&dir).unwrap()), config());
    assert_eq!(
        restarted.cache().state("emp_001", 2024).unwrap(),
        CacheState::Fresh
    );
    let second = restarted.balance("emp_001", 2024).unwrap();
    assert_eq!(second, first);

    let listing = restarted.maintenance().inspect().unwrap();
    assert_eq!(listing.iter().collect::<Vec<_>>(), vec![first]);

    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_csv_cache_table_layout() {
    let dir = temp_data_dir();
    let store = Arc::new(CsvTableStore::open(&dir).unwrap());
    LedgerWriter::new(store.clone())
        .upsert_employee(&employee("emp_001", "2024-07-01"))
        .unwrap();
    BalanceEngine::new(store.clone(), config())
        .balance("emp_001", 2024)
        .unwrap();

    let rows = store.read_all("PtoBalances").unwrap();
    assert_eq!(
        rows[0],
        vec![
            "user_id",
            "year",
            "total_hours",
            "available_hours",
            "used_hours",
            "pending_hours",
            "computed_at",
            "invalidated_at"
        ]
    );
    assert_eq!(rows[1][0], "emp_001");
    assert_eq!(rows[1][1], "2024");
    assert_eq!(rows[1][7], "");

    std::fs::remove_dir_all(dir).unwrap();
}

// =============================================================================
// Concurrency
// =============================================================================

struct SlowSource {
    computations: AtomicUsize,
}

impl BalanceSource for SlowSource {
    fn compute_balance(&self, user_id: &str, year: i32) -> EngineResult<BalanceRecord> {
        self.computations.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(25));
        Ok(BalanceRecord::new(
            user_id,
            year,
            Decimal::from(60),
            Decimal::ZERO,
            Decimal::ZERO,
            Utc::now(),
        ))
    }
}

#[test]
fn test_simultaneous_gets_compute_once() {
    let source = Arc::new(SlowSource {
        computations: AtomicUsize::new(0),
    });
    let table = Arc::new(BalanceTable::new(Arc::new(MemoryTableStore::new())));
    let cache = Arc::new(BalanceCache::new(table, source.clone()));
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                cache.get("emp_001", 2024).unwrap()
            })
        })
        .collect();
    let records: Vec<BalanceRecord> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(source.computations.load(Ordering::SeqCst), 1);
    assert!(records.iter().all(|r| r == &records[0]));
}

#[test]
fn test_different_keys_compute_independently() {
    let source = Arc::new(SlowSource {
        computations: AtomicUsize::new(0),
    });
    let table = Arc::new(BalanceTable::new(Arc::new(MemoryTableStore::new())));
    let cache = Arc::new(BalanceCache::new(table, source.clone()));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let cache = cache.clone();
            std::thread::spawn(move || cache.get(&format!("emp_{:03}", i), 2024).unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(source.computations.load(Ordering::SeqCst), 4);
    assert_eq!(cache.clear_all().unwrap(), 4);
}
