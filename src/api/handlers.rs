//! HTTP request handlers for the PTO balance API.
//!
//! This module contains the handler functions for all API endpoints. The
//! engine is synchronous, so every handler runs its work on the blocking
//! thread pool.

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::PathRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::BalanceEngine;
use crate::error::EngineResult;
use crate::maintenance::CommandOutcome;

use super::request::BalancePath;
use super::response::{ApiError, ApiErrorResponse, BalanceResponse, InvalidateResponse};
use super::state::AppState;

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/balances/:user_id/:year", get(balance_handler))
        .route("/balances/:user_id/:year/invalidate", post(invalidate_handler))
        .route("/admin/balances-cache", get(inspect_cache_handler))
        .route("/admin/balances-cache/clear", post(clear_cache_handler))
        .with_state(state)
}

/// Handler for GET /balances/:user_id/:year.
///
/// Returns the cached balance, computing it first if needed.
async fn balance_handler(
    State(state): State<AppState>,
    path: Result<Path<BalancePath>, PathRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let BalancePath { user_id, year } = match path {
        Ok(Path(params)) => params,
        Err(rejection) => return path_error(correlation_id, rejection),
    };
    info!(correlation_id = %correlation_id, user_id = %user_id, year, "Processing balance request");

    let start_time = Instant::now();
    let lookup_user = user_id.clone();
    match run_blocking(&state, move |engine| engine.balance(&lookup_user, year)).await {
        Ok(record) => {
            info!(
                correlation_id = %correlation_id,
                user_id = %user_id,
                year,
                available_hours = %record.available_hours,
                duration_us = start_time.elapsed().as_micros(),
                "Balance request completed"
            );
            json_response(StatusCode::OK, BalanceResponse::from(record))
        }
        Err(api_error) => error_response(correlation_id, api_error),
    }
}

/// Handler for POST /balances/:user_id/:year/invalidate.
async fn invalidate_handler(
    State(state): State<AppState>,
    path: Result<Path<BalancePath>, PathRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let BalancePath { user_id, year } = match path {
        Ok(Path(params)) => params,
        Err(rejection) => return path_error(correlation_id, rejection),
    };

    let target_user = user_id.clone();
    match run_blocking(&state, move |engine| engine.invalidate(&target_user, year)).await {
        Ok(previous_state) => {
            info!(
                correlation_id = %correlation_id,
                user_id = %user_id,
                year,
                previous_state = ?previous_state,
                "Balance invalidated"
            );
            json_response(
                StatusCode::OK,
                InvalidateResponse {
                    user_id,
                    year,
                    previous_state,
                },
            )
        }
        Err(api_error) => error_response(correlation_id, api_error),
    }
}

/// Handler for GET /admin/balances-cache.
async fn inspect_cache_handler(State(state): State<AppState>) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, "Inspecting balances cache");
    command_response(
        correlation_id,
        run_blocking(&state, |engine| {
            Ok(engine.maintenance().inspect_balances_cache())
        })
        .await,
    )
}

/// Handler for POST /admin/balances-cache/clear.
async fn clear_cache_handler(State(state): State<AppState>) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, "Clearing balances cache");
    command_response(
        correlation_id,
        run_blocking(&state, |engine| Ok(engine.maintenance().clear_balances_cache())).await,
    )
}

/// Runs `f` against the engine on the blocking pool.
async fn run_blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiErrorResponse>
where
    F: FnOnce(&BalanceEngine) -> EngineResult<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = state.engine().clone();
    match tokio::task::spawn_blocking(move || f(&engine)).await {
        Ok(result) => result.map_err(ApiErrorResponse::from),
        Err(err) => Err(ApiErrorResponse {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: ApiError::internal(format!("Worker task failed: {}", err)),
        }),
    }
}

fn command_response(
    correlation_id: Uuid,
    outcome: Result<CommandOutcome, ApiErrorResponse>,
) -> Response {
    match outcome {
        Ok(outcome) if outcome.success => json_response(StatusCode::OK, outcome),
        Ok(outcome) => {
            warn!(
                correlation_id = %correlation_id,
                error = outcome.error.as_deref().unwrap_or_default(),
                "Maintenance command failed"
            );
            json_response(StatusCode::SERVICE_UNAVAILABLE, outcome)
        }
        Err(api_error) => error_response(correlation_id, api_error),
    }
}

fn path_error(correlation_id: Uuid, rejection: PathRejection) -> Response {
    let body_text = rejection.body_text();
    warn!(correlation_id = %correlation_id, error = %body_text, "Invalid path parameters");
    json_response(StatusCode::BAD_REQUEST, ApiError::validation_error(body_text))
}

fn error_response(correlation_id: Uuid, api_error: ApiErrorResponse) -> Response {
    warn!(
        correlation_id = %correlation_id,
        code = %api_error.error.code,
        error = %api_error.error.message,
        "Request failed"
    );
    api_error.into_response()
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        Json(body),
    )
        .into_response()
}
