//! Dashboard Read API
//!
//! Serves the latest published snapshot and exposes the manual
//! refresh trigger. A dashboard request that arrives before the first
//! cycle has ever published runs one synchronously.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use dashboard_core::{AnalysisRecord, RefreshError};

use crate::{ApiResponse, AppError, AppState};

#[derive(Serialize)]
pub struct DashboardResponse {
    pub stocks: Vec<AnalysisRecord>,
    pub last_updated: Option<DateTime<Utc>>,
    pub total_stocks: usize,
    pub errors: Vec<RefreshError>,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct SyntheticFlags {
    pub quotes: bool,
    pub scoring: bool,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub total_stocks_analyzed: usize,
    pub using_synthetic: SyntheticFlags,
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/dashboard", get(get_dashboard))
        .route("/api/v1/refresh", post(trigger_refresh))
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/stocks/:symbol", get(get_stock))
}

async fn get_dashboard(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DashboardResponse>>, AppError> {
    if state.snapshots.current().generated_at.is_none() {
        // nothing has ever been published, run a cycle before serving
        state.scheduler.refresh_and_wait().await?;
    }

    let snapshot = state.snapshots.current();
    Ok(Json(ApiResponse::success(DashboardResponse {
        stocks: snapshot.records.clone(),
        last_updated: snapshot.generated_at,
        total_stocks: snapshot.records.len(),
        errors: snapshot.errors.clone(),
    })))
}

async fn trigger_refresh(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RefreshResponse>>, AppError> {
    let outcome = state.scheduler.trigger().await?;
    tracing::info!(status = outcome.as_str(), "manual refresh requested");
    Ok(Json(ApiResponse::success(RefreshResponse {
        status: outcome.as_str(),
    })))
}

async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StatusResponse>>, AppError> {
    let snapshot = state.snapshots.current();
    Ok(Json(ApiResponse::success(StatusResponse {
        running: state.scheduler.cycle_in_progress().await,
        last_updated: snapshot.generated_at,
        total_stocks_analyzed: snapshot.records.len(),
        using_synthetic: SyntheticFlags {
            quotes: state.quotes.is_degraded().await,
            scoring: state.scores.is_synthetic().await,
        },
    })))
}

async fn get_stock(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<AnalysisRecord>>, AppError> {
    let snapshot = state.snapshots.current();
    match snapshot.record_for(&symbol) {
        Some(record) => Ok(Json(ApiResponse::success(record.clone()))),
        None => Err(AppError::NotFound(format!(
            "no analysis for {}",
            symbol.to_uppercase()
        ))),
    }
}
