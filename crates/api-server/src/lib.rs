//! HTTP surface for the StockPulse dashboard.
//!
//! Thin axum layer over the refresh orchestrator: reads serve whatever
//! snapshot is current, writes go to the settings store and nudge the
//! scheduler. Handlers never run analysis work themselves.

pub mod admin_routes;
pub mod dashboard_routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use dashboard_core::{AppConfig, DashboardSettings, SettingsStore};
use quote_client::QuoteService;
use refresh_orchestrator::{RefreshScheduler, SchedulerConfig, SchedulerHandle, SnapshotStore};
use scoring_client::ScoringService;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub scheduler: SchedulerHandle,
    pub snapshots: SnapshotStore,
    pub settings: SettingsStore,
    pub quotes: Arc<QuoteService>,
    pub scores: Arc<ScoringService>,
}

/// Envelope every JSON endpoint responds with
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Failures a handler can surface to the client. Partial refresh
/// failures are NOT errors here; they ride along in the snapshot body.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(err) => {
                tracing::error!("internal error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

/// Assemble the full route tree on top of the shared state
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .merge(dashboard_routes::dashboard_routes())
        .merge(admin_routes::admin_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn banner() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "StockPulse API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Wire the services together and serve until shutdown.
pub async fn run_server() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        interval_minutes = config.update_interval_minutes,
        source = %config.quote_source,
        backend = %config.scoring_backend,
        tier = %config.analysis_tier,
        "starting stockpulse api server"
    );

    let settings = SettingsStore::new(DashboardSettings::from_config(&config));
    let quotes = Arc::new(QuoteService::new(config.mode));
    let scores = Arc::new(ScoringService::new(config.mode));
    let snapshots = SnapshotStore::new();

    let scheduler = RefreshScheduler::spawn(
        SchedulerConfig {
            interval: Duration::from_secs(config.update_interval_minutes * 60),
            worker_count: config.worker_count,
            symbol_timeout: Duration::from_secs(config.symbol_timeout_secs),
        },
        settings.clone(),
        quotes.clone(),
        scores.clone(),
        snapshots.clone(),
    );

    // populate the dashboard now instead of one interval from now
    scheduler.trigger().await?;

    let state = AppState {
        scheduler: scheduler.clone(),
        snapshots,
        settings,
        quotes,
        scores,
    };
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid HOST/PORT")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    scheduler.shutdown().await;
    tracing::info!("server stopped");
    Ok(())
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use dashboard_core::{
        ApiKeys, QuoteSource, RuntimeMode, ScoringBackend, SubscriptionTier,
        DEFAULT_PROMPT_TEMPLATE,
    };

    /// State wired like production, but on keyless sources so every
    /// call degrades to synthetic data and never touches the network.
    pub(crate) fn test_state() -> AppState {
        let settings = SettingsStore::new(DashboardSettings {
            symbols: vec!["AAPL".to_string(), "MSFT".to_string()],
            quote_source: QuoteSource::AlphaVantage,
            scoring_backend: ScoringBackend::OpenAi,
            model: "gpt-3.5-turbo".to_string(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            analysis_tier: SubscriptionTier::Expert,
            api_keys: ApiKeys::default(),
        });
        let quotes = Arc::new(QuoteService::new(RuntimeMode::Permissive));
        let scores = Arc::new(ScoringService::new(RuntimeMode::Permissive));
        let snapshots = SnapshotStore::new();
        let scheduler = RefreshScheduler::spawn(
            SchedulerConfig {
                interval: Duration::from_secs(3600),
                worker_count: 4,
                symbol_timeout: Duration::from_secs(30),
            },
            settings.clone(),
            quotes.clone(),
            scores.clone(),
            snapshots.clone(),
        );
        AppState {
            scheduler,
            snapshots,
            settings,
            quotes,
            scores,
        }
    }
}
