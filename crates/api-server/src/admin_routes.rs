//! Admin Configuration API
//!
//! Reads and partial updates of the runtime settings. Updates are
//! in-memory only and picked up by the next refresh cycle; a refresh
//! is requested right away so the dashboard catches up without
//! waiting for the timer.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use dashboard_core::{
    DashboardSettings, QuoteSource, ScoringBackend, SettingsUpdate, SubscriptionTier,
};

use crate::{ApiResponse, AppError, AppState};

/// Placeholders every prompt template must carry so the rendered
/// prompt still describes the quote it is scoring.
const REQUIRED_PLACEHOLDERS: [&str; 6] = [
    "{symbol}",
    "{current_price}",
    "{previous_close}",
    "{change_percent}",
    "{volume}",
    "{market_cap}",
];

/// Settings as shown to admins. API keys are masked; field names line
/// up with [`SettingsUpdate`] so a GET can be edited and PUT back.
#[derive(Serialize)]
pub struct ConfigView {
    pub stock_symbols: Vec<String>,
    pub data_source: QuoteSource,
    pub ai_provider: ScoringBackend,
    pub ai_model: String,
    pub ai_analysis_prompt: String,
    pub analysis_tier: SubscriptionTier,
    pub alpha_vantage_api_key: Option<String>,
    pub polygon_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub groq_api_key: Option<String>,
}

impl ConfigView {
    fn from_settings(settings: DashboardSettings) -> Self {
        Self {
            stock_symbols: settings.symbols,
            data_source: settings.quote_source,
            ai_provider: settings.scoring_backend,
            ai_model: settings.model,
            ai_analysis_prompt: settings.prompt_template,
            analysis_tier: settings.analysis_tier,
            alpha_vantage_api_key: settings.api_keys.alpha_vantage.as_deref().map(mask_api_key),
            polygon_api_key: settings.api_keys.polygon.as_deref().map(mask_api_key),
            openai_api_key: settings.api_keys.openai.as_deref().map(mask_api_key),
            groq_api_key: settings.api_keys.groq.as_deref().map(mask_api_key),
        }
    }
}

fn mask_api_key(key: &str) -> String {
    if key.len() <= 8 {
        return "****".to_string();
    }
    format!("{}...{}", &key[..4], &key[key.len() - 4..])
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/api/v1/admin/config", get(get_config).put(update_config))
}

async fn get_config(State(state): State<AppState>) -> Json<ApiResponse<ConfigView>> {
    let settings = state.settings.current().await;
    Json(ApiResponse::success(ConfigView::from_settings(settings)))
}

async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<ApiResponse<ConfigView>>, AppError> {
    if let Some(prompt) = &update.ai_analysis_prompt {
        validate_prompt(prompt)?;
    }

    let updated = state
        .settings
        .apply(update)
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    // make the change visible without waiting for the timer
    match state.scheduler.trigger().await {
        Ok(outcome) => {
            tracing::info!(status = outcome.as_str(), "refresh requested after config change");
        }
        Err(e) => {
            tracing::warn!("could not request refresh after config change: {e}");
        }
    }

    Ok(Json(ApiResponse::success(ConfigView::from_settings(
        updated,
    ))))
}

fn validate_prompt(prompt: &str) -> Result<(), AppError> {
    let missing: Vec<&str> = REQUIRED_PLACEHOLDERS
        .iter()
        .copied()
        .filter(|p| !prompt.contains(p))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "prompt template must contain the placeholders: {}",
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::mask_api_key;
    use crate::testing::test_state;
    use crate::build_router;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use dashboard_core::SettingsUpdate;
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    async fn get_config(app: &Router) -> Value {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/admin/config")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn put_config(app: &Router, payload: Value) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/v1/admin/config")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key("sk-1234567890abcdef"), "sk-1...cdef");
        assert_eq!(mask_api_key("short"), "****");
    }

    #[tokio::test]
    async fn test_get_config_masks_stored_keys() {
        let state = test_state();
        state
            .settings
            .apply(SettingsUpdate {
                openai_api_key: Some("sk-1234567890abcdef".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let app = build_router(state);

        let body = get_config(&app).await;
        let data = &body["data"];
        assert_eq!(data["openai_api_key"], "sk-1...cdef");
        assert!(data["polygon_api_key"].is_null());
        assert!(!body.to_string().contains("sk-1234567890abcdef"));
    }

    #[tokio::test]
    async fn test_put_applies_partial_update() {
        let app = build_router(test_state());

        let (status, body) = put_config(
            &app,
            json!({"stock_symbols": ["nvda", "amd"], "ai_model": "gpt-4o-mini"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["stock_symbols"], json!(["NVDA", "AMD"]));
        assert_eq!(body["data"]["ai_model"], "gpt-4o-mini");
        // untouched fields keep their values
        assert_eq!(body["data"]["data_source"], "alpha_vantage");
    }

    #[tokio::test]
    async fn test_put_rejects_unknown_enum_value() {
        let app = build_router(test_state());

        let (status, _) = put_config(&app, json!({"data_source": "bloomberg"})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_put_rejects_prompt_missing_placeholders() {
        let app = build_router(test_state());

        let (status, body) = put_config(&app, json!({"ai_analysis_prompt": "rate it"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("{symbol}"));
    }

    #[tokio::test]
    async fn test_put_rejects_empty_symbol_list() {
        let app = build_router(test_state());

        let (status, body) = put_config(&app, json!({"stock_symbols": ["  "]})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
