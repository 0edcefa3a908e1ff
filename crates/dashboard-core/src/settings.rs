use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::error::SettingsError;
use crate::types::{Persona, ProviderSelection, QuoteSource, ScoringBackend, SubscriptionTier};

/// Keys for the external services, admin-editable at runtime
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub alpha_vantage: Option<String>,
    pub polygon: Option<String>,
    pub openai: Option<String>,
    pub groq: Option<String>,
}

impl ApiKeys {
    pub fn quote_key(&self, source: QuoteSource) -> Option<&str> {
        match source {
            QuoteSource::Yahoo => None,
            QuoteSource::AlphaVantage => self.alpha_vantage.as_deref(),
            QuoteSource::Polygon => self.polygon.as_deref(),
        }
    }

    pub fn scoring_key(&self, backend: ScoringBackend) -> Option<&str> {
        match backend {
            ScoringBackend::OpenAi => self.openai.as_deref(),
            ScoringBackend::Groq => self.groq.as_deref(),
        }
    }
}

/// Runtime-mutable dashboard settings. Edits apply from the next
/// refresh cycle onward.
#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub symbols: Vec<String>,
    pub quote_source: QuoteSource,
    pub scoring_backend: ScoringBackend,
    pub model: String,
    pub prompt_template: String,
    pub analysis_tier: SubscriptionTier,
    pub api_keys: ApiKeys,
}

impl DashboardSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            symbols: config.symbols.clone(),
            quote_source: config.quote_source,
            scoring_backend: config.scoring_backend,
            model: config.model.clone(),
            prompt_template: crate::config::DEFAULT_PROMPT_TEMPLATE.to_string(),
            analysis_tier: config.analysis_tier,
            api_keys: ApiKeys {
                alpha_vantage: config.alpha_vantage_api_key.clone(),
                polygon: config.polygon_api_key.clone(),
                openai: config.openai_api_key.clone(),
                groq: config.groq_api_key.clone(),
            },
        }
    }

    pub fn selection(&self) -> ProviderSelection {
        ProviderSelection {
            quote_source: self.quote_source,
            scoring_backend: self.scoring_backend,
            model: self.model.clone(),
            prompt_template: self.prompt_template.clone(),
        }
    }
}

/// Partial update applied through the admin API. Unset fields keep
/// their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub stock_symbols: Option<Vec<String>>,
    pub data_source: Option<QuoteSource>,
    pub ai_provider: Option<ScoringBackend>,
    pub ai_model: Option<String>,
    pub ai_analysis_prompt: Option<String>,
    pub analysis_tier: Option<SubscriptionTier>,
    pub alpha_vantage_api_key: Option<String>,
    pub polygon_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub groq_api_key: Option<String>,
}

/// The view of settings a single refresh cycle runs with
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub symbols: Vec<String>,
    pub selection: ProviderSelection,
    pub personas: Vec<Persona>,
    pub api_keys: ApiKeys,
}

/// Shared handle to the mutable settings. Readers always see a
/// consistent clone taken under the lock.
#[derive(Clone)]
pub struct SettingsStore {
    inner: Arc<RwLock<DashboardSettings>>,
}

impl SettingsStore {
    pub fn new(settings: DashboardSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub async fn current(&self) -> DashboardSettings {
        self.inner.read().await.clone()
    }

    /// One consistent view for a refresh cycle. The symbol list is
    /// capped at the tier's maximum before dispatch.
    pub async fn refresh_view(&self) -> RefreshSettings {
        let settings = self.inner.read().await.clone();
        let tier = settings.analysis_tier;
        let mut symbols = settings.symbols;
        symbols.truncate(tier.max_symbols());
        RefreshSettings {
            symbols,
            selection: ProviderSelection {
                quote_source: settings.quote_source,
                scoring_backend: settings.scoring_backend,
                model: settings.model,
                prompt_template: settings.prompt_template,
            },
            personas: tier.personas().to_vec(),
            api_keys: settings.api_keys,
        }
    }

    pub async fn apply(&self, update: SettingsUpdate) -> Result<DashboardSettings, SettingsError> {
        let symbols = match update.stock_symbols {
            Some(raw) => Some(normalize_symbols(raw)?),
            None => None,
        };

        let mut guard = self.inner.write().await;
        if let Some(symbols) = symbols {
            guard.symbols = symbols;
        }
        if let Some(source) = update.data_source {
            guard.quote_source = source;
        }
        if let Some(backend) = update.ai_provider {
            guard.scoring_backend = backend;
        }
        if let Some(model) = update.ai_model {
            guard.model = model;
        }
        if let Some(prompt) = update.ai_analysis_prompt {
            guard.prompt_template = prompt;
        }
        if let Some(tier) = update.analysis_tier {
            guard.analysis_tier = tier;
        }
        if let Some(key) = update.alpha_vantage_api_key {
            guard.api_keys.alpha_vantage = non_empty(key);
        }
        if let Some(key) = update.polygon_api_key {
            guard.api_keys.polygon = non_empty(key);
        }
        if let Some(key) = update.openai_api_key {
            guard.api_keys.openai = non_empty(key);
        }
        if let Some(key) = update.groq_api_key {
            guard.api_keys.groq = non_empty(key);
        }
        Ok(guard.clone())
    }
}

fn normalize_symbols(raw: Vec<String>) -> Result<Vec<String>, SettingsError> {
    let mut symbols = Vec::with_capacity(raw.len());
    for entry in raw {
        let symbol = entry.trim().to_uppercase();
        if symbol.is_empty() {
            continue;
        }
        if !symbol.chars().all(|c| c.is_ascii_alphanumeric() || c == '.') {
            return Err(SettingsError::InvalidSymbol(entry));
        }
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    if symbols.is_empty() {
        return Err(SettingsError::EmptySymbols);
    }
    Ok(symbols)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PROMPT_TEMPLATE;

    fn test_settings() -> DashboardSettings {
        DashboardSettings {
            symbols: vec![
                "AAPL".into(),
                "GOOGL".into(),
                "MSFT".into(),
                "TSLA".into(),
                "AMZN".into(),
                "NVDA".into(),
            ],
            quote_source: QuoteSource::Yahoo,
            scoring_backend: ScoringBackend::OpenAi,
            model: "gpt-3.5-turbo".into(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.into(),
            analysis_tier: SubscriptionTier::Free,
            api_keys: ApiKeys::default(),
        }
    }

    #[tokio::test]
    async fn test_refresh_view_caps_symbols_at_tier_limit() {
        let store = SettingsStore::new(test_settings());
        let view = store.refresh_view().await;
        assert_eq!(view.symbols.len(), 5);
        assert_eq!(view.symbols[0], "AAPL");
        assert_eq!(view.personas, vec![Persona::Basic]);

        store
            .apply(SettingsUpdate {
                analysis_tier: Some(SubscriptionTier::Expert),
                ..Default::default()
            })
            .await
            .unwrap();
        let view = store.refresh_view().await;
        assert_eq!(view.symbols.len(), 6);
        assert_eq!(view.personas.len(), 4);
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let store = SettingsStore::new(test_settings());
        let updated = store
            .apply(SettingsUpdate {
                data_source: Some(QuoteSource::Polygon),
                polygon_api_key: Some("pk_test".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.quote_source, QuoteSource::Polygon);
        assert_eq!(updated.api_keys.polygon.as_deref(), Some("pk_test"));
        assert_eq!(updated.scoring_backend, ScoringBackend::OpenAi);
        assert_eq!(updated.symbols.len(), 6);
    }

    #[tokio::test]
    async fn test_symbols_are_normalized_and_deduped() {
        let store = SettingsStore::new(test_settings());
        let updated = store
            .apply(SettingsUpdate {
                stock_symbols: Some(vec![
                    " aapl ".into(),
                    "msft".into(),
                    "AAPL".into(),
                    "".into(),
                ]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.symbols, vec!["AAPL".to_string(), "MSFT".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_symbol_list_is_rejected() {
        let store = SettingsStore::new(test_settings());
        let result = store
            .apply(SettingsUpdate {
                stock_symbols: Some(vec!["  ".into()]),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(SettingsError::EmptySymbols)));

        // the failed update must not have touched the stored list
        assert_eq!(store.current().await.symbols.len(), 6);
    }

    #[tokio::test]
    async fn test_garbage_symbol_is_rejected() {
        let store = SettingsStore::new(test_settings());
        let result = store
            .apply(SettingsUpdate {
                stock_symbols: Some(vec!["AAPL; DROP".into()]),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(SettingsError::InvalidSymbol(_))));
    }

    #[tokio::test]
    async fn test_blank_api_key_clears_the_stored_key() {
        let store = SettingsStore::new(test_settings());
        store
            .apply(SettingsUpdate {
                openai_api_key: Some("sk_live".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(store.current().await.api_keys.openai.is_some());

        store
            .apply(SettingsUpdate {
                openai_api_key: Some("".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(store.current().await.api_keys.openai.is_none());
    }

    #[test]
    fn test_update_deserializes_from_admin_payload() {
        let update: SettingsUpdate = serde_json::from_str(
            r#"{"data_source": "alpha_vantage", "ai_provider": "groq", "ai_model": "llama-3.1-8b-instant"}"#,
        )
        .unwrap();
        assert_eq!(update.data_source, Some(QuoteSource::AlphaVantage));
        assert_eq!(update.ai_provider, Some(ScoringBackend::Groq));
        assert!(update.stock_symbols.is_none());

        let bad = serde_json::from_str::<SettingsUpdate>(r#"{"data_source": "bloomberg"}"#);
        assert!(bad.is_err());
    }
}
