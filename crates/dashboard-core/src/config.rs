use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;

use crate::types::{QuoteSource, RuntimeMode, ScoringBackend, SubscriptionTier};

/// Symbols analyzed when no admin override is set
pub const DEFAULT_SYMBOLS: [&str; 8] = [
    "AAPL", "GOOGL", "MSFT", "TSLA", "AMZN", "NVDA", "META", "NFLX",
];

/// Prompt used by the basic persona unless an admin replaces it.
/// Placeholders are substituted before the prompt is sent.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
Analyze the following stock data and provide:
1. A score from 0-100 (100 being the best investment opportunity)
2. A brief reason for the score (2-3 sentences)

Consider factors like:
- Recent price performance
- Trading volume
- Market cap
- General market sentiment for the sector

Stock Data:
Symbol: {symbol}
Current Price: ${current_price}
Previous Close: ${previous_close}
Daily Change: {change_percent}%
Volume: {volume}
Market Cap: ${market_cap}

Respond in JSON format:
{\"score\": <number>, \"reason\": \"<explanation>\"}";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    // Server
    pub host: String,
    pub port: u16,

    // Refresh pipeline
    pub update_interval_minutes: u64, // 30
    pub worker_count: usize,          // concurrent symbol tasks per cycle
    pub symbol_timeout_secs: u64,     // per-symbol deadline

    // Provider behavior
    pub mode: RuntimeMode, // strict = surface errors, permissive = synthetic fallback
    pub quote_source: QuoteSource,
    pub scoring_backend: ScoringBackend,
    pub model: String,
    pub analysis_tier: SubscriptionTier,

    // Tracked symbols
    pub symbols: Vec<String>,

    // External API keys
    pub alpha_vantage_api_key: Option<String>,
    pub polygon_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub groq_api_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let quote_source_raw =
            env::var("DATA_SOURCE").unwrap_or_else(|_| "yahoo".to_string());
        let scoring_backend_raw =
            env::var("AI_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let tier_raw = env::var("ANALYSIS_TIER").unwrap_or_else(|_| "free".to_string());

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()?,

            update_interval_minutes: env::var("UPDATE_INTERVAL_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            worker_count: env::var("REFRESH_WORKERS")
                .unwrap_or_else(|_| "4".to_string())
                .parse()?,
            symbol_timeout_secs: env::var("SYMBOL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,

            mode: if env::var("STRICT_PROVIDERS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?
            {
                RuntimeMode::Strict
            } else {
                RuntimeMode::Permissive
            },
            quote_source: QuoteSource::parse(&quote_source_raw)
                .ok_or_else(|| anyhow!("unknown DATA_SOURCE: {quote_source_raw}"))?,
            scoring_backend: ScoringBackend::parse(&scoring_backend_raw)
                .ok_or_else(|| anyhow!("unknown AI_PROVIDER: {scoring_backend_raw}"))?,
            model: env::var("AI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string()),
            analysis_tier: SubscriptionTier::parse(&tier_raw)
                .ok_or_else(|| anyhow!("unknown ANALYSIS_TIER: {tier_raw}"))?,

            symbols: env::var("STOCK_SYMBOLS")
                .unwrap_or_else(|_| DEFAULT_SYMBOLS.join(","))
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),

            alpha_vantage_api_key: env::var("ALPHA_VANTAGE_API_KEY").ok(),
            polygon_api_key: env::var("POLYGON_API_KEY").ok(),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            groq_api_key: env::var("GROQ_API_KEY").ok(),
        };

        Ok(config)
    }
}
