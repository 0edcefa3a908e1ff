use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashboard_core::{Quote, QuoteError, QuoteSource};
use reqwest::Client;
use serde::Deserialize;

use crate::provider::{transport_error, QuoteProvider};

const BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Keyless quote source backed by the public Yahoo Finance chart API
pub struct YahooProvider {
    client: Client,
}

impl YahooProvider {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("Mozilla/5.0 (compatible; stockpulse/0.1)")
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteProvider for YahooProvider {
    fn source(&self) -> QuoteSource {
        QuoteSource::Yahoo
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let symbol = symbol.to_uppercase();
        let url = format!("{}/v8/finance/chart/{}", BASE_URL, symbol);

        let response = self
            .client
            .get(&url)
            .query(&[("interval", "1d"), ("range", "2d")])
            .send()
            .await
            .map_err(|e| transport_error(QuoteSource::Yahoo, e))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(QuoteError::RateLimited {
                provider: QuoteSource::Yahoo,
                message: format!("HTTP {}", status),
            });
        }
        if status.as_u16() == 404 {
            return Err(QuoteError::SymbolNotFound(symbol));
        }
        if !status.is_success() {
            return Err(QuoteError::Yahoo(format!(
                "HTTP {}: {}",
                status,
                response.text().await.unwrap_or_default()
            )));
        }

        let chart: ChartResponse = response.json().await.map_err(|e| {
            QuoteError::MalformedResponse {
                provider: QuoteSource::Yahoo,
                message: e.to_string(),
            }
        })?;

        quote_from_chart(&symbol, chart)
    }
}

fn quote_from_chart(symbol: &str, chart: ChartResponse) -> Result<Quote, QuoteError> {
    let result = chart
        .chart
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| QuoteError::SymbolNotFound(symbol.to_string()))?;
    let meta = result.meta;

    let current_price = meta
        .regular_market_price
        .ok_or_else(|| QuoteError::MalformedResponse {
            provider: QuoteSource::Yahoo,
            message: "regularMarketPrice missing".to_string(),
        })?;
    let previous_close = meta
        .previous_close
        .or(meta.chart_previous_close)
        .unwrap_or(0.0);

    Ok(Quote {
        symbol: symbol.to_string(),
        current_price,
        previous_close,
        change_percent: Quote::derive_change_percent(current_price, previous_close),
        volume: meta.regular_market_volume.unwrap_or(0),
        market_cap: None,
        observed_at: Utc::now(),
    })
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    // null when Yahoo reports an error for the symbol
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    chart_previous_close: Option<f64>,
    #[serde(default)]
    previous_close: Option<f64>,
    #[serde(default)]
    regular_market_volume: Option<u64>,
}
