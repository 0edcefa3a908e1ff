use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashboard_core::{Quote, QuoteError, QuoteSource};
use reqwest::Client;
use serde::Deserialize;

use crate::provider::{transport_error, QuoteProvider};

const BASE_URL: &str = "https://api.polygon.io";

/// Keyed quote source backed by Polygon daily aggregates. The last
/// completed bar supplies the price, the bar before it the previous
/// close.
pub struct PolygonProvider {
    api_key: String,
    client: Client,
}

impl PolygonProvider {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { api_key, client }
    }
}

#[async_trait]
impl QuoteProvider for PolygonProvider {
    fn source(&self) -> QuoteSource {
        QuoteSource::Polygon
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let symbol = symbol.to_uppercase();
        let to = Utc::now();
        let from = to - chrono::Duration::days(7);
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}",
            BASE_URL,
            symbol,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("adjusted", "true"),
                ("sort", "asc"),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(QuoteSource::Polygon, e))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(QuoteError::RateLimited {
                provider: QuoteSource::Polygon,
                message: format!("HTTP {}", status),
            });
        }
        if !status.is_success() {
            return Err(QuoteError::Polygon(format!(
                "HTTP {}: {}",
                status,
                response.text().await.unwrap_or_default()
            )));
        }

        let body: AggregateResponse = response.json().await.map_err(|e| {
            QuoteError::MalformedResponse {
                provider: QuoteSource::Polygon,
                message: e.to_string(),
            }
        })?;

        quote_from_aggregates(&symbol, body)
    }
}

fn quote_from_aggregates(symbol: &str, body: AggregateResponse) -> Result<Quote, QuoteError> {
    let bars = body.results;
    let last = bars
        .last()
        .ok_or_else(|| QuoteError::SymbolNotFound(symbol.to_string()))?;
    let previous_close = if bars.len() >= 2 {
        bars[bars.len() - 2].c
    } else {
        0.0
    };

    Ok(Quote {
        symbol: symbol.to_string(),
        current_price: last.c,
        previous_close,
        change_percent: Quote::derive_change_percent(last.c, previous_close),
        volume: last.v as u64,
        market_cap: None,
        observed_at: Utc::now(),
    })
}

#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Vec<AggregateBar>,
}

#[derive(Debug, Deserialize)]
struct AggregateBar {
    c: f64, // close
    #[serde(default)]
    v: f64, // volume
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregates_map_to_quote() {
        let payload = r#"{
            "ticker": "AAPL",
            "queryCount": 2,
            "resultsCount": 2,
            "results": [
                {"v": 70790813, "o": 100.87, "c": 101.37, "h": 101.99, "l": 100.21, "t": 1718668800000},
                {"v": 64230000, "o": 101.50, "c": 102.75, "h": 103.10, "l": 101.11, "t": 1718755200000}
            ],
            "status": "OK"
        }"#;
        let body: AggregateResponse = serde_json::from_str(payload).unwrap();
        let quote = quote_from_aggregates("AAPL", body).unwrap();
        assert_eq!(quote.current_price, 102.75);
        assert_eq!(quote.previous_close, 101.37);
        assert!((quote.change_percent - 1.3613).abs() < 0.001);
        assert_eq!(quote.volume, 64_230_000);
    }

    #[test]
    fn test_no_bars_is_symbol_not_found() {
        let payload = r#"{"ticker": "ZZZZ", "queryCount": 0, "resultsCount": 0, "status": "OK"}"#;
        let body: AggregateResponse = serde_json::from_str(payload).unwrap();
        assert!(matches!(
            quote_from_aggregates("ZZZZ", body),
            Err(QuoteError::SymbolNotFound(_))
        ));
    }

    #[test]
    fn test_single_bar_means_no_change() {
        let payload = r#"{
            "results": [{"v": 1000.0, "o": 99.0, "c": 100.0, "h": 101.0, "l": 98.0, "t": 0}]
        }"#;
        let body: AggregateResponse = serde_json::from_str(payload).unwrap();
        let quote = quote_from_aggregates("AAPL", body).unwrap();
        assert_eq!(quote.previous_close, 0.0);
        assert_eq!(quote.change_percent, 0.0);
    }
}
