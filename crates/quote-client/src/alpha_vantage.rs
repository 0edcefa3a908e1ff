use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashboard_core::{Quote, QuoteError, QuoteSource};
use reqwest::Client;
use serde::Deserialize;

use crate::provider::{transport_error, QuoteProvider};

const BASE_URL: &str = "https://www.alphavantage.co";

/// Keyed quote source backed by the Alpha Vantage GLOBAL_QUOTE
/// endpoint. Numeric fields arrive as strings and are parsed here.
pub struct AlphaVantageProvider {
    api_key: String,
    client: Client,
}

impl AlphaVantageProvider {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { api_key, client }
    }
}

#[async_trait]
impl QuoteProvider for AlphaVantageProvider {
    fn source(&self) -> QuoteSource {
        QuoteSource::AlphaVantage
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let symbol = symbol.to_uppercase();
        let url = format!("{}/query", BASE_URL);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(QuoteSource::AlphaVantage, e))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(QuoteError::RateLimited {
                provider: QuoteSource::AlphaVantage,
                message: format!("HTTP {}", status),
            });
        }
        if !status.is_success() {
            return Err(QuoteError::AlphaVantage(format!(
                "HTTP {}: {}",
                status,
                response.text().await.unwrap_or_default()
            )));
        }

        let body: GlobalQuoteResponse = response.json().await.map_err(|e| {
            QuoteError::MalformedResponse {
                provider: QuoteSource::AlphaVantage,
                message: e.to_string(),
            }
        })?;

        quote_from_global_quote(&symbol, body)
    }
}

fn quote_from_global_quote(
    symbol: &str,
    body: GlobalQuoteResponse,
) -> Result<Quote, QuoteError> {
    // the free tier reports throttling as a 200 with a Note payload
    if let Some(note) = body.note.or(body.information) {
        return Err(QuoteError::RateLimited {
            provider: QuoteSource::AlphaVantage,
            message: note,
        });
    }
    if let Some(message) = body.error_message {
        return Err(QuoteError::AlphaVantage(message));
    }

    let quote = body
        .global_quote
        .filter(|q| q.price.is_some())
        .ok_or_else(|| QuoteError::SymbolNotFound(symbol.to_string()))?;

    let current_price = parse_field(quote.price, "05. price")?;
    let previous_close = match quote.previous_close {
        Some(raw) => parse_field(Some(raw), "08. previous close")?,
        None => 0.0,
    };
    let change_percent = match quote.change_percent {
        Some(raw) => parse_field(Some(raw.trim_end_matches('%').to_string()), "10. change percent")?,
        None => Quote::derive_change_percent(current_price, previous_close),
    };
    let volume = match quote.volume {
        Some(raw) => raw.parse::<u64>().map_err(|_| QuoteError::MalformedResponse {
            provider: QuoteSource::AlphaVantage,
            message: "unparseable 06. volume".to_string(),
        })?,
        None => 0,
    };

    Ok(Quote {
        symbol: symbol.to_string(),
        current_price,
        previous_close,
        change_percent,
        volume,
        market_cap: None,
        observed_at: Utc::now(),
    })
}

fn parse_field(raw: Option<String>, name: &str) -> Result<f64, QuoteError> {
    raw.as_deref()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .ok_or_else(|| QuoteError::MalformedResponse {
            provider: QuoteSource::AlphaVantage,
            message: format!("unparseable {name}"),
        })
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote", default)]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Note", default)]
    note: Option<String>,
    #[serde(rename = "Information", default)]
    information: Option<String>,
    #[serde(rename = "Error Message", default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price", default)]
    price: Option<String>,
    #[serde(rename = "06. volume", default)]
    volume: Option<String>,
    #[serde(rename = "08. previous close", default)]
    previous_close: Option<String>,
    #[serde(rename = "10. change percent", default)]
    change_percent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_quote_maps_to_quote() {
        let payload = r#"{
            "Global Quote": {
                "01. symbol": "AAPL",
                "05. price": "102.7500",
                "06. volume": "64230000",
                "08. previous close": "101.3700",
                "10. change percent": "1.3613%"
            }
        }"#;
        let body: GlobalQuoteResponse = serde_json::from_str(payload).unwrap();
        let quote = quote_from_global_quote("AAPL", body).unwrap();
        assert_eq!(quote.current_price, 102.75);
        assert_eq!(quote.previous_close, 101.37);
        assert!((quote.change_percent - 1.3613).abs() < 0.0001);
        assert_eq!(quote.volume, 64_230_000);
    }

    #[test]
    fn test_note_payload_classifies_as_rate_limited() {
        let payload = r#"{
            "Note": "Thank you for using Alpha Vantage! Our standard API rate limit is 25 requests per day."
        }"#;
        let body: GlobalQuoteResponse = serde_json::from_str(payload).unwrap();
        let err = quote_from_global_quote("AAPL", body).unwrap_err();
        assert!(matches!(err, QuoteError::RateLimited { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn test_empty_global_quote_is_symbol_not_found() {
        let payload = r#"{"Global Quote": {}}"#;
        let body: GlobalQuoteResponse = serde_json::from_str(payload).unwrap();
        assert!(matches!(
            quote_from_global_quote("ZZZZ", body),
            Err(QuoteError::SymbolNotFound(_))
        ));
    }

    #[test]
    fn test_unparseable_price_is_malformed() {
        let payload = r#"{"Global Quote": {"05. price": "not-a-number"}}"#;
        let body: GlobalQuoteResponse = serde_json::from_str(payload).unwrap();
        assert!(matches!(
            quote_from_global_quote("AAPL", body),
            Err(QuoteError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_missing_change_percent_is_derived() {
        let payload = r#"{
            "Global Quote": {
                "05. price": "110.00",
                "08. previous close": "100.00"
            }
        }"#;
        let body: GlobalQuoteResponse = serde_json::from_str(payload).unwrap();
        let quote = quote_from_global_quote("AAPL", body).unwrap();
        assert!((quote.change_percent - 10.0).abs() < f64::EPSILON);
        assert_eq!(quote.volume, 0);
    }
}
