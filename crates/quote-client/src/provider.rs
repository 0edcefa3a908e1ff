use std::sync::Arc;

use async_trait::async_trait;
use dashboard_core::{ApiKeys, Quote, QuoteError, QuoteSource};

use crate::alpha_vantage::AlphaVantageProvider;
use crate::polygon::PolygonProvider;
use crate::yahoo::YahooProvider;

/// A market data source that can resolve one symbol to a quote
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    fn source(&self) -> QuoteSource;

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError>;
}

/// Build the adapter for a source. Keyed sources fail closed when no
/// key is configured.
pub fn build_provider(
    source: QuoteSource,
    keys: &ApiKeys,
) -> Result<Arc<dyn QuoteProvider>, QuoteError> {
    match source {
        QuoteSource::Yahoo => Ok(Arc::new(YahooProvider::new())),
        QuoteSource::AlphaVantage => {
            let key = keys
                .quote_key(source)
                .ok_or(QuoteError::MissingApiKey { provider: source })?;
            Ok(Arc::new(AlphaVantageProvider::new(key.to_string())))
        }
        QuoteSource::Polygon => {
            let key = keys
                .quote_key(source)
                .ok_or(QuoteError::MissingApiKey { provider: source })?;
            Ok(Arc::new(PolygonProvider::new(key.to_string())))
        }
    }
}

/// Map a transport failure onto the provider's error variant
pub(crate) fn transport_error(provider: QuoteSource, err: reqwest::Error) -> QuoteError {
    if err.is_timeout() {
        QuoteError::Timeout { provider }
    } else {
        QuoteError::from_provider(provider, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyed_sources_fail_closed_without_keys() {
        let keys = ApiKeys::default();
        assert!(build_provider(QuoteSource::Yahoo, &keys).is_ok());
        assert!(matches!(
            build_provider(QuoteSource::AlphaVantage, &keys),
            Err(QuoteError::MissingApiKey {
                provider: QuoteSource::AlphaVantage
            })
        ));
        assert!(matches!(
            build_provider(QuoteSource::Polygon, &keys),
            Err(QuoteError::MissingApiKey {
                provider: QuoteSource::Polygon
            })
        ));
    }

    #[test]
    fn test_keyed_sources_build_with_keys() {
        let keys = ApiKeys {
            alpha_vantage: Some("av_demo".into()),
            polygon: Some("pg_demo".into()),
            ..Default::default()
        };
        let provider = build_provider(QuoteSource::AlphaVantage, &keys).unwrap();
        assert_eq!(provider.source(), QuoteSource::AlphaVantage);
        let provider = build_provider(QuoteSource::Polygon, &keys).unwrap();
        assert_eq!(provider.source(), QuoteSource::Polygon);
    }
}
