use thiserror::Error;

use crate::types::{QuoteSource, ScoringBackend};

#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("Yahoo Finance error: {0}")]
    Yahoo(String),

    #[error("Alpha Vantage error: {0}")]
    AlphaVantage(String),

    #[error("Polygon error: {0}")]
    Polygon(String),

    #[error("{provider} rate limited: {message}")]
    RateLimited {
        provider: QuoteSource,
        message: String,
    },

    #[error("{provider} request timed out")]
    Timeout { provider: QuoteSource },

    #[error("{provider} returned malformed data: {message}")]
    MalformedResponse {
        provider: QuoteSource,
        message: String,
    },

    #[error("no API key configured for {provider}")]
    MissingApiKey { provider: QuoteSource },

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("no quote source configured")]
    NotConfigured,
}

impl QuoteError {
    /// Whether a retry has a realistic chance of succeeding
    pub fn is_transient(&self) -> bool {
        match self {
            QuoteError::RateLimited { .. } | QuoteError::Timeout { .. } => true,
            QuoteError::Yahoo(msg) | QuoteError::AlphaVantage(msg) | QuoteError::Polygon(msg) => {
                is_transient_message(msg)
            }
            _ => false,
        }
    }

    /// Wrap a transport failure in the right provider variant
    pub fn from_provider(provider: QuoteSource, message: impl Into<String>) -> Self {
        match provider {
            QuoteSource::Yahoo => QuoteError::Yahoo(message.into()),
            QuoteSource::AlphaVantage => QuoteError::AlphaVantage(message.into()),
            QuoteSource::Polygon => QuoteError::Polygon(message.into()),
        }
    }
}

fn is_transient_message(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    [
        "429",
        "too many",
        "rate limit",
        "timeout",
        "timed out",
        "connection",
        "network",
        "temporary",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("stock symbol list must not be empty")]
    EmptySymbols,

    #[error("invalid symbol: {0:?}")]
    InvalidSymbol(String),
}

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("{backend} API error: {message}")]
    Backend {
        backend: ScoringBackend,
        message: String,
    },

    #[error("{backend} rate limited: {message}")]
    RateLimited {
        backend: ScoringBackend,
        message: String,
    },

    #[error("{backend} returned an empty completion")]
    EmptyCompletion { backend: ScoringBackend },

    #[error("no API key configured for {backend}")]
    MissingApiKey { backend: ScoringBackend },

    #[error("no scoring backend configured")]
    NotConfigured,
}
