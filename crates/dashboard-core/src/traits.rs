use async_trait::async_trait;

use crate::{ApiKeys, Persona, ProviderSelection, Quote, QuoteError, Score, ScoreError};

/// Source of market quotes for the refresh pipeline
#[async_trait]
pub trait QuoteFeed: Send + Sync {
    /// Point the feed at the selected source, rebuilding and probing
    /// the adapter when the source changed
    async fn configure(&self, selection: &ProviderSelection, keys: &ApiKeys);

    async fn fetch(&self, symbol: &str) -> Result<Quote, QuoteError>;

    /// True while quotes are synthetic because the source is missing
    /// a key or failed its probe
    async fn is_degraded(&self) -> bool;
}

/// Producer of persona scores for quotes
#[async_trait]
pub trait ScoreFeed: Send + Sync {
    /// Point the feed at the selected backend and model
    async fn configure(&self, selection: &ProviderSelection, keys: &ApiKeys);

    /// Score the quote once per persona. Personas fail independently;
    /// the result is the set of scores that succeeded.
    async fn score_all(&self, quote: &Quote, personas: &[Persona])
        -> Result<Vec<Score>, ScoreError>;

    /// True while scores come from the built-in heuristic instead of
    /// a live backend
    async fn is_synthetic(&self) -> bool;
}
