pub mod alpha_vantage;
pub mod governor;
pub mod polygon;
pub mod provider;
pub mod retry;
pub mod synthetic;
pub mod yahoo;

pub use governor::{wait_for_admission, Admission, GovernorLimits, RateGovernor};
pub use provider::{build_provider, QuoteProvider};
pub use retry::{call_with_retry, RetryPolicy};
pub use synthetic::synthetic_quote;

use std::sync::Arc;

use async_trait::async_trait;
use dashboard_core::{
    ApiKeys, ProviderSelection, Quote, QuoteError, QuoteFeed, QuoteSource, RuntimeMode,
};
use dashmap::DashMap;
use tokio::sync::RwLock;

const PROBE_SYMBOL: &str = "AAPL";

enum ProviderState {
    Unconfigured,
    Degraded {
        source: QuoteSource,
        reason: String,
    },
    Live {
        source: QuoteSource,
        provider: Arc<dyn QuoteProvider>,
        governor: Arc<RateGovernor>,
    },
}

impl ProviderState {
    fn live_source(&self) -> Option<QuoteSource> {
        match self {
            ProviderState::Live { source, .. } => Some(*source),
            _ => None,
        }
    }
}

/// Facade over the active quote source. Every live call goes through
/// the source's rate governor and the retry policy. In permissive mode
/// failures degrade to synthetic quotes; in strict mode they surface
/// as typed errors.
pub struct QuoteService {
    mode: RuntimeMode,
    retry: RetryPolicy,
    // one governor per source for the life of the service, so call
    // budgets and the adaptive delay survive source switches
    governors: DashMap<QuoteSource, Arc<RateGovernor>>,
    state: RwLock<ProviderState>,
}

impl QuoteService {
    pub fn new(mode: RuntimeMode) -> Self {
        Self {
            mode,
            retry: RetryPolicy::default(),
            governors: DashMap::new(),
            state: RwLock::new(ProviderState::Unconfigured),
        }
    }

    fn governor_for(&self, source: QuoteSource) -> Arc<RateGovernor> {
        self.governors
            .entry(source)
            .or_insert_with(|| Arc::new(RateGovernor::for_source(source)))
            .clone()
    }

    /// Rebuild the adapter unless it is already live on the requested
    /// source, then probe it. A degraded adapter is rebuilt too, so a
    /// key added at runtime takes effect on the next cycle.
    pub async fn configure(&self, source: QuoteSource, keys: &ApiKeys) {
        let already_live = self.state.read().await.live_source() == Some(source);
        if already_live {
            return;
        }

        let new_state = match build_provider(source, keys) {
            Ok(provider) => ProviderState::Live {
                source,
                provider,
                governor: self.governor_for(source),
            },
            Err(err) => {
                tracing::warn!(source = %source, error = %err, "quote source unavailable");
                ProviderState::Degraded {
                    source,
                    reason: err.to_string(),
                }
            }
        };
        *self.state.write().await = new_state;
        self.probe().await;
    }

    /// One governed fetch of a canary symbol. Failure degrades the
    /// adapter until the next configure.
    pub async fn probe(&self) -> bool {
        let (provider, governor, source) = {
            let state = self.state.read().await;
            match &*state {
                ProviderState::Live {
                    source,
                    provider,
                    governor,
                } => (provider.clone(), governor.clone(), *source),
                _ => return false,
            }
        };

        wait_for_admission(&governor).await;
        let result = provider.fetch_quote(PROBE_SYMBOL).await;
        governor.record(result.is_ok()).await;
        match result {
            Ok(_) => {
                tracing::info!(source = %source, "quote source is live");
                true
            }
            Err(err) => {
                tracing::warn!(source = %source, error = %err, "quote source failed its probe");
                *self.state.write().await = ProviderState::Degraded {
                    source,
                    reason: err.to_string(),
                };
                false
            }
        }
    }

    pub async fn fetch(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let (provider, governor, source) = {
            let state = self.state.read().await;
            match &*state {
                ProviderState::Live {
                    source,
                    provider,
                    governor,
                } => (provider.clone(), governor.clone(), *source),
                ProviderState::Degraded { source, reason } => {
                    return self.fallback(symbol, QuoteError::from_provider(*source, reason.clone()));
                }
                ProviderState::Unconfigured => {
                    return self.fallback(symbol, QuoteError::NotConfigured);
                }
            }
        };

        let provider_for_call = provider.clone();
        let symbol_owned = symbol.to_uppercase();
        let result = call_with_retry(&governor, self.retry, move || {
            let provider = provider_for_call.clone();
            let symbol = symbol_owned.clone();
            async move { provider.fetch_quote(&symbol).await }
        })
        .await;

        match result {
            Ok(quote) => Ok(quote),
            Err(err) => {
                tracing::warn!(symbol, source = %source, error = %err, "live quote fetch failed");
                self.fallback(symbol, err)
            }
        }
    }

    pub async fn is_degraded(&self) -> bool {
        self.state.read().await.live_source().is_none()
    }

    pub async fn active_source(&self) -> Option<QuoteSource> {
        match &*self.state.read().await {
            ProviderState::Unconfigured => None,
            ProviderState::Degraded { source, .. } | ProviderState::Live { source, .. } => {
                Some(*source)
            }
        }
    }

    fn fallback(&self, symbol: &str, err: QuoteError) -> Result<Quote, QuoteError> {
        if self.mode.is_strict() {
            Err(err)
        } else {
            Ok(synthetic_quote(symbol))
        }
    }
}

#[async_trait]
impl QuoteFeed for QuoteService {
    async fn configure(&self, selection: &ProviderSelection, keys: &ApiKeys) {
        QuoteService::configure(self, selection.quote_source, keys).await
    }

    async fn fetch(&self, symbol: &str) -> Result<Quote, QuoteError> {
        QuoteService::fetch(self, symbol).await
    }

    async fn is_degraded(&self) -> bool {
        QuoteService::is_degraded(self).await
    }
}
