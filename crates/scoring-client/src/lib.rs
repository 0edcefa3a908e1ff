pub mod backend;
pub mod chat;
pub mod groq;
pub mod openai;
pub mod persona;
pub mod synthetic;

use std::sync::Arc;

use async_trait::async_trait;
use dashboard_core::{
    ApiKeys, Persona, ProviderSelection, Quote, RuntimeMode, Score, ScoreError, ScoreFeed,
    ScoringBackend, DEFAULT_PROMPT_TEMPLATE,
};
use tokio::sync::RwLock;

pub use backend::{build_backend, ScoreBackend};
pub use chat::score_from_completion;
pub use persona::{render_prompt, system_prompt, template_for};
pub use synthetic::synthetic_score;

enum BackendState {
    Unconfigured,
    Degraded {
        kind: ScoringBackend,
        reason: String,
    },
    Live {
        kind: ScoringBackend,
        client: Arc<dyn ScoreBackend>,
    },
}

impl BackendState {
    fn live_kind(&self) -> Option<ScoringBackend> {
        match self {
            BackendState::Live { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

struct ScoringState {
    backend: BackendState,
    model: String,
    prompt_template: String,
}

/// Scores quotes through the selected completion backend, one call per
/// persona. Without a usable backend the service degrades to the
/// synthetic scorer in permissive mode and surfaces errors in strict
/// mode.
pub struct ScoringService {
    mode: RuntimeMode,
    state: RwLock<ScoringState>,
}

impl ScoringService {
    pub fn new(mode: RuntimeMode) -> Self {
        Self {
            mode,
            state: RwLock::new(ScoringState {
                backend: BackendState::Unconfigured,
                model: String::new(),
                prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            }),
        }
    }

    #[cfg(test)]
    fn with_backend(mode: RuntimeMode, kind: ScoringBackend, client: Arc<dyn ScoreBackend>) -> Self {
        Self {
            mode,
            state: RwLock::new(ScoringState {
                backend: BackendState::Live { kind, client },
                model: "test-model".to_string(),
                prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            }),
        }
    }

    /// Apply the current selection. Model and prompt changes take
    /// effect immediately; the backend client is only rebuilt when the
    /// backend changed or the last build failed.
    pub async fn configure(&self, selection: &ProviderSelection, keys: &ApiKeys) {
        let mut state = self.state.write().await;
        state.model = selection.model.clone();
        state.prompt_template = selection.prompt_template.clone();

        if state.backend.live_kind() == Some(selection.scoring_backend) {
            return;
        }

        match build_backend(selection.scoring_backend, keys) {
            Ok(client) => {
                tracing::info!(backend = %selection.scoring_backend, "scoring backend ready");
                state.backend = BackendState::Live {
                    kind: selection.scoring_backend,
                    client,
                };
            }
            Err(e) => {
                tracing::warn!(
                    backend = %selection.scoring_backend,
                    error = %e,
                    "scoring backend unavailable, scores will be synthetic"
                );
                state.backend = BackendState::Degraded {
                    kind: selection.scoring_backend,
                    reason: e.to_string(),
                };
            }
        }
    }

    /// One persona's verdict on a quote.
    pub async fn score(&self, quote: &Quote, persona: Persona) -> Result<Score, ScoreError> {
        let (client, kind, model, configured_template) = {
            let state = self.state.read().await;
            match &state.backend {
                BackendState::Live { kind, client } => (
                    client.clone(),
                    *kind,
                    state.model.clone(),
                    state.prompt_template.clone(),
                ),
                BackendState::Degraded { kind, reason } => {
                    let err = ScoreError::Backend {
                        backend: *kind,
                        message: reason.clone(),
                    };
                    return self.fallback(quote, persona, err);
                }
                BackendState::Unconfigured => {
                    return self.fallback(quote, persona, ScoreError::NotConfigured);
                }
            }
        };

        let template = persona::template_for(persona, &configured_template);
        let user = persona::render_prompt(template, quote);
        let system = persona::system_prompt(persona);

        match client
            .complete(&model, persona::temperature(persona), &system, &user)
            .await
        {
            Ok(completion) => Ok(chat::score_from_completion(
                persona,
                kind.origin(),
                &completion,
            )),
            Err(e) => self.fallback(quote, persona, e),
        }
    }

    /// Score the quote for each persona. Personas fail independently:
    /// one backend error never discards the scores that succeeded.
    pub async fn score_all(
        &self,
        quote: &Quote,
        personas: &[Persona],
    ) -> Result<Vec<Score>, ScoreError> {
        let mut scores = Vec::with_capacity(personas.len());
        let mut last_error = None;

        for &persona in personas {
            match self.score(quote, persona).await {
                Ok(score) => scores.push(score),
                Err(e) => {
                    tracing::error!(
                        symbol = %quote.symbol,
                        persona = %persona,
                        error = %e,
                        "persona scoring failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if scores.is_empty() => Err(e),
            _ => Ok(scores),
        }
    }

    pub async fn is_synthetic(&self) -> bool {
        self.state.read().await.backend.live_kind().is_none()
    }

    pub async fn active_backend(&self) -> Option<ScoringBackend> {
        self.state.read().await.backend.live_kind()
    }

    fn fallback(
        &self,
        quote: &Quote,
        persona: Persona,
        err: ScoreError,
    ) -> Result<Score, ScoreError> {
        match self.mode {
            RuntimeMode::Strict => Err(err),
            RuntimeMode::Permissive => {
                tracing::debug!(
                    symbol = %quote.symbol,
                    persona = %persona,
                    error = %err,
                    "substituting synthetic score"
                );
                Ok(synthetic::synthetic_score(quote, persona))
            }
        }
    }
}

#[async_trait]
impl ScoreFeed for ScoringService {
    async fn configure(&self, selection: &ProviderSelection, keys: &ApiKeys) {
        ScoringService::configure(self, selection, keys).await
    }

    async fn score_all(
        &self,
        quote: &Quote,
        personas: &[Persona],
    ) -> Result<Vec<Score>, ScoreError> {
        ScoringService::score_all(self, quote, personas).await
    }

    async fn is_synthetic(&self) -> bool {
        ScoringService::is_synthetic(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use dashboard_core::ScoreOrigin;

    struct CannedBackend {
        calls: AtomicUsize,
        fail_first: bool,
        completion: String,
    }

    impl CannedBackend {
        fn returning(completion: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail_first: false,
                completion: completion.to_string(),
            })
        }
    }

    #[async_trait]
    impl ScoreBackend for CannedBackend {
        fn backend(&self) -> ScoringBackend {
            ScoringBackend::OpenAi
        }

        async fn complete(
            &self,
            _model: &str,
            _temperature: f64,
            _system: &str,
            _user: &str,
        ) -> Result<String, ScoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(ScoreError::Backend {
                    backend: ScoringBackend::OpenAi,
                    message: "rate limited".to_string(),
                });
            }
            Ok(self.completion.clone())
        }
    }

    fn quote() -> Quote {
        Quote {
            symbol: "AAPL".to_string(),
            current_price: 182.5,
            previous_close: 180.0,
            change_percent: 1.39,
            volume: 64_000_000,
            market_cap: Some(2_800_000_000_000.0),
            observed_at: Utc::now(),
        }
    }

    fn selection(backend: ScoringBackend) -> ProviderSelection {
        ProviderSelection {
            quote_source: dashboard_core::QuoteSource::Yahoo,
            scoring_backend: backend,
            model: "gpt-3.5-turbo".to_string(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_permissive_scores_synthetically() {
        let service = ScoringService::new(RuntimeMode::Permissive);
        let scores = service
            .score_all(&quote(), &[Persona::Basic, Persona::Value])
            .await
            .unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| s.origin == ScoreOrigin::Synthetic));
        assert!(service.is_synthetic().await);
    }

    #[tokio::test]
    async fn test_unconfigured_strict_surfaces_error() {
        let service = ScoringService::new(RuntimeMode::Strict);
        let err = service
            .score_all(&quote(), &[Persona::Basic])
            .await
            .unwrap_err();
        assert!(matches!(err, ScoreError::NotConfigured));
    }

    #[tokio::test]
    async fn test_missing_key_degrades_in_permissive_mode() {
        let service = ScoringService::new(RuntimeMode::Permissive);
        service
            .configure(&selection(ScoringBackend::OpenAi), &ApiKeys::default())
            .await;
        assert!(service.is_synthetic().await);
        assert_eq!(service.active_backend().await, None);

        let score = service.score(&quote(), Persona::Basic).await.unwrap();
        assert_eq!(score.origin, ScoreOrigin::Synthetic);
    }

    #[tokio::test]
    async fn test_missing_key_errors_in_strict_mode() {
        let service = ScoringService::new(RuntimeMode::Strict);
        service
            .configure(&selection(ScoringBackend::Groq), &ApiKeys::default())
            .await;
        let err = service.score(&quote(), Persona::Basic).await.unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[tokio::test]
    async fn test_configure_goes_live_once_key_arrives() {
        let service = ScoringService::new(RuntimeMode::Permissive);
        let keys = ApiKeys::default();
        service.configure(&selection(ScoringBackend::Groq), &keys).await;
        assert!(service.is_synthetic().await);

        let keys = ApiKeys {
            groq: Some("gsk-test".to_string()),
            ..Default::default()
        };
        service.configure(&selection(ScoringBackend::Groq), &keys).await;
        assert!(!service.is_synthetic().await);
        assert_eq!(service.active_backend().await, Some(ScoringBackend::Groq));
    }

    #[tokio::test]
    async fn test_malformed_completion_becomes_midpoint_score() {
        let backend = CannedBackend::returning("I would rather write prose than JSON today.");
        let service =
            ScoringService::with_backend(RuntimeMode::Strict, ScoringBackend::OpenAi, backend);

        let score = service.score(&quote(), Persona::Basic).await.unwrap();
        assert_eq!(score.score, 50);
        assert_eq!(score.reason, "I would rather write prose than JSON today.");
        assert_eq!(score.origin, ScoreOrigin::OpenAi);
    }

    #[tokio::test]
    async fn test_one_failing_persona_keeps_the_rest() {
        let backend = Arc::new(CannedBackend {
            calls: AtomicUsize::new(0),
            fail_first: true,
            completion: r#"{"score": 64, "reason": "steady demand"}"#.to_string(),
        });
        let service =
            ScoringService::with_backend(RuntimeMode::Strict, ScoringBackend::OpenAi, backend);

        // The first persona's call errors; strict mode surfaces that as
        // a scoring failure, but the second persona still lands.
        let scores = service
            .score_all(&quote(), &[Persona::Basic, Persona::Value])
            .await
            .unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].persona, Persona::Value);
        assert_eq!(scores[0].score, 64);
        assert_eq!(scores[0].reason, "steady demand");
    }
}
