use std::sync::Arc;

use async_trait::async_trait;
use dashboard_core::{ApiKeys, ScoreError, ScoringBackend};

use crate::groq::GroqBackend;
use crate::openai::OpenAiBackend;

/// One concrete completion backend. Implementations own their wire
/// client and credentials.
#[async_trait]
pub trait ScoreBackend: Send + Sync {
    fn backend(&self) -> ScoringBackend;

    async fn complete(
        &self,
        model: &str,
        temperature: f64,
        system: &str,
        user: &str,
    ) -> Result<String, ScoreError>;
}

/// Build the backend for the selected provider. Every backend needs a
/// key, so a missing one fails closed here rather than at request time.
pub fn build_backend(
    backend: ScoringBackend,
    keys: &ApiKeys,
) -> Result<Arc<dyn ScoreBackend>, ScoreError> {
    let key = keys
        .scoring_key(backend)
        .ok_or(ScoreError::MissingApiKey { backend })?
        .to_string();
    let built: Arc<dyn ScoreBackend> = match backend {
        ScoringBackend::OpenAi => Arc::new(OpenAiBackend::new(key)),
        ScoringBackend::Groq => Arc::new(GroqBackend::new(key)),
    };
    Ok(built)
}
