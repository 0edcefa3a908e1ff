use async_trait::async_trait;
use dashboard_core::{ScoreError, ScoringBackend};

use crate::backend::ScoreBackend;
use crate::chat::ChatClient;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Groq exposes the same chat completions wire format as OpenAI, so
/// only the endpoint and credentials differ.
pub struct GroqBackend {
    chat: ChatClient,
}

impl GroqBackend {
    pub fn new(api_key: String) -> Self {
        let base_url = std::env::var("GROQ_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self {
            chat: ChatClient::new(ScoringBackend::Groq, base_url, api_key),
        }
    }
}

#[async_trait]
impl ScoreBackend for GroqBackend {
    fn backend(&self) -> ScoringBackend {
        ScoringBackend::Groq
    }

    async fn complete(
        &self,
        model: &str,
        temperature: f64,
        system: &str,
        user: &str,
    ) -> Result<String, ScoreError> {
        self.chat.complete(model, temperature, system, user).await
    }
}
