use async_trait::async_trait;
use dashboard_core::{ScoreError, ScoringBackend};

use crate::backend::ScoreBackend;
use crate::chat::ChatClient;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiBackend {
    chat: ChatClient,
}

impl OpenAiBackend {
    pub fn new(api_key: String) -> Self {
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self {
            chat: ChatClient::new(ScoringBackend::OpenAi, base_url, api_key),
        }
    }
}

#[async_trait]
impl ScoreBackend for OpenAiBackend {
    fn backend(&self) -> ScoringBackend {
        ScoringBackend::OpenAi
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
