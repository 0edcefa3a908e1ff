use std::time::Duration;

use dashboard_core::{Persona, Score, ScoreError, ScoreOrigin, ScoringBackend};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_COMPLETION_TOKENS: u32 = 200;
const REASON_TRUNCATE_CHARS: usize = 200;
const FALLBACK_REASON: &str = "AI analysis completed";

/// Thin client for the OpenAI-compatible chat completions wire format,
/// shared by every scoring backend that speaks it.
pub(crate) struct ChatClient {
    http: Client,
    backend: ScoringBackend,
    base_url: String,
    api_key: String,
}

impl ChatClient {
    pub(crate) fn new(backend: ScoringBackend, base_url: String, api_key: String) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            backend,
            base_url,
            api_key,
        }
    }

    /// One chat completion round trip. Returns the first choice's
    /// message content.
    pub(crate) async fn complete(
        &self,
        model: &str,
        temperature: f64,
        system: &str,
        user: &str,
    ) -> Result<String, ScoreError> {
        let url = format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: MAX_COMPLETION_TOKENS,
            temperature,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ScoreError::Backend {
                backend: self.backend,
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ScoreError::RateLimited {
                backend: self.backend,
                message: format!("HTTP {}", status),
            });
        }
        if !status.is_success() {
            return Err(ScoreError::Backend {
                backend: self.backend,
                message: format!(
                    "HTTP {}: {}",
                    status,
                    response.text().await.unwrap_or_default()
                ),
            });
        }

        let body: ChatResponse = response.json().await.map_err(|e| ScoreError::Backend {
            backend: self.backend,
            message: e.to_string(),
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(ScoreError::EmptyCompletion {
                backend: self.backend,
            });
        }
        Ok(content)
    }
}

/// Turn a completion into a score. A well-formed `{"score", "reason"}`
/// object is used as-is (clamped); anything else degrades to a neutral
/// 50 with the raw text as the reason. Parsing never fails.
pub fn score_from_completion(persona: Persona, origin: ScoreOrigin, raw: &str) -> Score {
    let trimmed = raw.trim();
    let candidate = extract_json(trimmed).unwrap_or_else(|| trimmed.to_string());

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&candidate) {
        let score = map.get("score").and_then(coerce_score).unwrap_or(50);
        let reason = map
            .get("reason")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| FALLBACK_REASON.to_string());
        return Score::clamped(persona, origin, score, reason);
    }

    let reason = if trimmed.is_empty() {
        FALLBACK_REASON.to_string()
    } else {
        trimmed.chars().take(REASON_TRUNCATE_CHARS).collect()
    };
    Score {
        persona,
        origin,
        score: 50,
        reason,
    }
}

/// Pull a JSON object out of a completion that may be wrapped in
/// Markdown fences or prose
fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

fn coerce_score(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    if let Some(f) = value.as_f64() {
        return Some(f as i64);
    }
    value.as_str().and_then(|s| {
        let s = s.trim();
        s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
    })
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
