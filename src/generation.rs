//! Text-generation provider.
//!
//! A single chat-completion call against an OpenAI-compatible
//! `/chat/completions` endpoint. Unlike embeddings, generation is never
//! retried: a failed call surfaces to the caller as a [`GenerationError`].

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::config::GenerationConfig;

/// One system instruction plus one user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation service rejected the API key ({status}): {message}")]
    Authentication { status: u16, message: String },
    #[error("generation service rate limit or quota exceeded: {0}")]
    RateLimited(String),
    #[error("generation service unreachable: {0}")]
    Transport(String),
    #[error("generation service error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid generation response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn model_name(&self) -> &str;
    /// Return the text of the first completion choice.
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Chat completions over HTTP (`POST {url}/chat/completions`).
pub struct OpenAIChatProvider {
    model: String,
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIChatProvider {
    pub fn new(config: &GenerationConfig, api_key: &str) -> anyhow::Result<Self> {
        if api_key.trim().is_empty() {
            anyhow::bail!("generation provider requires an API key");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            url: config.url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }
}

#[async_trait]
impl GenerationProvider for OpenAIChatProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "temperature": request.temperature,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), message));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
        parse_chat_response(&json)
    }
}

fn classify_status(status: u16, message: String) -> GenerationError {
    match status {
        401 | 403 => GenerationError::Authentication { status, message },
        429 => GenerationError::RateLimited(message),
        _ => GenerationError::Api { status, message },
    }
}

/// Pull `choices[0].message.content` out of a chat-completion response.
fn parse_chat_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            GenerationError::InvalidResponse("missing choices[0].message.content".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_choice() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "  10 hours per month. " } }
            ]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "  10 hours per month. ");
    }

    #[test]
    fn missing_content_is_invalid_response() {
        let json = serde_json::json!({ "choices": [] });
        assert!(matches!(
            parse_chat_response(&json),
            Err(GenerationError::InvalidResponse(_))
        ));
    }

    #[test]
    fn status_codes_are_classified() {
        assert!(matches!(
            classify_status(401, String::new()),
            GenerationError::Authentication { status: 401, .. }
        ));
        assert!(matches!(
            classify_status(429, String::new()),
            GenerationError::RateLimited(_)
        ));
        assert!(matches!(
            classify_status(500, String::new()),
            GenerationError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(OpenAIChatProvider::new(&GenerationConfig::default(), " ").is_err());
    }
}
