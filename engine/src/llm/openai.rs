use super::{ChatModel, LLMError, Message};
use crate::config::LlmConfig;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// OpenAI-compatible chat-completions client
pub struct OpenAIChat {
    config: LlmConfig,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIChat {
    pub fn new(config: LlmConfig, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config,
            api_key: api_key.into(),
            client,
        }
    }

    /// Build a client from `OPENAI_API_KEY`, or `None` when no key is set
    pub fn from_env(config: LlmConfig) -> Option<Self> {
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(|key| Self::new(config, key))
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, messages: &[Message], model: Option<&str>) -> super::Result<Option<String>> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let api_messages: Vec<_> = messages
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.to_string(),
                    "content": msg.content
                })
            })
            .collect();

        let model = model.unwrap_or(&self.config.model);
        let payload = json!({
            "model": model,
            "messages": api_messages,
            "temperature": self.config.temperature,
        });
        debug!("POST {} (model={}, messages={})", url, model, messages.len());

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else {
                    LLMError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(LLMError::AuthenticationFailed(text));
            } else if status.as_u16() == 429 {
                return Err(LLMError::RateLimitExceeded);
            } else if status.is_server_error() {
                return Err(LLMError::ProviderUnavailable(format!("{}: {}", status, text)));
            } else {
                return Err(LLMError::InvalidRequest(text));
            }
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let choice = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| LLMError::ParseError("No choices in response".to_string()))?;

        let content = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Ok(content)
    }
}
