//! LLM Collaborator
//!
//! The chat-completion endpoint is an external collaborator. This module
//! defines the message model shared by spokes and the chat facade, the
//! [`ChatModel`] contract, an OpenAI-compatible client and the runner that
//! turns a model into a synchronous spoke implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod openai;
pub mod runner;

pub use openai::OpenAIChat;
pub use runner::LlmRunner;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<LLMError> for sdk::HubError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::NetworkError(msg) => sdk::HubError::Network(msg),
            LLMError::Timeout => sdk::HubError::Network("request timed out".to_string()),
            other => sdk::HubError::LLMProvider(other.to_string()),
        }
    }
}

/// Message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender (user, assistant, system)
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// Chat-completion collaborator
///
/// Given an ordered message list and an optional model override, returns the
/// reply text. `Ok(None)` means the endpoint answered without usable content;
/// callers must tolerate it.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Short provider name for logs and diagnostics
    fn name(&self) -> &str;

    async fn chat(&self, messages: &[Message], model: Option<&str>) -> Result<Option<String>>;
}
