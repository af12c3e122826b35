//! LLM-backed spoke implementation

use super::{ChatModel, Message};
use crate::registry::Runner;
use sdk::errors::{HubError, Result};
use sdk::types::Role;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

/// Runs a prompt against a [`ChatModel`] from the synchronous pipeline
///
/// Must be invoked from a thread that is not driving the runtime behind
/// `handle` (e.g. inside `spawn_blocking`), since it blocks on the reply.
pub struct LlmRunner {
    role: Role,
    model: Arc<dyn ChatModel>,
    model_name: Option<String>,
    system_prompt: Option<String>,
    handle: Handle,
}

impl LlmRunner {
    pub fn new(role: Role, model: Arc<dyn ChatModel>, handle: Handle) -> Self {
        Self {
            role,
            model,
            model_name: None,
            system_prompt: None,
            handle,
        }
    }

    pub fn with_model_name(mut self, name: Option<String>) -> Self {
        self.model_name = name;
        self
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }

    fn messages(&self, prompt: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(prompt));
        messages
    }
}

impl Runner for LlmRunner {
    fn run(&self, prompt: &str) -> Result<String> {
        let messages = self.messages(prompt);
        debug!(
            "{} spoke calling {} ({} chars)",
            self.role,
            self.model.name(),
            prompt.len()
        );

        let reply = self
            .handle
            .block_on(self.model.chat(&messages, self.model_name.as_deref()))
            .map_err(|e| HubError::impl_failure(self.role.as_str(), HubError::from(e).to_string()))?;

        reply.ok_or_else(|| HubError::impl_failure(self.role.as_str(), "model returned no content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Scripted {
        reply: Option<String>,
        fail: bool,
        seen: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl ChatModel for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(
            &self,
            messages: &[Message],
            _model: Option<&str>,
        ) -> crate::llm::Result<Option<String>> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            if self.fail {
                return Err(LLMError::RateLimitExceeded);
            }
            Ok(self.reply.clone())
        }
    }

    fn scripted(reply: Option<&str>, fail: bool) -> Arc<Scripted> {
        Arc::new(Scripted {
            reply: reply.map(str::to_string),
            fail,
            seen: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_returns_reply_with_system_prompt() {
        let model = scripted(Some("PLAN"), false);
        let runner = LlmRunner::new(Role::Planner, model.clone(), Handle::current())
            .with_system_prompt(Some("be brief".to_string()));

        let out = tokio::task::spawn_blocking(move || runner.run("goal"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out, "PLAN");

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], Message::system("be brief"));
        assert_eq!(seen[1], Message::user("goal"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_empty_reply_is_impl_failure() {
        let runner = LlmRunner::new(Role::Coder, scripted(None, false), Handle::current());
        let err = tokio::task::spawn_blocking(move || runner.run("x"))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, HubError::ImplFailure { ref role, .. } if role == "coder"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_model_error_is_impl_failure() {
        let runner = LlmRunner::new(Role::Critic, scripted(None, true), Handle::current());
        let err = tokio::task::spawn_blocking(move || runner.run("x"))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, HubError::ImplFailure { ref role, .. } if role == "critic"));
        assert!(err
            .to_string()
            .contains("LLM provider error: Rate limit exceeded"));
    }
}
