//! Conversational Thread Memory
//!
//! The asynchronous, user-facing conversation history the chat facade reads
//! context from and persists turns into. `LocalThreadMemory` keeps the thread
//! in process and trims old turns once the estimated token count exceeds its
//! context limit, always keeping the two most recent turns.

use crate::llm::{Message, MessageRole};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

/// Default context limit in tokens
const DEFAULT_CONTEXT_LIMIT: usize = 8000;

/// Average characters per token (rough estimate: 1 token ≈ 4 characters)
const CHARS_PER_TOKEN: usize = 4;

/// Per-message overhead for role and structure
const MESSAGE_OVERHEAD_TOKENS: usize = 10;

/// Asynchronous conversation store behind the chat facade
#[async_trait]
pub trait ThreadMemory: Send + Sync {
    async fn add_user_message(&self, content: &str) -> Result<()>;

    async fn add_assistant_message(&self, content: &str) -> Result<()>;

    /// Compact context block for a system prompt. Empty when there is nothing
    /// worth injecting.
    async fn build_context_block(&self, include_recent: bool, recent_limit: usize)
        -> Result<String>;

    /// Last `limit` messages, oldest first
    async fn list_recent_messages(&self, limit: usize) -> Result<Vec<Message>>;

    /// Case-insensitive search, newest first, identical contents collapsed
    async fn search_text(&self, query: &str, limit: usize) -> Result<Vec<Message>>;
}

#[derive(Debug)]
struct History {
    messages: Vec<Message>,
    token_count: usize,
}

/// In-process conversation thread
#[derive(Debug)]
pub struct LocalThreadMemory {
    user_id: String,
    thread_id: String,
    context_limit: usize,
    history: Mutex<History>,
}

impl LocalThreadMemory {
    pub fn new(user_id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self::with_limit(user_id, thread_id, DEFAULT_CONTEXT_LIMIT)
    }

    pub fn with_limit(
        user_id: impl Into<String>,
        thread_id: impl Into<String>,
        context_limit: usize,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            thread_id: thread_id.into(),
            context_limit,
            history: Mutex::new(History {
                messages: Vec::new(),
                token_count: 0,
            }),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn context_limit(&self) -> usize {
        self.context_limit
    }

    /// Current estimated token count
    pub fn token_count(&self) -> usize {
        self.lock().token_count
    }

    /// Number of messages currently held
    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, message: Message) {
        // Blank turns carry no context
        if message.content.trim().is_empty() {
            return;
        }
        let message = Message {
            content: message.content.trim().to_string(),
            ..message
        };

        let mut history = self.lock();
        history.token_count += Self::estimate_tokens(&message);
        history.messages.push(message);

        // Drop the oldest turns, keeping at least the latest exchange
        while history.token_count > self.context_limit && history.messages.len() > 2 {
            let removed = history.messages.remove(0);
            history.token_count = history
                .token_count
                .saturating_sub(Self::estimate_tokens(&removed));
        }
    }

    fn estimate_tokens(message: &Message) -> usize {
        message.content.len().div_ceil(CHARS_PER_TOKEN) + MESSAGE_OVERHEAD_TOKENS
    }
}

#[async_trait]
impl ThreadMemory for LocalThreadMemory {
    async fn add_user_message(&self, content: &str) -> Result<()> {
        self.push(Message::user(content));
        Ok(())
    }

    async fn add_assistant_message(&self, content: &str) -> Result<()> {
        self.push(Message::assistant(content));
        Ok(())
    }

    async fn build_context_block(
        &self,
        include_recent: bool,
        recent_limit: usize,
    ) -> Result<String> {
        if !include_recent || recent_limit == 0 {
            return Ok(String::new());
        }
        let recent = self.list_recent_messages(recent_limit).await?;
        if recent.is_empty() {
            return Ok(String::new());
        }

        let lines: Vec<String> = recent
            .iter()
            .map(|m| format!("- {}: {}", m.role, m.content))
            .collect();
        Ok(format!("Recent messages:\n{}", lines.join("\n")))
    }

    async fn list_recent_messages(&self, limit: usize) -> Result<Vec<Message>> {
        let history = self.lock();
        let skip = history.messages.len().saturating_sub(limit);
        Ok(history.messages[skip..].to_vec())
    }

    async fn search_text(&self, query: &str, limit: usize) -> Result<Vec<Message>> {
        let needle = query.trim().to_lowercase();
        let history = self.lock();
        let mut seen = HashSet::new();

        let hits = history
            .messages
            .iter()
            .rev()
            .filter(|m| m.role != MessageRole::System)
            .filter(|m| needle.is_empty() || m.content.to_lowercase().contains(&needle))
            .filter(|m| seen.insert(m.content.clone()))
            .take(limit)
            .cloned()
            .collect();
        Ok(hits)
    }
}
