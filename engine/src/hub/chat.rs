//! Chat Facade
//!
//! Single-turn conversational replies that skip the ticket pipeline but still
//! persist both turns to the conversational thread. Persistence failures never
//! reach the caller.
//!
//! The facade is also what backs the hub's synchronous reply hook. While that
//! hook runs, a thread-local guard is set so that a hub invoked from inside
//! the facade does not call back into it.

use crate::best_effort::best_effort_async;
use crate::llm::{ChatModel, Message};
use crate::memory::ThreadMemory;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

thread_local! {
    static IN_CHAT_FACADE: Cell<bool> = const { Cell::new(false) };
}

/// True while the current thread is executing the chat reply hook
pub fn in_chat_facade() -> bool {
    IN_CHAT_FACADE.with(Cell::get)
}

/// Marks the current thread as inside the chat facade until dropped
pub struct ChatGuard {
    previous: bool,
}

impl ChatGuard {
    pub fn enter() -> Self {
        let previous = IN_CHAT_FACADE.with(|flag| flag.replace(true));
        Self { previous }
    }
}

impl Drop for ChatGuard {
    fn drop(&mut self) {
        let previous = self.previous;
        IN_CHAT_FACADE.with(|flag| flag.set(previous));
    }
}

/// Reply plus the steps that produced it, as `(role, content)` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub steps: Vec<(String, String)>,
}

/// Anything that can hold a single-turn conversation
#[async_trait]
pub trait Conversation: Send + Sync {
    /// Plain reply. `Ok(None)` means this conversation has no direct reply path.
    async fn reply(&self, _text: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    async fn converse(&self, text: &str) -> anyhow::Result<ChatReply>;
}

/// Synchronous reply hook installed on the hub
pub type ChatReplyHook = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Literal reply used when no completion is available
pub fn heard_you(prompt: &str) -> String {
    format!("Ich habe dich gehört: „{}“ (LLM nicht verfügbar).", prompt)
}

/// Chat facade over the conversational thread and the LLM collaborator
pub struct HubChatFacade {
    thread: Arc<dyn ThreadMemory>,
    model: Option<Arc<dyn ChatModel>>,
    user_id: String,
    thread_id: String,
    recent_limit: usize,
}

impl HubChatFacade {
    pub fn new(
        thread: Arc<dyn ThreadMemory>,
        model: Option<Arc<dyn ChatModel>>,
        user_id: impl Into<String>,
        thread_id: impl Into<String>,
    ) -> Self {
        Self {
            thread,
            model,
            user_id: user_id.into(),
            thread_id: thread_id.into(),
            recent_limit: 8,
        }
    }

    pub fn with_recent_limit(mut self, recent_limit: usize) -> Self {
        self.recent_limit = recent_limit;
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    async fn build_messages(&self, prompt: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        let context = best_effort_async(
            "context block",
            self.thread.build_context_block(true, self.recent_limit),
        )
        .await
        .unwrap_or_default();

        if !context.trim().is_empty() {
            messages.push(Message::system(format!(
                "Nutze folgenden kompakten Kontext:\n{}",
                context
            )));
        }
        messages.push(Message::user(prompt));
        messages
    }

    async fn complete(&self, prompt: &str) -> Option<String> {
        let model = self.model.as_ref()?;
        let messages = self.build_messages(prompt).await;
        match model.chat(&messages, None).await {
            Ok(reply) => reply.filter(|r| !r.trim().is_empty()),
            Err(e) => {
                warn!("Chat completion via {} failed: {}", model.name(), e);
                None
            }
        }
    }
}

#[async_trait]
impl Conversation for HubChatFacade {
    async fn converse(&self, text: &str) -> anyhow::Result<ChatReply> {
        best_effort_async("persist user turn", self.thread.add_user_message(text)).await;

        let reply = match self.complete(text).await {
            Some(reply) => reply,
            None => heard_you(text),
        };

        best_effort_async(
            "persist assistant turn",
            self.thread.add_assistant_message(&reply),
        )
        .await;

        debug!(
            "Chat reply for {} on {} ({} chars)",
            self.user_id,
            self.thread_id,
            reply.len()
        );
        Ok(ChatReply {
            steps: vec![("assistant".to_string(), reply.clone())],
            reply,
        })
    }
}

/// Bridge a conversation into the hub's synchronous reply hook
///
/// The hook blocks on `handle`, so it must only be called from a thread that
/// is not driving that runtime. Errors and empty replies yield `None`.
pub fn sync_reply_hook(conversation: Arc<dyn Conversation>, handle: Handle) -> ChatReplyHook {
    Arc::new(move |text: &str| {
        let _guard = ChatGuard::enter();
        let conversation = Arc::clone(&conversation);
        match handle.block_on(async move {
            match conversation.reply(text).await? {
                Some(reply) => Ok(Some(reply)),
                None => conversation.converse(text).await.map(|out| Some(out.reply)),
            }
        }) {
            Ok(reply) => reply.filter(|r| !r.is_empty()),
            Err(e) => {
                warn!("Chat reply hook failed: {}", e);
                None
            }
        }
    })
}
