//! Shared fixtures for integration tests

#![allow(dead_code)]

use captain_engine::memory::SyncMemoryAdapter;
use captain_engine::registry::Runner;
use sdk::errors::{HubError, Result};
use sdk::memory::Memory;
use sdk::types::{Metadata, SpaceKind};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Runner that always answers with the same text
pub struct Fixed(pub String);

impl Fixed {
    pub fn new(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl Runner for Fixed {
    fn run(&self, _prompt: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Runner that always fails with the given error
pub struct Failing(pub fn() -> HubError);

impl Runner for Failing {
    fn run(&self, _prompt: &str) -> Result<String> {
        Err((self.0)())
    }
}

/// Runner that counts its calls and remembers the last prompt
#[derive(Default)]
pub struct Counting {
    pub reply: String,
    pub calls: AtomicUsize,
    pub last_prompt: Mutex<Option<String>>,
}

impl Counting {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Runner for Counting {
    fn run(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        Ok(self.reply.clone())
    }
}

/// Memory that forwards to an in-memory adapter and keeps a journal
pub struct RecordingMemory {
    pub inner: SyncMemoryAdapter,
    pub messages: Mutex<Vec<(String, String, String)>>,
    pub statuses: Mutex<Vec<(String, String)>>,
    pub collected: Mutex<Vec<String>>,
    pub events: Mutex<Vec<(String, String, Value)>>,
}

impl RecordingMemory {
    pub fn new() -> Self {
        Self {
            inner: SyncMemoryAdapter::in_memory(),
            messages: Mutex::new(Vec::new()),
            statuses: Mutex::new(Vec::new()),
            collected: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Contents written to a space, in order
    pub fn contents(&self, space_id: &str) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(sid, _, _)| sid == space_id)
            .map(|(_, _, content)| content.clone())
            .collect()
    }

    /// Status transitions of a space, in order
    pub fn status_history(&self, space_id: &str) -> Vec<String> {
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .filter(|(sid, _)| sid == space_id)
            .map(|(_, status)| status.clone())
            .collect()
    }

    /// Payload of the first event of `event_type` written to a space
    pub fn event_payload(&self, space_id: &str, event_type: &str) -> Option<Value> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|(sid, kind, _)| sid == space_id && kind == event_type)
            .map(|(_, _, payload)| payload.clone())
    }

    pub fn was_collected(&self, space_id: &str) -> bool {
        self.collected.lock().unwrap().iter().any(|s| s == space_id)
    }
}

impl Memory for RecordingMemory {
    fn create_space(
        &self,
        kind: SpaceKind,
        name: Option<&str>,
        parent_id: Option<&str>,
    ) -> Result<String> {
        self.inner.create_space(kind, name, parent_id)
    }

    fn write_message(
        &self,
        space_id: &str,
        role: &str,
        content: &str,
        metadata: Option<Metadata>,
    ) -> Result<()> {
        self.inner.write_message(space_id, role, content, metadata)?;
        self.messages.lock().unwrap().push((
            space_id.to_string(),
            role.to_string(),
            content.to_string(),
        ));
        Ok(())
    }

    fn write_event(&self, space_id: &str, event_type: &str, payload: Value) -> Result<()> {
        self.inner.write_event(space_id, event_type, payload.clone())?;
        self.events.lock().unwrap().push((
            space_id.to_string(),
            event_type.to_string(),
            payload,
        ));
        Ok(())
    }

    fn set_status(&self, space_id: &str, status: &str) -> Result<()> {
        self.inner.set_status(space_id, status)?;
        self.statuses
            .lock()
            .unwrap()
            .push((space_id.to_string(), status.to_string()));
        Ok(())
    }

    fn gc(&self, space_id: &str) {
        self.collected.lock().unwrap().push(space_id.to_string());
        self.inner.gc(space_id);
    }
}
