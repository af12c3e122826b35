//! Synchronous Memory Adapter
//!
//! Exposes the synchronous [`Memory`] port to the hub while fronting an
//! asynchronous conversational thread. Spaces live in an in-process map keyed
//! by a generated id. The `targets` mapping routes space kinds to persistence
//! targets; spaces whose target is `thread` are additionally mirrored into the
//! conversational thread when the adapter runs in shared thread mode.
//!
//! The hub never suspends: mirroring is fire-and-forget on the attached tokio
//! runtime handle, and a failed mirror write is only logged.

use super::{PersistTarget, ThreadMemory, ThreadMode};
use sdk::errors::{HubError, Result};
use sdk::memory::Memory;
use sdk::types::{
    now_millis, Metadata, SpaceEvent, SpaceKind, SpaceMessage, SpaceSnapshot, STATUS_OPEN,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Persist-target key for workcell spaces
pub const TARGET_WORKCELL: &str = "workcell";

/// Persist-target key for orchestrator spaces
pub const TARGET_ORCH: &str = "orch";

/// Persist-target key for per-role scratch spaces
pub const TARGET_AGENT_ST: &str = "agent_st";

#[derive(Debug, Clone)]
struct SpaceRecord {
    kind: SpaceKind,
    name: Option<String>,
    parent_id: Option<String>,
    status: String,
    messages: Vec<SpaceMessage>,
    events: Vec<SpaceEvent>,
}

/// Default routing of space kinds to persistence targets
pub fn default_targets() -> BTreeMap<String, PersistTarget> {
    BTreeMap::from([
        (TARGET_WORKCELL.to_string(), PersistTarget::Inmem),
        (TARGET_ORCH.to_string(), PersistTarget::Graph),
        (TARGET_AGENT_ST.to_string(), PersistTarget::Inmem),
    ])
}

/// Synchronous memory port over an in-process space map
pub struct SyncMemoryAdapter {
    thread: Option<Arc<dyn ThreadMemory>>,
    handle: Option<Handle>,
    thread_mode: ThreadMode,
    targets: BTreeMap<String, PersistTarget>,
    spaces: RwLock<HashMap<String, SpaceRecord>>,
}

impl SyncMemoryAdapter {
    /// Create an adapter; `targets` entries override the defaults key by key
    pub fn new(
        thread_mode: ThreadMode,
        targets: Option<BTreeMap<String, PersistTarget>>,
    ) -> Self {
        let mut merged = default_targets();
        if let Some(overrides) = targets {
            merged.extend(overrides);
        }
        Self {
            thread: None,
            handle: None,
            thread_mode,
            targets: merged,
            spaces: RwLock::new(HashMap::new()),
        }
    }

    /// Adapter with default targets and no thread behind it
    pub fn in_memory() -> Self {
        Self::new(ThreadMode::Isolated, None)
    }

    /// Attach the asynchronous thread facade and the runtime used to drive it
    pub fn with_thread(mut self, thread: Arc<dyn ThreadMemory>, handle: Handle) -> Self {
        self.thread = Some(thread);
        self.handle = Some(handle);
        self
    }

    pub fn thread_mode(&self) -> ThreadMode {
        self.thread_mode
    }

    /// Copy of the kind-to-target routing
    pub fn targets(&self) -> BTreeMap<String, PersistTarget> {
        self.targets.clone()
    }

    /// Persistence target for spaces of `kind`
    pub fn target_for(&self, kind: SpaceKind) -> PersistTarget {
        let key = match kind {
            SpaceKind::Workcell => TARGET_WORKCELL,
            SpaceKind::St => TARGET_AGENT_ST,
            SpaceKind::Orch => TARGET_ORCH,
        };
        self.targets
            .get(key)
            .copied()
            .unwrap_or(PersistTarget::Inmem)
    }

    /// Full copy of a space's state
    pub fn space_snapshot(&self, space_id: &str) -> Result<SpaceSnapshot> {
        let spaces = self.read();
        let sp = spaces
            .get(space_id)
            .ok_or_else(|| HubError::UnknownSpace(space_id.to_string()))?;
        Ok(SpaceSnapshot {
            space_id: space_id.to_string(),
            kind: sp.kind,
            name: sp.name.clone(),
            parent_id: sp.parent_id.clone(),
            status: sp.status.clone(),
            messages: sp.messages.clone(),
            events: sp.events.clone(),
        })
    }

    /// Ids of the spaces directly parented under `space_id`
    pub fn children(&self, space_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .read()
            .iter()
            .filter(|(_, sp)| sp.parent_id.as_deref() == Some(space_id))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn contains(&self, space_id: &str) -> bool {
        self.read().contains_key(space_id)
    }

    /// Number of live spaces
    pub fn live_spaces(&self) -> usize {
        self.read().len()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SpaceRecord>> {
        self.spaces.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SpaceRecord>> {
        self.spaces.write().unwrap_or_else(|e| e.into_inner())
    }

    fn mirror_to_thread(&self, kind: SpaceKind, role: &str, content: &str) {
        if self.thread_mode != ThreadMode::Shared || self.target_for(kind) != PersistTarget::Thread
        {
            return;
        }
        let (Some(thread), Some(handle)) = (self.thread.as_ref(), self.handle.as_ref()) else {
            return;
        };

        let thread = Arc::clone(thread);
        let text = format!("[{}:{}] {}", kind, role, content);
        handle.spawn(async move {
            if let Err(e) = thread.add_assistant_message(&text).await {
                warn!("Thread mirror failed (ignored): {}", e);
            }
        });
    }
}

impl Memory for SyncMemoryAdapter {
    fn create_space(
        &self,
        kind: SpaceKind,
        name: Option<&str>,
        parent_id: Option<&str>,
    ) -> Result<String> {
        let sid = uuid::Uuid::new_v4().to_string();
        self.write().insert(
            sid.clone(),
            SpaceRecord {
                kind,
                name: name.map(str::to_string),
                parent_id: parent_id.map(str::to_string),
                status: STATUS_OPEN.to_string(),
                messages: Vec::new(),
                events: Vec::new(),
            },
        );
        debug!(
            "Created {} space {} (name={:?}, parent={:?}, target={})",
            kind,
            sid,
            name,
            parent_id,
            self.target_for(kind)
        );
        Ok(sid)
    }

    fn write_message(
        &self,
        space_id: &str,
        role: &str,
        content: &str,
        metadata: Option<Metadata>,
    ) -> Result<()> {
        let kind = {
            let mut spaces = self.write();
            let sp = spaces
                .get_mut(space_id)
                .ok_or_else(|| HubError::UnknownSpace(space_id.to_string()))?;
            sp.messages.push(SpaceMessage {
                ts: now_millis(),
                role: role.to_string(),
                content: content.to_string(),
                meta: metadata.unwrap_or_default(),
            });
            sp.kind
        };
        self.mirror_to_thread(kind, role, content);
        Ok(())
    }

    fn write_event(&self, space_id: &str, event_type: &str, payload: Value) -> Result<()> {
        let mut spaces = self.write();
        let sp = spaces
            .get_mut(space_id)
            .ok_or_else(|| HubError::UnknownSpace(space_id.to_string()))?;
        sp.events.push(SpaceEvent {
            ts: now_millis(),
            event_type: event_type.to_string(),
            payload,
        });
        Ok(())
    }

    fn set_status(&self, space_id: &str, status: &str) -> Result<()> {
        let mut spaces = self.write();
        let sp = spaces
            .get_mut(space_id)
            .ok_or_else(|| HubError::UnknownSpace(space_id.to_string()))?;
        sp.status = status.to_string();
        Ok(())
    }

    fn gc(&self, space_id: &str) {
        if self.write().remove(space_id).is_some() {
            debug!("Collected space {}", space_id);
        }
    }

    fn gc_tree(&self, space_id: &str) {
        let mut spaces = self.write();
        let mut pending = vec![space_id.to_string()];
        let mut collected = 0usize;

        while let Some(id) = pending.pop() {
            if spaces.remove(&id).is_some() {
                collected += 1;
            }
            pending.extend(
                spaces
                    .iter()
                    .filter(|(_, sp)| sp.parent_id.as_deref() == Some(id.as_str()))
                    .map(|(child, _)| child.clone()),
            );
        }
        debug!("Collected {} space(s) under {}", collected, space_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::LocalThreadMemory;
    use serde_json::json;

    #[test]
    fn test_create_space_starts_open_and_empty() {
        let adapter = SyncMemoryAdapter::in_memory();
        let sid = adapter
            .create_space(SpaceKind::Workcell, Some("wc:t1"), None)
            .unwrap();

        let snap = adapter.space_snapshot(&sid).unwrap();
        assert_eq!(snap.status, "open");
        assert_eq!(snap.kind, SpaceKind::Workcell);
        assert_eq!(snap.name.as_deref(), Some("wc:t1"));
        assert!(snap.messages.is_empty());
        assert!(snap.events.is_empty());
    }

    #[test]
    fn test_writes_are_ordered_and_visible() {
        let adapter = SyncMemoryAdapter::in_memory();
        let sid = adapter.create_space(SpaceKind::St, None, None).unwrap();

        adapter.write_message(&sid, "planner", "first", None).unwrap();
        let mut meta = Metadata::new();
        meta.insert("prompt".to_string(), json!("p"));
        adapter
            .write_message(&sid, "planner", "second", Some(meta))
            .unwrap();
        adapter.write_event(&sid, "start", json!({"a": 1})).unwrap();
        adapter.set_status(&sid, "running").unwrap();

        let snap = adapter.space_snapshot(&sid).unwrap();
        assert_eq!(snap.messages[0].content, "first");
        assert!(snap.messages[0].meta.is_empty());
        assert_eq!(snap.messages[1].meta["prompt"], "p");
        assert_eq!(snap.events[0].event_type, "start");
        assert_eq!(snap.status, "running");
    }

    #[test]
    fn test_unknown_space_errors() {
        let adapter = SyncMemoryAdapter::in_memory();
        assert!(matches!(
            adapter.write_message("nope", "coder", "x", None),
            Err(HubError::UnknownSpace(_))
        ));
        assert!(matches!(
            adapter.write_event("nope", "start", json!({})),
            Err(HubError::UnknownSpace(_))
        ));
        assert!(matches!(
            adapter.set_status("nope", "done"),
            Err(HubError::UnknownSpace(_))
        ));
        assert!(adapter.space_snapshot("nope").is_err());
    }

    #[test]
    fn test_gc_is_idempotent() {
        let adapter = SyncMemoryAdapter::in_memory();
        let sid = adapter.create_space(SpaceKind::Workcell, None, None).unwrap();
        adapter.gc(&sid);
        adapter.gc(&sid);
        adapter.gc("never-existed");
        assert!(!adapter.contains(&sid));
    }

    #[test]
    fn test_gc_tree_collects_descendants_only() {
        let adapter = SyncMemoryAdapter::in_memory();
        let wc = adapter.create_space(SpaceKind::Workcell, None, None).unwrap();
        let st = adapter.create_space(SpaceKind::St, None, Some(&wc)).unwrap();
        let nested = adapter
            .create_space(SpaceKind::Workcell, None, Some(&st))
            .unwrap();
        let other = adapter.create_space(SpaceKind::Workcell, None, None).unwrap();

        assert_eq!(adapter.children(&wc), vec![st.clone()]);
        adapter.gc_tree(&wc);

        assert!(!adapter.contains(&wc));
        assert!(!adapter.contains(&st));
        assert!(!adapter.contains(&nested));
        assert!(adapter.contains(&other));
    }

    #[test]
    fn test_targets_merge_over_defaults() {
        let overrides = BTreeMap::from([(TARGET_WORKCELL.to_string(), PersistTarget::Graph)]);
        let adapter = SyncMemoryAdapter::new(ThreadMode::Shared, Some(overrides));

        assert_eq!(adapter.thread_mode(), ThreadMode::Shared);
        assert_eq!(adapter.target_for(SpaceKind::Workcell), PersistTarget::Graph);
        assert_eq!(adapter.target_for(SpaceKind::Orch), PersistTarget::Graph);
        assert_eq!(adapter.target_for(SpaceKind::St), PersistTarget::Inmem);
        assert_eq!(adapter.targets().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_thread_target_mirrors_in_shared_mode() {
        let thread = Arc::new(LocalThreadMemory::new("u", "t"));
        let overrides = BTreeMap::from([(TARGET_WORKCELL.to_string(), PersistTarget::Thread)]);
        let adapter = SyncMemoryAdapter::new(ThreadMode::Shared, Some(overrides))
            .with_thread(thread.clone(), Handle::current());

        let wc = adapter.create_space(SpaceKind::Workcell, None, None).unwrap();
        let st = adapter.create_space(SpaceKind::St, None, Some(&wc)).unwrap();
        adapter.write_message(&wc, "coder", "mirrored", None).unwrap();
        adapter.write_message(&st, "coder", "not mirrored", None).unwrap();

        for _ in 0..50 {
            if !thread.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let recent = thread.list_recent_messages(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "[workcell:coder] mirrored");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_isolated_mode_never_mirrors() {
        let thread = Arc::new(LocalThreadMemory::new("u", "t"));
        let overrides = BTreeMap::from([(TARGET_WORKCELL.to_string(), PersistTarget::Thread)]);
        let adapter = SyncMemoryAdapter::new(ThreadMode::Isolated, Some(overrides))
            .with_thread(thread.clone(), Handle::current());

        let wc = adapter.create_space(SpaceKind::Workcell, None, None).unwrap();
        adapter.write_message(&wc, "coder", "stays local", None).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(thread.is_empty());
    }
}
