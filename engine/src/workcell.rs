//! Workcell I/O
//!
//! A workcell is the memory space scoped to one ticket run. Opening it also
//! creates one scratch space per pipeline role. Every step output lands in
//! the workcell and is mirrored into the role's scratch space.

use crate::best_effort::best_effort;
use sdk::errors::Result;
use sdk::memory::Memory;
use sdk::types::{Metadata, Role, SpaceKind, STATUS_DONE, STATUS_RUNNING};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Space ids of an opened workcell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedWorkcell {
    pub workcell_sid: String,
    /// Per-role scratch spaces (planner, coder, critic)
    pub st_ids: BTreeMap<Role, String>,
}

/// Step I/O helper over a [`Memory`] port
#[derive(Clone)]
pub struct WorkcellIo {
    memory: Arc<dyn Memory>,
    cascade_gc: bool,
}

impl WorkcellIo {
    pub fn new(memory: Arc<dyn Memory>) -> Self {
        Self {
            memory,
            cascade_gc: false,
        }
    }

    /// Collect child spaces together with the workcell on close
    pub fn with_cascade_gc(mut self, cascade: bool) -> Self {
        self.cascade_gc = cascade;
        self
    }

    pub fn memory(&self) -> &Arc<dyn Memory> {
        &self.memory
    }

    /// Open (or reuse) a workcell and create fresh per-role child spaces
    pub fn open(&self, ticket_id: &str, workcell_space_id: Option<&str>) -> Result<OpenedWorkcell> {
        let workcell_sid = match workcell_space_id {
            Some(sid) => sid.to_string(),
            None => self.memory.create_space(
                SpaceKind::Workcell,
                Some(&format!("wc:{}", ticket_id)),
                None,
            )?,
        };

        let mut st_ids = BTreeMap::new();
        for role in Role::PIPELINE {
            let sid = self
                .memory
                .create_space(SpaceKind::St, Some(role.as_str()), Some(&workcell_sid))?;
            st_ids.insert(role, sid);
        }

        self.memory.set_status(&workcell_sid, STATUS_RUNNING)?;
        debug!("Opened workcell {} for ticket {}", workcell_sid, ticket_id);

        Ok(OpenedWorkcell {
            workcell_sid,
            st_ids,
        })
    }

    /// Record the "start" event
    pub fn start(&self, workcell_sid: &str, payload: Value) {
        self.event(workcell_sid, "start", payload);
    }

    /// Write a step output to the workcell and mirror it to the role's space
    ///
    /// The prompt is attached as metadata on the workcell message only.
    pub fn step_out(
        &self,
        workcell_sid: &str,
        st_ids: &BTreeMap<Role, String>,
        role: Role,
        content: &str,
        prompt: Option<&str>,
    ) -> Result<()> {
        let metadata = prompt.filter(|p| !p.is_empty()).map(|p| {
            let mut meta = Metadata::new();
            meta.insert("prompt".to_string(), json!(p));
            meta
        });

        self.memory
            .write_message(workcell_sid, role.as_str(), content, metadata)?;

        if let Some(sid) = st_ids.get(&role) {
            self.memory.write_message(sid, role.as_str(), content, None)?;
        }
        Ok(())
    }

    /// Mark the workcell done, record the outcome, and optionally collect it
    pub fn close(&self, workcell_sid: &str, review: &str, impl_ok: bool, do_gc: bool) -> Result<()> {
        self.memory.set_status(workcell_sid, STATUS_DONE)?;
        self.event(
            workcell_sid,
            "done",
            json!({ "impl_ok": impl_ok, "review": review }),
        );

        if do_gc {
            if self.cascade_gc {
                self.memory.gc_tree(workcell_sid);
            } else {
                self.memory.gc(workcell_sid);
            }
        }
        debug!("Closed workcell {} (impl_ok={})", workcell_sid, impl_ok);
        Ok(())
    }

    fn event(&self, workcell_sid: &str, event_type: &str, payload: Value) {
        best_effort(&format!("{} event on {}", event_type, workcell_sid), || {
            self.memory.write_event(workcell_sid, event_type, payload)
        });
    }
}
