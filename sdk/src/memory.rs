//! Memory port
//!
//! The narrow, synchronous capability interface the hub uses to persist a run.
//! Every write is visible to the next call on the same space. Implementations
//! must be safe to share across concurrently running tickets.

use crate::errors::Result;
use crate::types::{Metadata, SpaceKind};
use serde_json::Value;

/// Hierarchical message/event store consumed by the hub
pub trait Memory: Send + Sync {
    /// Allocate a new, empty space with status "open" and return its id
    fn create_space(
        &self,
        kind: SpaceKind,
        name: Option<&str>,
        parent_id: Option<&str>,
    ) -> Result<String>;

    /// Append an ordered message
    ///
    /// Fails with `HubError::UnknownSpace` when `space_id` is not live.
    fn write_message(
        &self,
        space_id: &str,
        role: &str,
        content: &str,
        metadata: Option<Metadata>,
    ) -> Result<()>;

    /// Append an ordered, structured event
    ///
    /// Fails with `HubError::UnknownSpace` when `space_id` is not live.
    fn write_event(&self, space_id: &str, event_type: &str, payload: Value) -> Result<()>;

    /// Overwrite the status string of a space
    fn set_status(&self, space_id: &str, status: &str) -> Result<()>;

    /// Retire a space. Unknown ids are a no-op.
    fn gc(&self, space_id: &str);

    /// Retire a space together with every space parented under it
    ///
    /// Stores that do not track lineage fall back to `gc`.
    fn gc_tree(&self, space_id: &str) {
        self.gc(space_id);
    }
}
