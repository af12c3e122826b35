//! Captain SDK
//!
//! Shared contracts for the orchestration engine: the error taxonomy, the
//! ticket and memory-space types, and the synchronous memory port that
//! backends implement.

/// Error types and handling
pub mod errors;

/// Synchronous memory port
pub mod memory;

/// Ticket, run and space types
pub mod types;

// Re-export commonly used types
pub use errors::{HubError, HubErrorExt};
pub use memory::Memory;
pub use types::{
    Metadata, OrchestrationRun, Role, SpaceEvent, SpaceKind, SpaceMessage, SpaceSnapshot, Ticket,
    TicketResult, TicketStatus,
};
