//! Memory Substrate
//!
//! The synchronous memory adapter the hub writes through, the persistence
//! configuration enums it is built from, and the asynchronous conversational
//! thread it can front.

pub mod adapter;
pub mod thread;

pub use adapter::SyncMemoryAdapter;
pub use thread::{LocalThreadMemory, ThreadMemory};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where spaces of a given kind are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistTarget {
    /// In-process map, gone with the process
    Inmem,
    /// Mirrored into the conversational thread
    Thread,
    /// Long-term graph store
    Graph,
}

impl PersistTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersistTarget::Inmem => "inmem",
            PersistTarget::Thread => "thread",
            PersistTarget::Graph => "graph",
        }
    }
}

impl fmt::Display for PersistTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersistTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inmem" => Ok(PersistTarget::Inmem),
            "thread" => Ok(PersistTarget::Thread),
            "graph" => Ok(PersistTarget::Graph),
            other => Err(format!(
                "invalid persist target '{}'. Must be one of: inmem, thread, graph",
                other
            )),
        }
    }
}

/// Whether runs share the user's conversational thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadMode {
    #[default]
    Isolated,
    Shared,
}

impl ThreadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadMode::Isolated => "isolated",
            ThreadMode::Shared => "shared",
        }
    }

    /// Lenient parse used for environment overrides: anything but "shared"
    /// is isolated
    pub fn from_env_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("shared") {
            ThreadMode::Shared
        } else {
            ThreadMode::Isolated
        }
    }
}

impl fmt::Display for ThreadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
