//! Ticket, run and memory space types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Metadata attached to a space message
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Status written when a space is created
pub const STATUS_OPEN: &str = "open";

/// Status of a workcell while its pipeline runs
pub const STATUS_RUNNING: &str = "running";

/// Status of a workcell after a clean close
pub const STATUS_DONE: &str = "done";

/// Role a spoke plays in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Planner,
    Coder,
    Critic,
    BuilderCaptain,
}

impl Role {
    /// Roles that own a scratch space inside every workcell
    pub const PIPELINE: [Role; 3] = [Role::Planner, Role::Coder, Role::Critic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Planner => "planner",
            Role::Coder => "coder",
            Role::Critic => "critic",
            Role::BuilderCaptain => "builder_captain",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "planner" => Ok(Role::Planner),
            "coder" => Ok(Role::Coder),
            "critic" => Ok(Role::Critic),
            "builder_captain" => Ok(Role::BuilderCaptain),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Informational lifecycle of a ticket, tracked by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    #[default]
    Pending,
    Running,
    Done,
    Failed,
}

/// Unit of work handed to the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub goal: String,
    #[serde(default)]
    pub deliverables: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Existing space to reuse as the workcell
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workcell_space_id: Option<String>,
    #[serde(default)]
    pub status: TicketStatus,
}

impl Ticket {
    pub fn new(ticket_id: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            goal: goal.into(),
            deliverables: Vec::new(),
            constraints: Vec::new(),
            workcell_space_id: None,
            status: TicketStatus::Pending,
        }
    }

    pub fn with_deliverables<I, S>(mut self, deliverables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deliverables = deliverables.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_constraints<I, S>(mut self, constraints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints = constraints.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_workcell(mut self, space_id: impl Into<String>) -> Self {
        self.workcell_space_id = Some(space_id.into());
        self
    }
}

/// Correlates one pipeline invocation with external bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationRun {
    pub run_id: String,
}

impl OrchestrationRun {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }
}

/// Aggregate outcome of `run_ticket`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketResult {
    pub plan: String,
    #[serde(rename = "impl")]
    pub implementation: String,
    pub review: String,
    pub workcell_space_id: String,
}

/// Kind tag of a memory space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceKind {
    /// One ticket run
    Workcell,
    /// Single-topic scratch space of one role inside a workcell
    St,
    /// Orchestrator-level bookkeeping
    Orch,
}

impl SpaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpaceKind::Workcell => "workcell",
            SpaceKind::St => "st",
            SpaceKind::Orch => "orch",
        }
    }
}

impl fmt::Display for SpaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered message stored in a space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceMessage {
    /// Milliseconds since the Unix epoch
    pub ts: u64,
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub meta: Metadata,
}

/// Ordered structured event stored in a space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceEvent {
    pub ts: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
}

/// Full copy of one space, for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceSnapshot {
    pub space_id: String,
    pub kind: SpaceKind,
    pub name: Option<String>,
    pub parent_id: Option<String>,
    pub status: String,
    pub messages: Vec<SpaceMessage>,
    pub events: Vec<SpaceEvent>,
}

impl SpaceSnapshot {
    /// True if any message in the space carries exactly `content`
    pub fn has_message(&self, content: &str) -> bool {
        self.messages.iter().any(|m| m.content == content)
    }
}

/// Current wall-clock time in milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
