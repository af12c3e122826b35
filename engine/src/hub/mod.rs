//! Orchestration Hub
//!
//! Runs a ticket through planner, coder and critic spokes, writing every step
//! into a workcell. Roles without a spoke get placeholder output instead of
//! failing. Spokes acquired for a run are always released when the run ends,
//! including when a spoke fails.
//!
//! # Pipeline
//!
//! 1. Allocate the best available spoke per role and acquire it
//! 2. Open the workcell and record a "start" event
//! 3. Plan, then hand off to the [`CoderPhase`] for implement and review
//! 4. Close the workcell (status "done", "done" event, GC)
//! 5. Release every acquired spoke
//!
//! With no spokes at all the hub takes a degenerate path: placeholder plan,
//! implementation from the chat reply hook when one is installed, review "OK".
//!
//! The hub is synchronous and never suspends. Async callers run it on a
//! blocking thread.

pub mod chat;
pub mod coder;
pub mod nested;
pub mod prompts;
pub mod tags;

pub use chat::{ChatReply, ChatReplyHook, Conversation, HubChatFacade};
pub use coder::{CoderContext, CoderPhase, StandardCoderPhase};
pub use nested::{NestedCoderPhase, SubHubCaptain};
pub use tags::{compute_tags, TagSet};

use crate::memory::PersistTarget;
use crate::registry::{rank_candidates, Router, Spoke};
use crate::workcell::{OpenedWorkcell, WorkcellIo};
use anyhow::{Context, Result};
use self::prompts::render_planner;
use sdk::errors::HubError;
use sdk::memory::Memory;
use sdk::types::{OrchestrationRun, Role, Ticket, TicketResult};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Review used when no critic ran
pub const REVIEW_OK: &str = "OK";

/// Plan recorded on the degenerate path
pub fn fallback_plan(goal: &str) -> String {
    format!("(Fallback) Plan aus Ziel:\n{}", goal)
}

/// Plan recorded when no planner is allocated
pub fn no_planner_plan(goal: &str) -> String {
    format!("(No planner) Plan aus Ziel:\n{}", goal)
}

/// Implementation recorded when no coder is allocated
pub fn no_coder_impl(plan: &str) -> String {
    format!("(No coder) Nutze Plan:\n{}", plan)
}

/// Run a standard spoke. Any failure surfaces as `ImplFailure`.
pub(crate) fn invoke_spoke(spoke: &Spoke, prompt: &str) -> Result<String> {
    spoke
        .run(prompt)
        .map_err(|e| match e {
            HubError::ImplFailure { .. } => e,
            other => HubError::impl_failure(spoke.role().as_str(), other.to_string()),
        })
        .with_context(|| format!("{} spoke '{}' failed", spoke.role(), spoke.name()))
}

/// Hub construction policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubPolicy {
    /// Persistence target for workcell spaces, recorded on every run's start
    /// event. Matches the memory adapter's workcell routing by default.
    pub persist_workcell: PersistTarget,
    /// Collect per-role child spaces together with the workcell
    pub cascade_gc: bool,
}

impl Default for HubPolicy {
    fn default() -> Self {
        Self {
            persist_workcell: PersistTarget::Inmem,
            cascade_gc: false,
        }
    }
}

/// Spokes acquired for one run, released on drop
#[derive(Debug, Default)]
pub struct Allocation {
    spokes: BTreeMap<Role, Arc<Spoke>>,
}

impl Allocation {
    pub fn get(&self, role: Role) -> Option<&Arc<Spoke>> {
        self.spokes.get(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.spokes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.spokes.len()
    }

    pub fn roles(&self) -> Vec<Role> {
        self.spokes.keys().copied().collect()
    }

    /// Lease the first acquirable spoke of `candidates` for `role`
    pub(crate) fn acquire_first(
        &mut self,
        role: Role,
        candidates: Vec<Arc<Spoke>>,
    ) -> Option<Arc<Spoke>> {
        let spoke = candidates.into_iter().find(|spoke| spoke.acquire())?;
        debug!("{} slot -> '{}' (score={})", role, spoke.name(), spoke.score());
        self.spokes.insert(role, Arc::clone(&spoke));
        Some(spoke)
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        for spoke in self.spokes.values() {
            spoke.release();
        }
    }
}

/// Builder for [`CaptainHub`]
#[derive(Default)]
pub struct HubBuilder {
    router: Option<Arc<dyn Router>>,
    memory: Option<Arc<dyn Memory>>,
    policy: HubPolicy,
    nested: bool,
    chat_hook: Option<ChatReplyHook>,
}

impl HubBuilder {
    pub fn router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn policy(mut self, policy: HubPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Let builder-captain spokes take over the coder phase
    pub fn nested(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }

    /// Synchronous reply hook used on the degenerate path
    pub fn chat_hook(mut self, hook: ChatReplyHook) -> Self {
        self.chat_hook = Some(hook);
        self
    }

    /// Build the hub
    ///
    /// # Errors
    ///
    /// `AdapterMisconfiguration` when no memory adapter or router was given.
    pub fn build(self) -> std::result::Result<CaptainHub, HubError> {
        let memory = self.memory.ok_or_else(|| {
            HubError::AdapterMisconfiguration("hub requires a memory adapter".to_string())
        })?;
        let router = self.router.ok_or_else(|| {
            HubError::AdapterMisconfiguration("hub requires a router".to_string())
        })?;

        let coder_phase: Box<dyn CoderPhase> = if self.nested {
            Box::new(NestedCoderPhase)
        } else {
            Box::new(StandardCoderPhase)
        };

        Ok(CaptainHub {
            io: WorkcellIo::new(Arc::clone(&memory)).with_cascade_gc(self.policy.cascade_gc),
            router,
            memory,
            policy: self.policy,
            coder_phase,
            chat_hook: self.chat_hook,
        })
    }
}

/// The orchestration hub
pub struct CaptainHub {
    router: Arc<dyn Router>,
    memory: Arc<dyn Memory>,
    policy: HubPolicy,
    io: WorkcellIo,
    coder_phase: Box<dyn CoderPhase>,
    chat_hook: Option<ChatReplyHook>,
}

impl CaptainHub {
    pub fn builder() -> HubBuilder {
        HubBuilder::default()
    }

    pub fn policy(&self) -> HubPolicy {
        self.policy
    }

    pub fn memory(&self) -> &Arc<dyn Memory> {
        &self.memory
    }

    pub fn router(&self) -> &Arc<dyn Router> {
        &self.router
    }

    pub fn is_nested(&self) -> bool {
        self.coder_phase.name() == "nested"
    }

    pub fn has_chat_hook(&self) -> bool {
        self.chat_hook.is_some()
    }

    pub fn compute_tags(&self, ticket: &Ticket) -> TagSet {
        tags::ticket_tags(ticket)
    }

    pub fn choose_planner(&self, tags: &TagSet) -> Option<Arc<Spoke>> {
        self.ranked(Role::Planner, tags).into_iter().next()
    }

    pub fn choose_coder(&self, tags: &TagSet) -> Option<Arc<Spoke>> {
        self.coder_phase
            .coder_candidates(self.router.as_ref(), tags)
            .into_iter()
            .next()
    }

    pub fn choose_critic(&self, tags: &TagSet) -> Option<Arc<Spoke>> {
        self.ranked(Role::Critic, tags).into_iter().next()
    }

    fn ranked(&self, role: Role, tags: &TagSet) -> Vec<Arc<Spoke>> {
        rank_candidates(self.router.candidates(role, tags))
    }

    /// Select and acquire the best spoke per role
    ///
    /// A role without an acquirable spoke is left out. Dropping the returned
    /// allocation releases everything it holds.
    pub fn allocate_workcell(&self, ticket: &Ticket) -> Allocation {
        let tags = self.compute_tags(ticket);
        let ranked = [
            (Role::Planner, self.ranked(Role::Planner, &tags)),
            (
                Role::Coder,
                self.coder_phase.coder_candidates(self.router.as_ref(), &tags),
            ),
            (Role::Critic, self.ranked(Role::Critic, &tags)),
        ];

        let mut allocation = Allocation::default();
        for (role, candidates) in ranked {
            allocation.acquire_first(role, candidates);
        }
        allocation
    }

    /// Ask the chat reply hook, unless we are already inside the chat facade
    pub fn try_chat_reply(&self, text: &str) -> Option<String> {
        if chat::in_chat_facade() {
            return None;
        }
        let hook = self.chat_hook.as_ref()?;
        hook(text).filter(|reply| !reply.is_empty())
    }

    /// Run the full pipeline for one ticket
    ///
    /// # Errors
    ///
    /// A failing spoke aborts the run with an error whose root cause is
    /// `HubError::ImplFailure`. The workcell is then left "running". Acquired
    /// spokes are released either way.
    pub fn run_ticket(&self, run: &OrchestrationRun, ticket: &Ticket) -> Result<TicketResult> {
        let allocation = self.allocate_workcell(ticket);
        info!(
            "Run {} ticket {}: {} spoke(s) allocated ({:?})",
            run.run_id,
            ticket.ticket_id,
            allocation.len(),
            allocation.roles()
        );

        let opened = self
            .io
            .open(&ticket.ticket_id, ticket.workcell_space_id.as_deref())
            .with_context(|| format!("failed to open workcell for ticket {}", ticket.ticket_id))?;
        self.io.start(
            &opened.workcell_sid,
            json!({
                "run_id": run.run_id,
                "ticket_id": ticket.ticket_id,
                "persist": self.policy.persist_workcell.as_str(),
            }),
        );

        let result = if allocation.is_empty() {
            self.run_degenerate(ticket, &opened)?
        } else {
            self.run_pipeline(run, ticket, &allocation, &opened)?
        };

        info!(
            "Run {} ticket {} finished (impl_ok={})",
            run.run_id,
            ticket.ticket_id,
            !result.implementation.is_empty()
        );
        Ok(result)
    }

    fn run_degenerate(&self, ticket: &Ticket, opened: &OpenedWorkcell) -> Result<TicketResult> {
        let wc = &opened.workcell_sid;
        let plan = fallback_plan(&ticket.goal);
        self.io
            .step_out(wc, &opened.st_ids, Role::Planner, &plan, None)?;

        let implementation = self
            .try_chat_reply(&ticket.goal)
            .unwrap_or_else(|| no_coder_impl(&plan));
        self.io
            .step_out(wc, &opened.st_ids, Role::Coder, &implementation, None)?;

        self.io.close(wc, REVIEW_OK, true, true)?;
        Ok(TicketResult {
            plan,
            implementation,
            review: REVIEW_OK.to_string(),
            workcell_space_id: wc.clone(),
        })
    }

    fn run_pipeline(
        &self,
        run: &OrchestrationRun,
        ticket: &Ticket,
        allocation: &Allocation,
        opened: &OpenedWorkcell,
    ) -> Result<TicketResult> {
        let wc = &opened.workcell_sid;

        let plan_prompt = render_planner(&ticket.goal, &ticket.deliverables, &ticket.constraints);
        let plan = match allocation.get(Role::Planner) {
            Some(planner) => invoke_spoke(planner, &plan_prompt)?,
            None => no_planner_plan(&ticket.goal),
        };
        self.io
            .step_out(wc, &opened.st_ids, Role::Planner, &plan, Some(&plan_prompt))?;

        let (implementation, review) = self.coder_phase.coder_step(&CoderContext {
            run,
            ticket,
            plan: &plan,
            coder: allocation.get(Role::Coder),
            critic: allocation.get(Role::Critic),
            workcell: opened,
            io: &self.io,
        })?;

        self.io
            .close(wc, &review, !implementation.is_empty(), true)?;
        Ok(TicketResult {
            plan,
            implementation,
            review,
            workcell_space_id: wc.clone(),
        })
    }
}
