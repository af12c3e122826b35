//! Nested orchestration
//!
//! Builder-captain spokes compete with coders for the coder slot. When one
//! wins, it runs the implement and review steps as its own sub-orchestration
//! and the outer critic is bypassed for that ticket.

use super::coder::{standard_coder_step, CoderContext, CoderPhase};
use super::tags::{ticket_tags, TagSet};
use super::{Allocation, HubPolicy, REVIEW_OK};
use crate::registry::{
    rank_candidates, NestedOutcome, NestedRequest, NestedRunner, Router, Spoke, SpokeKind,
};
use crate::workcell::WorkcellIo;
use anyhow::{Context, Result};
use sdk::types::{OrchestrationRun, Role, SpaceKind, Ticket};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Coder phase that lets builder captains take over
pub struct NestedCoderPhase;

impl CoderPhase for NestedCoderPhase {
    fn name(&self) -> &'static str {
        "nested"
    }

    /// Builder captains and coders ranked together; ties favor the captain
    fn coder_candidates(&self, router: &dyn Router, tags: &TagSet) -> Vec<Arc<Spoke>> {
        let mut candidates = router.candidates(Role::BuilderCaptain, tags);
        candidates.extend(router.candidates(Role::Coder, tags));
        rank_candidates(candidates)
    }

    fn coder_step(&self, ctx: &CoderContext<'_>) -> Result<(String, String)> {
        let Some(coder) = ctx.coder else {
            return standard_coder_step(ctx);
        };
        let SpokeKind::Nested(runner) = coder.kind() else {
            return standard_coder_step(ctx);
        };

        let memory = Arc::clone(ctx.io.memory());
        let request = NestedRequest {
            memory: Arc::clone(&memory),
            run_id: ctx.run.run_id.clone(),
            ticket: ctx.ticket.clone(),
            plan: ctx.plan.to_string(),
            parent_workcell_space_id: ctx.workcell.workcell_sid.clone(),
            tags: ticket_tags(ctx.ticket),
            critic: ctx.critic.map(Arc::clone),
        };
        debug!(
            "Delegating coder phase of {} to nested spoke '{}'",
            ctx.ticket.ticket_id,
            coder.name()
        );

        let outcome = runner
            .run_nested(request)
            .with_context(|| format!("nested spoke '{}' failed", coder.name()))?;
        let implementation = outcome.implementation;
        let review = outcome.review.unwrap_or_else(|| REVIEW_OK.to_string());

        let st_ids = &ctx.workcell.st_ids;
        if !implementation.is_empty() {
            if let Some(sid) = st_ids.get(&Role::Coder) {
                memory.write_message(sid, Role::Coder.as_str(), &implementation, None)?;
            }
        }
        if !review.is_empty() {
            if let Some(sid) = st_ids.get(&Role::Critic) {
                memory.write_message(sid, Role::Critic.as_str(), &review, None)?;
            }
        }

        Ok((implementation, review))
    }
}

/// Builder captain that runs implement and review on the outer plan
///
/// The sub-run works in its own workcell, created as a child of the outer
/// workcell, and shares the outer run id. It does not plan again. A critic
/// lent by the outer run is used as is; any other role is leased from the
/// router for the duration of the sub-run.
pub struct SubHubCaptain {
    router: Arc<dyn Router>,
    policy: HubPolicy,
}

impl SubHubCaptain {
    pub fn new(router: Arc<dyn Router>, policy: HubPolicy) -> Self {
        Self { router, policy }
    }

    fn ranked(&self, role: Role, tags: &TagSet) -> Vec<Arc<Spoke>> {
        rank_candidates(self.router.candidates(role, tags))
    }
}

impl NestedRunner for SubHubCaptain {
    fn run_nested(&self, request: NestedRequest) -> Result<NestedOutcome> {
        let NestedRequest {
            memory,
            run_id,
            ticket: outer,
            plan,
            parent_workcell_space_id,
            tags,
            critic: lent_critic,
        } = request;

        let ticket_id = format!("{}:nested", outer.ticket_id);
        let sub_workcell = memory
            .create_space(
                SpaceKind::Workcell,
                Some(&format!("wc:{}", ticket_id)),
                Some(&parent_workcell_space_id),
            )
            .context("failed to create nested workcell")?;

        // Released on drop, after the sub-run closed or failed
        let mut leases = Allocation::default();
        let coder = leases.acquire_first(Role::Coder, self.ranked(Role::Coder, &tags));
        let critic = match lent_critic {
            Some(critic) => Some(critic),
            None => leases.acquire_first(Role::Critic, self.ranked(Role::Critic, &tags)),
        };

        let io = WorkcellIo::new(Arc::clone(&memory)).with_cascade_gc(self.policy.cascade_gc);
        let opened = io
            .open(&ticket_id, Some(&sub_workcell))
            .context("failed to open nested workcell")?;
        io.start(
            &opened.workcell_sid,
            json!({
                "run_id": run_id,
                "ticket_id": ticket_id,
                "parent_workcell_space_id": parent_workcell_space_id,
            }),
        );
        info!(
            "Nested run for {} under workcell {} (coder={:?}, critic={:?})",
            ticket_id,
            parent_workcell_space_id,
            coder.as_ref().map(|s| s.name().to_string()),
            critic.as_ref().map(|s| s.name().to_string())
        );

        let run = OrchestrationRun::new(run_id);
        let ticket = Ticket::new(ticket_id, outer.goal)
            .with_deliverables(outer.deliverables)
            .with_constraints(outer.constraints)
            .with_workcell(sub_workcell);
        let (implementation, review) = standard_coder_step(&CoderContext {
            run: &run,
            ticket: &ticket,
            plan: &plan,
            coder: coder.as_ref(),
            critic: critic.as_ref(),
            workcell: &opened,
            io: &io,
        })?;

        io.close(&opened.workcell_sid, &review, !implementation.is_empty(), true)?;
        Ok(NestedOutcome {
            implementation,
            review: Some(review),
        })
    }
}
