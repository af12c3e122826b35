//! Coder phase
//!
//! The pipeline shape is fixed in [`CaptainHub::run_ticket`](super::CaptainHub::run_ticket).
//! Only coder selection and the implement/review step vary, so they sit behind
//! [`CoderPhase`]. The standard phase runs the coder and critic spokes directly.

use super::prompts::{render_implement, render_review};
use super::tags::TagSet;
use super::{invoke_spoke, no_coder_impl, REVIEW_OK};
use crate::registry::{rank_candidates, Router, Spoke};
use crate::workcell::{OpenedWorkcell, WorkcellIo};
use anyhow::Result;
use sdk::types::{OrchestrationRun, Role, Ticket};
use std::sync::Arc;

/// Everything the coder phase sees of the current run
pub struct CoderContext<'a> {
    pub run: &'a OrchestrationRun,
    pub ticket: &'a Ticket,
    pub plan: &'a str,
    pub coder: Option<&'a Arc<Spoke>>,
    pub critic: Option<&'a Arc<Spoke>>,
    pub workcell: &'a OpenedWorkcell,
    pub io: &'a WorkcellIo,
}

/// Coder selection and the implement/review step
pub trait CoderPhase: Send + Sync {
    fn name(&self) -> &'static str;

    /// Coder candidates, best first
    fn coder_candidates(&self, router: &dyn Router, tags: &TagSet) -> Vec<Arc<Spoke>>;

    /// Produce `(implementation, review)` and record the steps
    fn coder_step(&self, ctx: &CoderContext<'_>) -> Result<(String, String)>;
}

/// Coder spokes only, critic reviews
pub struct StandardCoderPhase;

impl CoderPhase for StandardCoderPhase {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn coder_candidates(&self, router: &dyn Router, tags: &TagSet) -> Vec<Arc<Spoke>> {
        rank_candidates(router.candidates(Role::Coder, tags))
    }

    fn coder_step(&self, ctx: &CoderContext<'_>) -> Result<(String, String)> {
        standard_coder_step(ctx)
    }
}

/// Implement with the coder (or the placeholder), then review with the critic
pub(crate) fn standard_coder_step(ctx: &CoderContext<'_>) -> Result<(String, String)> {
    let wc = &ctx.workcell.workcell_sid;
    let st_ids = &ctx.workcell.st_ids;
    let ticket = ctx.ticket;

    let (implementation, impl_prompt) = match ctx.coder {
        Some(coder) => {
            let prompt = render_implement(ctx.plan, &ticket.deliverables, &ticket.constraints);
            (invoke_spoke(coder, &prompt)?, Some(prompt))
        }
        None => (no_coder_impl(ctx.plan), None),
    };
    ctx.io
        .step_out(wc, st_ids, Role::Coder, &implementation, impl_prompt.as_deref())?;

    let review = match ctx.critic {
        Some(critic) => {
            let prompt = render_review(&ticket.deliverables, &ticket.constraints);
            let review = invoke_spoke(critic, &prompt)?;
            ctx.io
                .step_out(wc, st_ids, Role::Critic, &review, Some(&prompt))?;
            review
        }
        None => REVIEW_OK.to_string(),
    };

    Ok((implementation, review))
}
