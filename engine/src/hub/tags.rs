//! Ticket tags
//!
//! Tags are derived from a ticket's deliverables and constraints and handed
//! to the router for every role lookup. The computation is pure, so the
//! nested coder phase can recompute it safely.

use sdk::types::Ticket;
use std::collections::BTreeSet;

/// Ordered, deduplicated tag set
pub type TagSet = BTreeSet<String>;

/// Tokenize deliverables and constraints on commas and whitespace, lowercased
pub fn compute_tags<S: AsRef<str>>(deliverables: &[S], constraints: &[S]) -> TagSet {
    deliverables
        .iter()
        .chain(constraints)
        .flat_map(|item| {
            item.as_ref()
                .split(|c: char| c == ',' || c.is_whitespace())
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Tags for a ticket
pub fn ticket_tags(ticket: &Ticket) -> TagSet {
    compute_tags(&ticket.deliverables, &ticket.constraints)
}
