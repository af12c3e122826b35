//! Spoke Registry
//!
//! Spokes are pluggable workers bound to one role. The registry answers
//! "which spokes can play this role" and the hub ranks the answer by score.
//! A spoke is either a standard worker that runs a prompt, or a nested
//! captain that runs a whole sub-orchestration for the coder phase.

use crate::hub::tags::TagSet;
use sdk::errors::{HubError, Result};
use sdk::memory::Memory;
use sdk::types::{Role, Ticket};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Synchronously executes a prompt and returns text
pub trait Runner: Send + Sync {
    fn run(&self, prompt: &str) -> Result<String>;
}

/// Input handed to a nested captain when it takes over the coder phase
#[derive(Clone)]
pub struct NestedRequest {
    pub memory: Arc<dyn Memory>,
    pub run_id: String,
    pub ticket: Ticket,
    pub plan: String,
    /// Workcell of the outer run, so the nested run keeps the same lineage
    pub parent_workcell_space_id: String,
    pub tags: TagSet,
    /// Critic leased by the outer run and not used there. The nested run
    /// reviews with it instead of acquiring a critic of its own.
    pub critic: Option<Arc<Spoke>>,
}

/// Implementation and review produced by a nested run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NestedOutcome {
    pub implementation: String,
    /// `None` defaults to "OK" at the hub
    pub review: Option<String>,
}

/// Runs the implement and review steps as a sub-orchestration
pub trait NestedRunner: Send + Sync {
    fn run_nested(&self, request: NestedRequest) -> anyhow::Result<NestedOutcome>;
}

/// What a spoke can do
#[derive(Clone)]
pub enum SpokeKind {
    Standard(Arc<dyn Runner>),
    Nested(Arc<dyn NestedRunner>),
}

impl fmt::Debug for SpokeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpokeKind::Standard(_) => f.write_str("Standard"),
            SpokeKind::Nested(_) => f.write_str("Nested"),
        }
    }
}

/// Lease counters of a spoke
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeaseStats {
    pub acquired: u64,
    pub released: u64,
    pub active: usize,
}

/// A worker registered for one role
pub struct Spoke {
    name: String,
    role: Role,
    score: i64,
    exclusive: bool,
    kind: SpokeKind,
    leases: AtomicUsize,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl fmt::Debug for Spoke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spoke")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("score", &self.score)
            .field("exclusive", &self.exclusive)
            .field("kind", &self.kind)
            .field("leases", &self.leases.load(Ordering::SeqCst))
            .finish()
    }
}

impl Spoke {
    pub fn new(name: impl Into<String>, role: Role, score: i64, kind: SpokeKind) -> Self {
        Self {
            name: name.into(),
            role,
            score,
            exclusive: false,
            kind,
            leases: AtomicUsize::new(0),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
        }
    }

    /// Standard spoke around a prompt runner
    pub fn standard(
        name: impl Into<String>,
        role: Role,
        score: i64,
        runner: Arc<dyn Runner>,
    ) -> Self {
        Self::new(name, role, score, SpokeKind::Standard(runner))
    }

    /// Nested captain, registered under the builder_captain role
    pub fn nested(name: impl Into<String>, score: i64, runner: Arc<dyn NestedRunner>) -> Self {
        Self::new(name, Role::BuilderCaptain, score, SpokeKind::Nested(runner))
    }

    /// Make the spoke single-tenant
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    pub fn kind(&self) -> &SpokeKind {
        &self.kind
    }

    /// Whether another run may acquire this spoke right now
    pub fn is_available(&self) -> bool {
        !self.exclusive || self.leases.load(Ordering::SeqCst) == 0
    }

    /// Take a lease. Returns false if an exclusive spoke is already held.
    pub fn acquire(&self) -> bool {
        let ok = if self.exclusive {
            self.leases
                .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        } else {
            self.leases.fetch_add(1, Ordering::SeqCst);
            true
        };
        if ok {
            self.acquired.fetch_add(1, Ordering::SeqCst);
            debug!("Acquired {} spoke '{}'", self.role, self.name);
        }
        ok
    }

    /// Give a lease back. Releasing without a lease is a no-op.
    pub fn release(&self) {
        let released = self
            .leases
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if released {
            self.released.fetch_add(1, Ordering::SeqCst);
            debug!("Released {} spoke '{}'", self.role, self.name);
        }
    }

    pub fn lease_stats(&self) -> LeaseStats {
        LeaseStats {
            acquired: self.acquired.load(Ordering::SeqCst),
            released: self.released.load(Ordering::SeqCst),
            active: self.leases.load(Ordering::SeqCst),
        }
    }

    /// Run a prompt on a standard spoke
    pub fn run(&self, prompt: &str) -> Result<String> {
        match &self.kind {
            SpokeKind::Standard(runner) => runner.run(prompt),
            SpokeKind::Nested(_) => Err(HubError::impl_failure(
                self.role.as_str(),
                format!("nested spoke '{}' cannot run a single prompt", self.name),
            )),
        }
    }
}

/// Resolves a role and tag set to candidate spokes
///
/// For a fixed registry state, repeated calls with the same arguments must
/// return the same list in the same order.
pub trait Router: Send + Sync {
    fn candidates(&self, role: Role, tags: &TagSet) -> Vec<Arc<Spoke>>;
}

/// Order candidates by score, highest first. Ties keep their given order.
pub fn rank_candidates(mut candidates: Vec<Arc<Spoke>>) -> Vec<Arc<Spoke>> {
    candidates.sort_by(|a, b| b.score().cmp(&a.score()));
    candidates
}

/// Registry-backed router
///
/// Tags are accepted but not used for filtering; every available spoke of
/// the role is a candidate, in registration order.
#[derive(Default)]
pub struct SpokeRegistry {
    spokes: RwLock<BTreeMap<Role, Vec<Arc<Spoke>>>>,
}

impl SpokeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a spoke under its role and return the shared handle
    pub fn register(&self, spoke: Spoke) -> Arc<Spoke> {
        let spoke = Arc::new(spoke);
        debug!(
            "Registered {} spoke '{}' (score={}, exclusive={})",
            spoke.role(),
            spoke.name(),
            spoke.score(),
            spoke.is_exclusive()
        );
        self.spokes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(spoke.role())
            .or_default()
            .push(Arc::clone(&spoke));
        spoke
    }

    /// True when planner, coder or critic has at least one spoke
    pub fn has_any_spokes(&self) -> bool {
        let spokes = self.spokes.read().unwrap_or_else(|e| e.into_inner());
        Role::PIPELINE
            .iter()
            .any(|role| spokes.get(role).is_some_and(|list| !list.is_empty()))
    }

    /// Registered spokes per role
    pub fn counts(&self) -> BTreeMap<Role, usize> {
        self.spokes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(role, list)| (*role, list.len()))
            .collect()
    }

    /// Every registered spoke, grouped by role
    pub fn all(&self) -> Vec<Arc<Spoke>> {
        self.spokes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .flatten()
            .cloned()
            .collect()
    }
}

impl Router for SpokeRegistry {
    fn candidates(&self, role: Role, _tags: &TagSet) -> Vec<Arc<Spoke>> {
        self.spokes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&role)
            .map(|list| {
                list.iter()
                    .filter(|spoke| spoke.is_available())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Runner for Echo {
        fn run(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_string())
        }
    }

    fn spoke(name: &str, role: Role, score: i64) -> Spoke {
        Spoke::standard(name, role, score, Arc::new(Echo))
    }

    #[test]
    fn test_acquire_release_counts() {
        let s = spoke("a", Role::Coder, 1);
        assert!(s.acquire());
        assert!(s.acquire());
        s.release();
        s.release();
        s.release();

        let stats = s.lease_stats();
        assert_eq!(stats.acquired, 2);
        assert_eq!(stats.released, 2);
        assert_eq!(stats.active, 0);
    }

    #[test]
    fn test_exclusive_spoke_single_tenant() {
        let s = spoke("a", Role::Coder, 1).exclusive(true);
        assert!(s.acquire());
        assert!(!s.is_available());
        assert!(!s.acquire());
        s.release();
        assert!(s.is_available());
        assert!(s.acquire());
    }

    #[test]
    fn test_registry_hides_held_exclusive_spokes() {
        let registry = SpokeRegistry::new();
        let held = registry.register(spoke("held", Role::Critic, 9).exclusive(true));
        registry.register(spoke("free", Role::Critic, 1));

        assert_eq!(registry.candidates(Role::Critic, &TagSet::new()).len(), 2);
        held.acquire();
        let names: Vec<String> = registry
            .candidates(Role::Critic, &TagSet::new())
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["free"]);
    }

    #[test]
    fn test_rank_is_stable_on_ties() {
        let ranked = rank_candidates(vec![
            Arc::new(spoke("first", Role::Coder, 5)),
            Arc::new(spoke("best", Role::Coder, 9)),
            Arc::new(spoke("second", Role::Coder, 5)),
        ]);
        let names: Vec<&str> = ranked.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["best", "first", "second"]);
    }

    #[test]
    fn test_has_any_spokes_ignores_builder_captain() {
        struct Never;
        impl NestedRunner for Never {
            fn run_nested(&self, _request: NestedRequest) -> anyhow::Result<NestedOutcome> {
                Ok(NestedOutcome::default())
            }
        }

        let registry = SpokeRegistry::new();
        assert!(!registry.has_any_spokes());
        registry.register(Spoke::nested("bc", 3, Arc::new(Never)));
        assert!(!registry.has_any_spokes());
        registry.register(spoke("p", Role::Planner, 1));
        assert!(registry.has_any_spokes());
        assert_eq!(registry.counts()[&Role::BuilderCaptain], 1);
    }

    #[test]
    fn test_nested_spoke_cannot_run_prompt() {
        struct Never;
        impl NestedRunner for Never {
            fn run_nested(&self, _request: NestedRequest) -> anyhow::Result<NestedOutcome> {
                Ok(NestedOutcome::default())
            }
        }

        let s = Spoke::nested("bc", 3, Arc::new(Never));
        assert!(matches!(s.run("x"), Err(HubError::ImplFailure { .. })));
    }
}
