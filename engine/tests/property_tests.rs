//! Property-based tests for tags, selection and lease balance

mod common;

use captain_engine::config::Config;
use captain_engine::hub::{compute_tags, CaptainHub};
use captain_engine::memory::{PersistTarget, SyncMemoryAdapter};
use captain_engine::registry::{Runner, Spoke, SpokeRegistry};
use common::{Failing, Fixed};
use proptest::prelude::*;
use sdk::errors::HubError;
use sdk::types::{OrchestrationRun, Role, Ticket};
use std::sync::Arc;

fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Planner), Just(Role::Coder), Just(Role::Critic)]
}

fn target_strategy() -> impl Strategy<Value = PersistTarget> {
    prop_oneof![
        Just(PersistTarget::Inmem),
        Just(PersistTarget::Thread),
        Just(PersistTarget::Graph)
    ]
}

fn hub_over(registry: &Arc<SpokeRegistry>) -> CaptainHub {
    CaptainHub::builder()
        .router(Arc::clone(registry) as _)
        .memory(Arc::new(SyncMemoryAdapter::in_memory()))
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn tags_are_pure(
        deliverables in prop::collection::vec("[a-zA-Z ,]{0,12}", 0..5),
        constraints in prop::collection::vec("[a-zA-Z ,]{0,12}", 0..5),
    ) {
        let first = compute_tags(&deliverables, &constraints);
        let second = compute_tags(&deliverables, &constraints);
        prop_assert_eq!(&first, &second);

        for tag in &first {
            prop_assert!(!tag.is_empty());
            prop_assert_eq!(tag.clone(), tag.to_lowercase());
            prop_assert!(!tag.contains(',') && !tag.contains(' '));
        }
    }

    #[test]
    fn tags_ignore_input_order(
        mut deliverables in prop::collection::vec("[a-z]{1,6}", 0..6),
        constraints in prop::collection::vec("[a-z]{1,6}", 0..6),
    ) {
        let forward = compute_tags(&deliverables, &constraints);
        deliverables.reverse();
        let reversed = compute_tags(&deliverables, &constraints);
        prop_assert_eq!(forward, reversed);
    }

    #[test]
    fn selection_picks_max_score_deterministically(
        spokes in prop::collection::vec((role_strategy(), -20i64..20), 1..10),
    ) {
        let registry = Arc::new(SpokeRegistry::new());
        for (i, (role, score)) in spokes.iter().enumerate() {
            registry.register(Spoke::standard(
                format!("s{}", i),
                *role,
                *score,
                Arc::new(Fixed::new("x")),
            ));
        }
        let hub = hub_over(&registry);
        let tags = hub.compute_tags(&Ticket::new("t", "g"));

        for role in Role::PIPELINE {
            let chosen = match role {
                Role::Planner => hub.choose_planner(&tags),
                Role::Coder => hub.choose_coder(&tags),
                _ => hub.choose_critic(&tags),
            };
            let best = spokes
                .iter()
                .enumerate()
                .filter(|(_, (r, _))| *r == role)
                .max_by(|(ia, (_, a)), (ib, (_, b))| a.cmp(b).then(ib.cmp(ia)));

            match (chosen, best) {
                (Some(spoke), Some((index, (_, score)))) => {
                    prop_assert_eq!(spoke.score(), *score);
                    prop_assert_eq!(spoke.name(), format!("s{}", index));
                }
                (None, None) => {}
                (chosen, best) => prop_assert!(
                    false,
                    "mismatch for {}: {:?} vs {:?}",
                    role,
                    chosen.map(|s| s.name().to_string()),
                    best
                ),
            }
        }
    }

    #[test]
    fn leases_balance_whether_or_not_runs_fail(
        spokes in prop::collection::vec((role_strategy(), 0i64..5, any::<bool>()), 0..8),
    ) {
        let registry = Arc::new(SpokeRegistry::new());
        let registered: Vec<Arc<Spoke>> = spokes
            .iter()
            .enumerate()
            .map(|(i, (role, score, fails))| {
                let runner: Arc<dyn Runner> = if *fails {
                    Arc::new(Failing(|| HubError::impl_failure("spoke", "boom")))
                } else {
                    Arc::new(Fixed::new("ok"))
                };
                registry.register(Spoke::standard(format!("s{}", i), *role, *score, runner))
            })
            .collect();
        let hub = hub_over(&registry);

        let outcome = hub.run_ticket(&OrchestrationRun::new("r"), &Ticket::new("t", "g"));
        if let Err(err) = &outcome {
            let is_impl_failure = matches!(
                err.downcast_ref::<HubError>(),
                Some(HubError::ImplFailure { .. })
            );
            prop_assert!(is_impl_failure);
        }

        for spoke in &registered {
            let stats = spoke.lease_stats();
            prop_assert_eq!(stats.acquired, stats.released);
            prop_assert_eq!(stats.active, 0);
        }
    }

    #[test]
    fn config_survives_toml_round_trip(
        nested in any::<bool>(),
        cascade in any::<Option<bool>>(),
        workcell in target_strategy(),
        orch in target_strategy(),
        temperature in 0.0f64..2.0,
        user in "[a-z]{1,10}",
    ) {
        let mut config = Config::default();
        config.orchestrator.nested = nested;
        config.orchestrator.cascade_gc = cascade;
        config.orchestrator.user_id = user.clone();
        config.persist.workcell = workcell;
        config.persist.orch = orch;
        config.llm.temperature = temperature;

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();

        prop_assert_eq!(parsed.orchestrator.nested, nested);
        prop_assert_eq!(parsed.orchestrator.cascade_gc, cascade);
        prop_assert_eq!(parsed.orchestrator.user_id, user);
        prop_assert_eq!(parsed.persist.workcell, workcell);
        prop_assert_eq!(parsed.persist.orch, orch);
        prop_assert!((parsed.llm.temperature - temperature).abs() < 1e-9);
    }
}
