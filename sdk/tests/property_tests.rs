use proptest::prelude::*;
use sdk::errors::{HubError, HubErrorExt};
use sdk::types::Ticket;

// Every error variant carries a non-empty, static user hint
proptest! {
    #[test]
    fn test_error_user_hint_completeness(error_str in "\\PC*") {
        let errs = vec![
            HubError::UnknownSpace(error_str.clone()),
            HubError::impl_failure("coder", error_str.clone()),
            HubError::AdapterMisconfiguration(error_str.clone()),
            HubError::Config(error_str.clone()),
            HubError::LLMProvider(error_str.clone()),
            HubError::Network(error_str.clone()),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(!hint.contains("OPENAI_API_KEY"));
        }
    }
}

// Tickets survive a JSON round trip unchanged
proptest! {
    #[test]
    fn test_ticket_json_round_trip(
        goal in "\\PC{0,40}",
        deliverables in proptest::collection::vec("[a-z ,]{0,12}", 0..4),
        constraints in proptest::collection::vec("[a-z ,]{0,12}", 0..4),
    ) {
        let ticket = Ticket::new("t-1", goal)
            .with_deliverables(deliverables)
            .with_constraints(constraints);

        let json = serde_json::to_string(&ticket).expect("serialize ticket");
        let parsed: Ticket = serde_json::from_str(&json).expect("parse ticket");
        prop_assert_eq!(ticket, parsed);
    }
}
