//! Property-based tests for the intake state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::validator::{DEFAULT_BATCHES, DEFAULT_TEST_TYPES};
use super::*;
use crate::uploader::{Ack, UploadError};
use proptest::prelude::*;

const OPERATOR: OperatorId = OperatorId(42);

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_case_variant(word: &'static str) -> impl Strategy<Value = String> {
    proptest::collection::vec(any::<bool>(), word.len()).prop_map(move |upper| {
        word.chars()
            .zip(upper)
            .map(|(c, up)| {
                if up {
                    c.to_ascii_uppercase()
                } else {
                    c.to_ascii_lowercase()
                }
            })
            .collect()
    })
}

fn arb_padding() -> impl Strategy<Value = String> {
    "[ \t]{0,3}"
}

fn arb_valid_batch() -> impl Strategy<Value = String> {
    (
        proptest::sample::select(DEFAULT_BATCHES),
        arb_padding(),
        arb_padding(),
    )
        .prop_flat_map(|(batch, lead, trail)| {
            arb_case_variant(batch).prop_map(move |b| format!("{lead}{b}{trail}"))
        })
}

fn arb_valid_test_type() -> impl Strategy<Value = String> {
    (proptest::sample::select(DEFAULT_TEST_TYPES), arb_padding())
        .prop_flat_map(|(test_type, pad)| {
            arb_case_variant(test_type).prop_map(move |t| format!("{pad}{t}{pad}"))
        })
}

fn arb_document() -> impl Strategy<Value = DocumentRef> {
    (
        proptest::option::of("[a-zA-Z0-9 _.-]{0,12}"),
        "[a-z0-9]{6}",
    )
        .prop_map(|(file_name, file_id)| DocumentRef {
            file_name,
            file_id,
            size: None,
        })
}

fn arb_upload_result() -> impl Strategy<Value = Result<Ack, UploadError>> {
    prop_oneof![
        Just(Ok(Ack::Success)),
        "[a-z ]{1,20}".prop_map(|m| Err(UploadError::Network(m))),
        (400u16..600, "[a-z ]{1,20}")
            .prop_map(|(status, message)| Err(UploadError::Rejected { status, message })),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::Start),
        Just(Event::Cancel),
        arb_valid_batch().prop_map(Event::text),
        arb_valid_test_type().prop_map(Event::text),
        ".{0,16}".prop_map(Event::text),
        arb_document().prop_map(Event::document),
        arb_upload_result().prop_map(|result| Event::UploadFinished { result }),
    ]
}

fn fields() -> IntakeFields {
    IntakeFields {
        batch: "rm".to_string(),
        test_type: "FTS".to_string(),
        test_name: "Test 1".to_string(),
    }
}

fn arb_awaiting_state() -> impl Strategy<Value = IntakeState> {
    prop_oneof![
        Just(IntakeState::AwaitingBatch),
        Just(IntakeState::AwaitingTestType {
            batch: "tym".to_string()
        }),
        Just(IntakeState::AwaitingTestName {
            batch: "tym".to_string(),
            test_type: "PT".to_string(),
        }),
        Just(IntakeState::AwaitingFile { fields: fields() }),
    ]
}

/// Order in which fields get populated
fn rank(state: &IntakeState) -> u8 {
    match state {
        IntakeState::Idle | IntakeState::Cancelled => 0,
        IntakeState::AwaitingBatch => 1,
        IntakeState::AwaitingTestType { .. } => 2,
        IntakeState::AwaitingTestName { .. } => 3,
        IntakeState::AwaitingFile { .. } => 4,
        IntakeState::Completed { .. } => 5,
    }
}

fn is_pdf(document: &DocumentRef) -> bool {
    document
        .file_name
        .as_deref()
        .is_some_and(|n| n.to_lowercase().ends_with(".pdf"))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_accepted_batch_is_lowercase_member(input in arb_valid_batch()) {
        let rules = IntakeRules::default();
        let ctx = IntakeContext::new(OPERATOR, OPERATOR, &rules);
        let result = transition(&IntakeState::AwaitingBatch, &ctx, Event::text(input)).unwrap();

        let batch = result.new_state.batch().map(str::to_string);
        prop_assert!(batch.is_some());
        let batch = batch.unwrap();
        prop_assert_eq!(&batch, &batch.to_lowercase());
        prop_assert!(rules.batches().contains(&batch));
    }

    #[test]
    fn prop_unknown_batch_keeps_state(input in "[a-z]{1,8}") {
        let rules = IntakeRules::default();
        prop_assume!(!rules.batches().contains(&input));
        let ctx = IntakeContext::new(OPERATOR, OPERATOR, &rules);
        let result = transition(&IntakeState::AwaitingBatch, &ctx, Event::text(input)).unwrap();

        prop_assert_eq!(result.new_state, IntakeState::AwaitingBatch);
        prop_assert!(!result.effects.contains(&Effect::PersistState));
    }

    #[test]
    fn prop_accepted_test_type_is_uppercase_member(input in arb_valid_test_type()) {
        let rules = IntakeRules::default();
        let ctx = IntakeContext::new(OPERATOR, OPERATOR, &rules);
        let state = IntakeState::AwaitingTestType { batch: "rm".to_string() };
        let result = transition(&state, &ctx, Event::text(input)).unwrap();

        let test_type = result.new_state.test_type().map(str::to_string);
        prop_assert!(test_type.is_some());
        let test_type = test_type.unwrap();
        prop_assert_eq!(&test_type, &test_type.to_uppercase());
        prop_assert!(rules.test_types().contains(&test_type));
    }

    #[test]
    fn prop_unknown_test_type_keeps_state(input in "[A-Z]{1,8}") {
        let rules = IntakeRules::default();
        prop_assume!(!rules.test_types().contains(&input));
        let ctx = IntakeContext::new(OPERATOR, OPERATOR, &rules);
        let state = IntakeState::AwaitingTestType { batch: "rm".to_string() };
        let result = transition(&state, &ctx, Event::text(input)).unwrap();

        prop_assert_eq!(result.new_state, state);
    }

    #[test]
    fn prop_test_name_requires_content(
        input in "[ \t\n]{0,5}",
        name in "[a-zA-Z0-9][a-zA-Z0-9 ]{0,20}",
    ) {
        let rules = IntakeRules::default();
        let ctx = IntakeContext::new(OPERATOR, OPERATOR, &rules);
        let state = IntakeState::AwaitingTestName {
            batch: "rm".to_string(),
            test_type: "FTS".to_string(),
        };

        let blank = transition(&state, &ctx, Event::text(input)).unwrap();
        prop_assert_eq!(&blank.new_state, &state);

        let accepted = transition(&state, &ctx, Event::text(name.clone())).unwrap();
        prop_assert_eq!(accepted.new_state.test_name(), Some(name.trim()));

        // Accepted exactly once: the next text is a file-step failure
        let again = transition(&accepted.new_state, &ctx, Event::text(name)).unwrap();
        prop_assert_eq!(again.new_state, accepted.new_state);
    }

    #[test]
    fn prop_non_pdf_never_leaves_file_step(document in arb_document()) {
        prop_assume!(!is_pdf(&document));
        let rules = IntakeRules::default();
        let ctx = IntakeContext::new(OPERATOR, OPERATOR, &rules);
        let state = IntakeState::AwaitingFile { fields: fields() };
        let result = transition(&state, &ctx, Event::document(document)).unwrap();

        prop_assert_eq!(result.new_state, state);
        let uploads = result.effects.iter().any(|e| matches!(e, Effect::Upload { .. }));
        prop_assert!(!uploads);
    }

    #[test]
    fn prop_cancel_from_any_awaiting_state(state in arb_awaiting_state()) {
        let rules = IntakeRules::default();
        let ctx = IntakeContext::new(OPERATOR, OPERATOR, &rules);
        let result = transition(&state, &ctx, Event::Cancel).unwrap();

        prop_assert_eq!(result.new_state, IntakeState::Cancelled);
        prop_assert!(result.effects.contains(&Effect::DiscardSession));
    }

    #[test]
    fn prop_start_resets_any_state(state in arb_awaiting_state()) {
        let rules = IntakeRules::default();
        let ctx = IntakeContext::new(OPERATOR, OPERATOR, &rules);
        let result = transition(&state, &ctx, Event::Start).unwrap();

        prop_assert_eq!(&result.new_state, &IntakeState::AwaitingBatch);
        prop_assert_eq!(&result.effects[0], &Effect::OpenSession);
    }

    #[test]
    fn prop_unauthorized_never_opens_session(
        operator in any::<i64>(),
        events in proptest::collection::vec(arb_event(), 0..20),
    ) {
        prop_assume!(operator != OPERATOR.0);
        let rules = IntakeRules::default();
        let ctx = IntakeContext::new(OperatorId(operator), OPERATOR, &rules);
        let mut state = IntakeState::Idle;

        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                prop_assert!(!result.effects.contains(&Effect::OpenSession));
                state = result.new_state;
                prop_assert_eq!(&state, &IntakeState::Idle);
            }
        }
    }

    // Fields only appear in forward order, and only Start or Cancel go back
    #[test]
    fn prop_fields_populate_monotonically(events in proptest::collection::vec(arb_event(), 0..30)) {
        let rules = IntakeRules::default();
        let ctx = IntakeContext::new(OPERATOR, OPERATOR, &rules);
        let mut state = IntakeState::Idle;

        for event in events {
            let resets = matches!(event, Event::Start | Event::Cancel);
            let Ok(result) = transition(&state, &ctx, event) else { continue };
            let next = result.new_state;

            if !resets {
                prop_assert!(rank(&next) >= rank(&state), "{:?} -> {:?}", state, next);
                prop_assert!(rank(&next) <= rank(&state) + 1, "{:?} -> {:?}", state, next);
            }
            let completed = matches!(next, IntakeState::Completed { .. });
            prop_assert_eq!(next.document().is_some(), completed);

            // Sessions end on terminal states, mirroring the engine
            state = if result.effects.contains(&Effect::DiscardSession) {
                IntakeState::Idle
            } else {
                next
            };
        }
    }
}
