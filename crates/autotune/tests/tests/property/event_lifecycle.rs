//! Property tests: event lifecycle.
//!
//! Terminal events never move again, whatever sequence of transitions is
//! attempted, in memory or through the store. Retry copies are fresh
//! PENDING events one attempt further on.

use autotune_storage::{InMemoryAutotuneStorage, LearningEventStore, StorageError};
use autotune_types::{EventStatus, LearningEvent, LearningEventType};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn arb_status() -> impl Strategy<Value = EventStatus> {
    prop_oneof![
        Just(EventStatus::Pending),
        Just(EventStatus::Processing),
        Just(EventStatus::Completed),
        Just(EventStatus::Failed),
        Just(EventStatus::Ignored),
    ]
}

fn arb_event_type() -> impl Strategy<Value = LearningEventType> {
    prop_oneof![
        Just(LearningEventType::SearchPattern),
        Just(LearningEventType::UserFeedback),
        Just(LearningEventType::MetricThreshold),
        Just(LearningEventType::SignalDetected),
    ]
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Once terminal, a walk of arbitrary transitions leaves the status alone.
    #[test]
    fn terminal_is_absorbing(walk in prop::collection::vec(arb_status(), 1..20)) {
        let mut event = LearningEvent::new(LearningEventType::SearchPattern);
        let mut terminal: Option<EventStatus> = None;
        for next in walk {
            let before = event.status;
            let moved = event.transition(next).is_ok();
            if let Some(t) = terminal {
                prop_assert!(!moved);
                prop_assert_eq!(event.status, t);
            } else if moved {
                prop_assert!(before.can_transition_to(next));
                prop_assert_eq!(event.status, next);
            } else {
                prop_assert_eq!(event.status, before);
            }
            if event.status.is_terminal() {
                terminal = Some(event.status);
            }
        }
    }

    /// The store enforces the same rule and never changes a terminal event.
    #[test]
    fn store_rejects_moves_out_of_terminal(
        terminal in prop_oneof![Just(EventStatus::Completed), Just(EventStatus::Failed), Just(EventStatus::Ignored)],
        next in arb_status(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (result, stored) = rt.block_on(async {
            let storage = InMemoryAutotuneStorage::new();
            let event = LearningEvent::new(LearningEventType::UserFeedback).with_status(terminal);
            storage.append_event(event.clone()).await.unwrap();
            let result = storage.transition_event(&event.id, terminal, next).await;
            (result, storage.get_event(&event.id).await.unwrap().unwrap())
        });
        let invariant = matches!(result, Err(StorageError::InvariantViolation(_)));
        prop_assert!(invariant);
        prop_assert_eq!(stored.status, terminal);
    }

    /// A stale expected status is a conflict and changes nothing.
    #[test]
    fn stale_view_conflicts(actual in arb_status(), expected in arb_status(), next in arb_status()) {
        prop_assume!(actual != expected);
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (result, stored) = rt.block_on(async {
            let storage = InMemoryAutotuneStorage::new();
            let event = LearningEvent::new(LearningEventType::SearchPattern).with_status(actual);
            storage.append_event(event.clone()).await.unwrap();
            let result = storage.transition_event(&event.id, expected, next).await;
            (result, storage.get_event(&event.id).await.unwrap().unwrap())
        });
        let conflict = matches!(result, Err(StorageError::Conflict(_)));
        prop_assert!(conflict);
        prop_assert_eq!(stored.status, actual);
    }

    /// Retry copies keep the payload but are new, pending and counted.
    #[test]
    fn retry_copy_is_a_fresh_attempt(event_type in arb_event_type(), status in arb_status(), attempts in 0u32..10, took in 1u32..1_000) {
        let mut event = LearningEvent::new(event_type)
            .with_status(status)
            .with_metadata("took", took)
            .with_correlation_id("c-1");
        event.retry_count = attempts;

        let copy = event.retry_copy();
        prop_assert_ne!(&copy.id, &event.id);
        prop_assert_eq!(copy.status, EventStatus::Pending);
        prop_assert_eq!(copy.retry_count, attempts + 1);
        prop_assert_eq!(copy.event_type, event.event_type);
        prop_assert_eq!(&copy.metadata, &event.metadata);
        prop_assert_eq!(copy.correlation_id, event.correlation_id);
    }
}
