//! End-to-end: the autonomous cycle reads recent completed events, records a
//! learning result, applies the admitted strategies and tracks the whole run
//! as a LEARNING operation.

use autotune_engine::{EngineConfig, LearningCycleReport, ValidationOutcome};
use autotune_storage::{
    EngineStateStore, LearningEventStore, LearningResultStore, OperationStore, QueryWindow,
};
use autotune_tests::{feedback, improved_metrics, relevant_search, TestEngine};
use autotune_types::{
    AnnotationKind, EngineStatus, EventStatus, LearningEvent, LearningResultId, OperationStatus,
    OperationType, RiskTolerance, StrategyKind,
};
use chrono::{Duration, Utc};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn engine_with_window(window_ms: u64) -> TestEngine {
    let mut config = EngineConfig::fast();
    config.validation = config.validation.with_window_ms(window_ms).with_sample_interval_ms(10);
    TestEngine::with_config(config, RiskTolerance::Low).await
}

async fn store_completed(engine: &TestEngine, events: Vec<LearningEvent>) {
    for event in events {
        engine
            .storage
            .append_event(event.with_status(EventStatus::Completed))
            .await
            .unwrap();
    }
}

fn completed_report(report: LearningCycleReport) -> (LearningResultId, usize, usize, usize) {
    match report {
        LearningCycleReport::Completed {
            result_id,
            pattern_count,
            strategy_count,
            executed_count,
        } => (result_id, pattern_count, strategy_count, executed_count),
        other => panic!("expected a completed cycle, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cycle_learns_from_recent_completed_events() {
    let engine = engine_with_window(100).await;
    let stale = relevant_search().with_timestamp(Utc::now() - Duration::hours(48));
    store_completed(&engine, vec![relevant_search(), stale]).await;

    let report = engine.orchestrator.execute_autonomous_learning_cycle().await;
    let (result_id, patterns, strategies, executed) = completed_report(report);
    assert_eq!(patterns, 2, "stale event must fall outside the lookback");
    assert_eq!(strategies, 2);
    assert_eq!(executed, 2);

    let result = engine.storage.get_result(&result_id).await.unwrap().unwrap();
    assert_eq!(result.executed_count, 2);
    let kinds: Vec<_> = result.recommendations.iter().map(|s| s.kind()).collect();
    assert_eq!(
        kinds,
        vec![StrategyKind::WeightAdjustment, StrategyKind::QueryTransformation]
    );
    assert!(result
        .recommendations
        .iter()
        .all(|s| s.learning_result_id.as_ref() == Some(&result_id)));
    let executed_notes = result
        .annotations
        .iter()
        .filter(|a| a.kind == AnnotationKind::StrategyExecuted)
        .count();
    assert_eq!(executed_notes, 2);

    engine.metrics.set_current(improved_metrics());
    let outcomes = engine.orchestrator.wait_for_validations().await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, ValidationOutcome::Kept { .. })));
}

#[tokio::test]
async fn cycle_is_tracked_as_a_learning_operation() {
    let engine = engine_with_window(100).await;
    store_completed(&engine, vec![relevant_search()]).await;

    let report = engine.orchestrator.execute_autonomous_learning_cycle().await;
    assert!(!report.is_failed());
    engine.metrics.set_current(improved_metrics());
    engine.orchestrator.wait_for_validations().await;

    let operations = engine
        .storage
        .list_operations(QueryWindow::first(20))
        .await
        .unwrap();
    let learning: Vec<_> = operations
        .iter()
        .filter(|op| op.op_type == OperationType::Learning)
        .collect();
    assert_eq!(learning.len(), 1);
    let op = learning[0];
    assert_eq!(op.status, OperationStatus::Completed);
    assert_eq!(op.metrics.get("patternCount"), Some(&2.0));
    assert_eq!(op.metrics.get("executedCount"), Some(&2.0));
    assert!(op.end_time.is_some());

    let validations = operations
        .iter()
        .filter(|op| op.op_type == OperationType::Validation)
        .count();
    assert_eq!(validations, 2);

    let state = engine.storage.current_state().await.unwrap().unwrap();
    assert_eq!(state.status, EngineStatus::Ready);
    assert!(state.confidence > 0.9);
}

#[tokio::test]
async fn pending_and_failed_events_are_not_learned_from() {
    let engine = TestEngine::start().await;
    for status in [EventStatus::Pending, EventStatus::Failed] {
        engine
            .storage
            .append_event(relevant_search().with_status(status))
            .await
            .unwrap();
    }

    let report = engine.orchestrator.execute_autonomous_learning_cycle().await;
    assert_eq!(report, LearningCycleReport::NoPatterns { events_analyzed: 0 });
    let results = engine.storage.list_results(QueryWindow::first(5)).await.unwrap();
    assert!(results.is_empty());
    assert_eq!(engine.orchestrator.metrics().snapshot().cycles_run, 1);
}

#[tokio::test]
async fn repeated_cycles_stack_weight_adjustments() {
    let engine = engine_with_window(60_000).await;
    store_completed(&engine, vec![relevant_search(), feedback("search-1")]).await;

    for _ in 0..2 {
        let report = engine.orchestrator.execute_autonomous_learning_cycle().await;
        assert!(matches!(report, LearningCycleReport::Completed { .. }));
    }

    let weights = engine.active_weights().await.unwrap();
    assert!((weights.title - 2.0 * 1.15 * 1.15).abs() < 1e-9);
    assert!((weights.tag - 1.5 * 1.1 * 1.1).abs() < 1e-9);
    assert_eq!(weights.content, 1.0);
    assert_eq!(engine.orchestrator.pending_validations(), 4);

    engine.orchestrator.shutdown();
    let outcomes = engine.orchestrator.wait_for_validations().await;
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, ValidationOutcome::Cancelled { .. })));
    assert_eq!(engine.active_weights().await.unwrap(), weights);
    assert_eq!(engine.orchestrator.metrics().snapshot().cycles_run, 2);
}
