//! End-to-end: events published on the stream are persisted, processed and
//! the strategies they produce survive monitoring when metrics improve.

use autotune_engine::{EngineConfig, StreamConsumer, ValidationOutcome};
use autotune_storage::{LearningEventStore, LearningResultStore, QueryWindow};
use autotune_stream::{encode_event, EntryId, EventStream, StreamCursor};
use autotune_tests::{feedback, improved_metrics, relevant_search, TestEngine};
use autotune_types::{AnnotationKind, EventStatus, RiskTolerance};
use std::sync::Arc;

async fn engine() -> TestEngine {
    let mut config = EngineConfig::fast();
    config.validation = config.validation.with_window_ms(100).with_sample_interval_ms(10);
    TestEngine::with_config(config, RiskTolerance::Low).await
}

#[tokio::test]
async fn published_events_flow_through_to_validated_strategies() {
    let engine = engine().await;
    let consumer = Arc::new(
        StreamConsumer::new(
            engine.stream.clone(),
            engine.orchestrator.clone(),
            engine.orchestrator.config().stream.clone(),
        )
        .with_cursor(StreamCursor::After(EntryId::ZERO)),
    );

    let search = relevant_search().with_correlation_id("search-1");
    let click = feedback("search-1");
    for event in [&search, &click] {
        engine.stream.publish(encode_event(event).unwrap()).await.unwrap();
    }

    consumer.start();
    engine.wait_for_events(EventStatus::Completed, 2).await;
    engine.metrics.set_current(improved_metrics());
    consumer.stop();
    consumer.join().await;

    let stored = engine.storage.get_event(&search.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EventStatus::Completed);

    let outcomes = engine.orchestrator.wait_for_validations().await;
    assert!(!outcomes.is_empty());
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, ValidationOutcome::Kept { .. })));

    let results = engine.storage.list_results(QueryWindow::first(10)).await.unwrap();
    let executed: usize = results.iter().map(|r| r.executed_count).sum();
    assert_eq!(executed, outcomes.len());
    for outcome in &outcomes {
        let result = results
            .iter()
            .find(|r| !r.annotations_for(outcome.strategy_id()).is_empty())
            .expect("result annotated for strategy");
        assert!(result.performance.is_some());
        let kinds: Vec<_> = result
            .annotations_for(outcome.strategy_id())
            .iter()
            .map(|a| a.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![AnnotationKind::StrategyExecuted, AnnotationKind::StrategyValidated]
        );
    }

    let weights = engine.active_weights().await.unwrap();
    assert!(weights.title > 2.0);
    let counters = engine.orchestrator.metrics().snapshot();
    assert_eq!(counters.validations_passed as usize, outcomes.len());
    assert_eq!(counters.strategies_rolled_back, 0);
}

#[tokio::test]
async fn feedback_strategies_are_proposed_but_not_executed() {
    let engine = engine().await;
    let outcome = engine
        .orchestrator
        .process_learning_batch(&[feedback("search-9")])
        .await
        .unwrap();
    assert_eq!(outcome.patterns.len(), 1);
    assert_eq!(outcome.strategy_count, 1);
    assert_eq!(outcome.executed_count, 0);

    let result = engine
        .storage
        .get_result(&outcome.result_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.recommendations.len(), 1);
    assert!(result.annotations.is_empty());
}
