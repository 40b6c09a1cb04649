//! End-to-end: stopping the consumer and shutting the engine down leave the
//! store consistent. Blocked reads are abandoned, in-flight monitoring is
//! cancelled without reverting anything, and a stopped consumer can resume
//! from where it left off.

use autotune_engine::{EngineConfig, StreamConsumer, ValidationOutcome};
use autotune_storage::{OperationStore, QueryWindow};
use autotune_stream::{encode_event, EntryId, EventStream, StreamCursor};
use autotune_tests::{relevant_search, TestEngine};
use autotune_types::{EventStatus, OperationStatus, OperationType, RiskTolerance};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn consumer_for(engine: &TestEngine) -> Arc<StreamConsumer> {
    Arc::new(
        StreamConsumer::new(
            engine.stream.clone(),
            engine.orchestrator.clone(),
            engine.orchestrator.config().stream.clone(),
        )
        .with_cursor(StreamCursor::After(EntryId::ZERO)),
    )
}

async fn long_window_engine() -> TestEngine {
    let mut config = EngineConfig::fast();
    config.validation = config.validation.with_window_ms(60_000).with_sample_interval_ms(10);
    TestEngine::with_config(config, RiskTolerance::Low).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stop_abandons_an_idle_read() {
    let engine = TestEngine::start().await;
    let consumer = consumer_for(&engine);
    assert!(consumer.start());
    assert!(!consumer.start(), "second start is a no-op");
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(consumer.stop());
    tokio::time::timeout(Duration::from_secs(1), consumer.join())
        .await
        .expect("consumer loop exits promptly");
    assert!(!consumer.is_running());
    assert!(!consumer.stop(), "stopping twice only warns");
}

#[tokio::test]
async fn stopped_consumer_resumes_from_its_cursor() {
    let engine = TestEngine::start().await;
    let consumer = consumer_for(&engine);

    consumer.start();
    engine
        .stream
        .publish(encode_event(&relevant_search()).unwrap())
        .await
        .unwrap();
    engine.wait_for_events(EventStatus::Completed, 1).await;
    consumer.stop();
    consumer.join().await;
    let cursor = consumer.cursor();
    assert_ne!(cursor, StreamCursor::After(EntryId::ZERO));

    engine
        .stream
        .publish(encode_event(&relevant_search()).unwrap())
        .await
        .unwrap();
    consumer.start();
    engine.wait_for_events(EventStatus::Completed, 2).await;
    consumer.stop();
    consumer.join().await;

    assert_eq!(engine.orchestrator.metrics().snapshot().batches_processed, 2);
    engine.orchestrator.wait_for_validations().await;
}

#[tokio::test]
async fn shutdown_cancels_monitoring_and_keeps_applied_strategies() {
    let engine = long_window_engine().await;
    let consumer = consumer_for(&engine);
    consumer.start();
    engine
        .stream
        .publish(encode_event(&relevant_search()).unwrap())
        .await
        .unwrap();
    engine.wait_for_events(EventStatus::Completed, 1).await;
    let applied = engine.active_weights().await.unwrap();

    consumer.stop();
    consumer.join().await;
    engine.orchestrator.shutdown();
    let outcomes = tokio::time::timeout(
        Duration::from_secs(1),
        engine.orchestrator.wait_for_validations(),
    )
    .await
    .expect("monitoring ends on shutdown");

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, ValidationOutcome::Cancelled { .. })));
    assert_eq!(engine.active_weights().await.unwrap(), applied);
    assert_eq!(engine.orchestrator.metrics().snapshot().strategies_rolled_back, 0);

    let operations = engine
        .storage
        .list_operations(QueryWindow::first(20))
        .await
        .unwrap();
    let validations: Vec<_> = operations
        .iter()
        .filter(|op| op.op_type == OperationType::Validation)
        .collect();
    assert_eq!(validations.len(), 2);
    assert!(validations
        .iter()
        .all(|op| op.status == OperationStatus::Cancelled));
    assert_eq!(engine.tracker.in_flight(), 0);
}
