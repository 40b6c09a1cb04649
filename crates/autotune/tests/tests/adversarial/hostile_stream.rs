//! Adversarial: a stream carrying garbage, forged statuses, floods and the
//! engine's own derived signals. Bad entries are skipped and counted, the
//! cursor always moves past them, and derived signals never feed back into
//! learning.

use autotune_engine::{EngineConfig, StreamConsumer, DERIVED_TAG};
use autotune_storage::{EventQuery, LearningEventStore};
use autotune_stream::{
    encode_event, EntryId, EventStream, StreamCursor, EVENT_FIELD, TYPE_FIELD,
};
use autotune_tests::{feedback, relevant_search, TestEngine};
use autotune_types::{EventStatus, LearningEvent, LearningEventType, RiskTolerance};
use std::collections::BTreeMap;
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

fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

async fn publish(engine: &TestEngine, event: &LearningEvent) {
    engine.stream.publish(encode_event(event).unwrap()).await.unwrap();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn garbage_entries_are_skipped_and_counted() {
    let engine = TestEngine::start().await;
    let good = feedback("search-1");
    let mut mismatched = encode_event(&feedback("search-2")).unwrap();
    mismatched.insert(TYPE_FIELD.to_string(), "SEARCH_PATTERN".to_string());

    engine.stream.publish(fields(&[("payload", "{}")])).await.unwrap();
    engine
        .stream
        .publish(fields(&[(EVENT_FIELD, "{not json")]))
        .await
        .unwrap();
    engine
        .stream
        .publish(fields(&[(EVENT_FIELD, r#"{"type":"NOT_A_TYPE"}"#)]))
        .await
        .unwrap();
    engine.stream.publish(mismatched).await.unwrap();
    publish(&engine, &good).await;

    let consumer = consumer_for(&engine);
    consumer.start();
    engine.wait_for_events(EventStatus::Completed, 1).await;
    consumer.stop();
    consumer.join().await;

    let last = engine.stream.entries().last().unwrap().id;
    assert_eq!(consumer.cursor(), StreamCursor::After(last));
    assert_eq!(engine.orchestrator.metrics().snapshot().events_failed, 4);
    let stored = engine
        .storage
        .query_events(EventQuery::default())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, good.id);
}

#[tokio::test]
async fn forged_statuses_are_reset_on_admission() {
    let engine = TestEngine::start().await;
    let forged = [
        feedback("a").with_status(EventStatus::Completed),
        feedback("b").with_status(EventStatus::Failed),
        feedback("c").with_status(EventStatus::Processing),
    ];
    for event in &forged {
        publish(&engine, event).await;
    }

    consumer_for(&engine)
        .handle_entries(&engine.stream.entries())
        .await
        .unwrap();
    for event in &forged {
        let stored = engine.storage.get_event(&event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Completed);
    }
    assert_eq!(engine.orchestrator.metrics().snapshot().events_processed, 3);
}

#[tokio::test]
async fn derived_signals_do_not_feed_back() {
    let mut config = EngineConfig::fast();
    config.stream.publish_derived_events = true;
    let engine = TestEngine::with_config(config, RiskTolerance::Low).await;
    let consumer = Arc::new(
        StreamConsumer::new(
            engine.stream.clone(),
            engine.orchestrator.clone(),
            engine.orchestrator.config().stream.clone(),
        )
        .with_cursor(StreamCursor::After(EntryId::ZERO)),
    );
    consumer.start();
    publish(&engine, &relevant_search()).await;

    // one search, two patterns, two derived signals
    engine.wait_for_events(EventStatus::Ignored, 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    consumer.stop();
    consumer.join().await;

    assert_eq!(engine.stream.len(), 3);
    let ignored = engine
        .storage
        .query_events(EventQuery::default().with_status(EventStatus::Ignored))
        .await
        .unwrap();
    assert!(ignored
        .iter()
        .all(|e| e.event_type == LearningEventType::SignalDetected && e.has_tag(DERIVED_TAG)));
    assert_eq!(engine.orchestrator.metrics().snapshot().batches_processed, 1);
    engine.orchestrator.shutdown();
    engine.orchestrator.wait_for_validations().await;
}

#[tokio::test]
async fn forged_derived_tag_suppresses_processing() {
    let engine = TestEngine::start().await;
    let disguised = relevant_search().with_tag(DERIVED_TAG);
    publish(&engine, &disguised).await;

    consumer_for(&engine)
        .handle_entries(&engine.stream.entries())
        .await
        .unwrap();
    let stored = engine.storage.get_event(&disguised.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EventStatus::Ignored);
    assert_eq!(engine.active_weights().await.unwrap().title, 2.0);
}

#[tokio::test]
async fn flood_is_consumed_in_bounded_batches() {
    let mut config = EngineConfig::fast();
    config.stream.batch_size = 25;
    let engine = TestEngine::with_config(config, RiskTolerance::Low).await;
    for i in 0..100 {
        publish(&engine, &feedback(&format!("flood-{i}"))).await;
    }

    let consumer = consumer_for(&engine);
    consumer.start();
    engine.wait_for_events(EventStatus::Completed, 100).await;
    consumer.stop();
    consumer.join().await;

    let counters = engine.orchestrator.metrics().snapshot();
    assert_eq!(counters.events_processed, 100);
    assert_eq!(counters.batches_processed, 4);
}

#[tokio::test]
async fn flaky_reads_delay_but_do_not_lose_events() {
    let engine = TestEngine::start().await;
    engine.stream.fail_next_reads(3);
    let event = feedback("search-1");
    publish(&engine, &event).await;

    let consumer = consumer_for(&engine);
    consumer.start();
    engine.wait_for_events(EventStatus::Completed, 1).await;
    consumer.stop();
    consumer.join().await;
    assert!(engine.storage.get_event(&event.id).await.unwrap().is_some());
}
