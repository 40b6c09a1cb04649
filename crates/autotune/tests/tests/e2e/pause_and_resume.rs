//! End-to-end: a paused engine keeps learning but changes nothing, survives
//! a restart paused, and acts again once resumed.

use autotune_engine::{LearningCycleReport, StateTracker};
use autotune_executor::SearchWeights;
use autotune_storage::{EngineStateStore, LearningEventStore, LearningResultStore};
use autotune_tests::{improved_metrics, relevant_search, TestEngine};
use autotune_types::{EngineStatus, EventStatus, RiskLevel, RiskTolerance};

#[tokio::test]
async fn paused_engine_records_results_without_applying_them() {
    let engine = TestEngine::start().await;
    engine.tracker.pause().await.unwrap();

    let outcome = engine
        .orchestrator
        .process_learning_batch(&[relevant_search()])
        .await
        .unwrap();
    assert_eq!(outcome.strategy_count, 2);
    assert_eq!(outcome.executed_count, 0);
    assert_eq!(engine.orchestrator.pending_validations(), 0);
    assert_eq!(engine.active_weights().await, Some(SearchWeights::default()));

    let result = engine
        .storage
        .get_result(&outcome.result_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.recommendations.len(), 2);
    assert_eq!(result.executed_count, 0);
    assert!(result.annotations.is_empty());

    assert_eq!(engine.tracker.status(), EngineStatus::Paused);
    let counters = engine.orchestrator.metrics().snapshot();
    assert_eq!(counters.strategies_generated, 2);
    assert_eq!(counters.strategies_executed, 0);
}

#[tokio::test]
async fn paused_cycle_is_skipped_and_not_counted() {
    let engine = TestEngine::start().await;
    engine
        .storage
        .append_event(relevant_search().with_status(EventStatus::Completed))
        .await
        .unwrap();
    engine.tracker.pause().await.unwrap();

    let report = engine.orchestrator.execute_autonomous_learning_cycle().await;
    assert_eq!(report, LearningCycleReport::Skipped);
    assert_eq!(engine.orchestrator.metrics().snapshot().cycles_run, 0);

    engine.tracker.resume().await.unwrap();
    assert_eq!(engine.tracker.status(), EngineStatus::Ready);
    let report = engine.orchestrator.execute_autonomous_learning_cycle().await;
    assert!(matches!(
        report,
        LearningCycleReport::Completed {
            executed_count: 2,
            ..
        }
    ));

    engine.metrics.set_current(improved_metrics());
    engine.orchestrator.wait_for_validations().await;
    assert_eq!(engine.tracker.status(), EngineStatus::Ready);
}

#[tokio::test]
async fn pause_survives_a_restart() {
    let engine = TestEngine::start().await;
    engine.tracker.pause().await.unwrap();

    let reloaded = StateTracker::load(engine.storage.clone(), RiskTolerance::Low)
        .await
        .unwrap();
    assert!(reloaded.is_paused());
    let saved = engine.storage.current_state().await.unwrap().unwrap();
    assert_eq!(saved.status, EngineStatus::Paused);
}

#[tokio::test]
async fn raised_tolerance_reaches_the_executor() {
    let engine = TestEngine::start().await;
    let executor = engine.orchestrator.executor();
    assert_eq!(executor.risk_tolerance().await.unwrap(), RiskTolerance::Low);
    assert!(!RiskTolerance::Low.permits(RiskLevel::High));

    engine.tracker.set_risk_tolerance(RiskTolerance::Medium).await.unwrap();
    assert_eq!(executor.risk_tolerance().await.unwrap(), RiskTolerance::Medium);
    assert!(RiskTolerance::Medium.permits(RiskLevel::High));

    // tolerance survives pause and resume
    engine.tracker.pause().await.unwrap();
    engine.tracker.resume().await.unwrap();
    assert_eq!(
        engine.tracker.state().risk_tolerance(),
        RiskTolerance::Medium
    );
}
