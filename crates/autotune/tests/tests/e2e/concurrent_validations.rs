//! End-to-end: several strategies can be in their validation windows at
//! once. The registry shows each of them while it runs, and concurrent
//! writes to the shared weights never lose an update.

use autotune_engine::EngineConfig;
use autotune_executor::{SearchWeights, StrategyExecutor};
use autotune_metrics::SimulatedMetrics;
use autotune_storage::{InMemoryAutotuneStorage, LearningResultStore};
use autotune_tests::{baseline_metrics, improved_metrics, relevant_search, TestEngine};
use autotune_types::{
    pattern_types, EngineLearningResult, LearningPattern, OptimizationStrategy, RiskLevel,
    RiskTolerance, StrategyAction,
};
use autotune_validator::{ImpactValidator, ValidationPhase, ValidationSettings};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn weight_strategy() -> OptimizationStrategy {
    OptimizationStrategy::new(
        StrategyAction::WeightAdjustment {
            title_factor: 1.15,
            tag_factor: 1.1,
        },
        RiskLevel::Low,
        0.15,
    )
    .with_confidence(0.9)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn registry_lists_every_strategy_inside_its_window() {
    let mut config = EngineConfig::fast();
    config.validation = config.validation.with_window_ms(150).with_sample_interval_ms(10);
    let engine = TestEngine::with_config(config, RiskTolerance::Low).await;
    let registry = engine.orchestrator.validator().registry().clone();

    let outcome = engine
        .orchestrator
        .process_learning_batch(&[relevant_search()])
        .await
        .unwrap();
    engine.metrics.set_current(improved_metrics());
    tokio::time::sleep(Duration::from_millis(40)).await;

    let in_flight = registry.in_flight();
    assert_eq!(in_flight.len(), outcome.executed_count);
    assert!(in_flight.iter().all(|c| c.phase == ValidationPhase::Monitor));
    assert_eq!(engine.orchestrator.pending_validations(), 2);

    let outcomes = engine.orchestrator.wait_for_validations().await;
    assert_eq!(outcomes.len(), 2);
    assert!(registry.is_empty());
    assert_eq!(engine.orchestrator.pending_validations(), 0);
}

#[tokio::test]
async fn impact_validations_run_side_by_side() {
    let metrics = Arc::new(SimulatedMetrics::new(baseline_metrics()));
    let validator = Arc::new(
        ImpactValidator::new(metrics.clone())
            .with_settings(ValidationSettings::default().with_window_ms(60)),
    );
    let pattern = LearningPattern::new(pattern_types::HIGH_RELEVANCE_SEARCH, 0.9, "test");
    let first = weight_strategy();
    let second = weight_strategy();

    let observer = {
        let registry = validator.registry().clone();
        let ids = (first.id.clone(), second.id.clone());
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            (
                registry.len(),
                registry.contains(&ids.0) && registry.contains(&ids.1),
                registry.get(&ids.0).map(|c| c.phase),
            )
        }
    };
    let (a, b, seen) = tokio::join!(
        validator.validate_impact(&first, &pattern),
        validator.validate_impact(&second, &pattern),
        observer
    );

    assert_eq!(seen, (2, true, Some(ValidationPhase::Impact)));
    assert_eq!(a.unwrap().strategy_id, first.id);
    assert_eq!(b.unwrap().strategy_id, second.id);
    assert!(validator.registry().is_empty());
    assert_eq!(metrics.recorded().len(), 2);
}

#[tokio::test]
async fn concurrent_weight_writes_are_serialized() {
    let storage = Arc::new(InMemoryAutotuneStorage::new());
    let executor = Arc::new(StrategyExecutor::new(storage.clone()));
    executor.seed_weights(SearchWeights::default()).await.unwrap();

    let mut result = EngineLearningResult::new(vec![]);
    result.adopt((0..4).map(|_| weight_strategy()).collect());
    storage.create_result(result.clone()).await.unwrap();

    let tasks: Vec<_> = result
        .recommendations
        .iter()
        .cloned()
        .map(|strategy| {
            let executor = executor.clone();
            tokio::spawn(async move { executor.execute(&strategy).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let weights = executor.active_weights().await.unwrap().unwrap();
    assert!((weights.title - 2.0 * 1.15_f64.powi(4)).abs() < 1e-9);
    assert!((weights.tag - 1.5 * 1.1_f64.powi(4)).abs() < 1e-9);
}
