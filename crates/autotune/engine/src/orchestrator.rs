use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::metrics::EngineMetrics;
use crate::state::StateTracker;
use autotune_detectors::{DetectorFailure, DetectorSet};
use autotune_executor::StrategyExecutor;
use autotune_metrics::MetricsProvider;
use autotune_storage::{AutotuneStorage, EventQuery, LearningEventStore};
use autotune_strategy::{AutonomyGate, StrategyGenerator};
use autotune_types::{
    AnnotationKind, EngineLearningResult, EngineOperation, EventStatus, LearningEvent,
    LearningPattern, LearningResultId, OperationType, OptimizationStrategy, PerformanceAnnotation,
    PerformanceBlock, PerformanceMetrics, StrategyId,
};
use autotune_validator::{ImpactValidator, MonitorOutcome};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Result of one autonomous learning cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LearningCycleReport {
    /// Patterns were found and their strategies recorded.
    Completed {
        result_id: LearningResultId,
        pattern_count: usize,
        strategy_count: usize,
        executed_count: usize,
    },
    /// Nothing in the lookback window formed a pattern.
    NoPatterns { events_analyzed: usize },
    /// The engine is paused.
    Skipped,
    Failed { error: String },
}

impl LearningCycleReport {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// How a monitored strategy ended up.
#[derive(Clone, Debug, PartialEq)]
pub enum ValidationOutcome {
    Kept {
        strategy_id: StrategyId,
        weighted_improvement: f64,
    },
    RolledBack {
        strategy_id: StrategyId,
        reason: String,
    },
    RollbackFailed {
        strategy_id: StrategyId,
        error: String,
    },
    Cancelled {
        strategy_id: StrategyId,
    },
}

impl ValidationOutcome {
    pub fn strategy_id(&self) -> &StrategyId {
        match self {
            Self::Kept { strategy_id, .. }
            | Self::RolledBack { strategy_id, .. }
            | Self::RollbackFailed { strategy_id, .. }
            | Self::Cancelled { strategy_id } => strategy_id,
        }
    }

    pub fn rolled_back(&self) -> bool {
        matches!(self, Self::RolledBack { .. })
    }
}

/// A strategy that was not applied.
#[derive(Clone, Debug, PartialEq)]
pub struct StrategyFailure {
    pub strategy_id: StrategyId,
    pub error: String,
    /// Refused before anything was written.
    pub rejected: bool,
}

/// Strategies applied in one call, with their monitoring tasks.
#[derive(Debug, Default)]
pub struct AppliedStrategies {
    pub executed: Vec<StrategyId>,
    pub failures: Vec<StrategyFailure>,
    pub validations: Vec<JoinHandle<ValidationOutcome>>,
}

/// What one batch of events produced.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub patterns: Vec<LearningPattern>,
    pub detector_failures: Vec<DetectorFailure>,
    pub result_id: Option<LearningResultId>,
    pub strategy_count: usize,
    pub executed_count: usize,
}

struct ActedOn {
    result_id: LearningResultId,
    strategy_count: usize,
    executed_count: usize,
}

/// Drives detection, strategy generation, execution and monitoring.
///
/// A learning result is persisted before any of its strategies runs, so
/// executed strategies always have a record to annotate.
pub struct LearningOrchestrator {
    storage: Arc<dyn AutotuneStorage>,
    detectors: DetectorSet,
    generator: StrategyGenerator,
    gate: AutonomyGate,
    executor: Arc<StrategyExecutor>,
    validator: Arc<ImpactValidator>,
    tracker: Arc<StateTracker>,
    metrics: Arc<EngineMetrics>,
    config: EngineConfig,
    shutdown: CancellationToken,
    monitors: Mutex<Vec<JoinHandle<ValidationOutcome>>>,
}

impl LearningOrchestrator {
    pub fn new<S: AutotuneStorage + 'static>(
        storage: Arc<S>,
        metrics: Arc<dyn MetricsProvider>,
        tracker: Arc<StateTracker>,
        config: EngineConfig,
    ) -> Self {
        let event_store: Arc<dyn LearningEventStore> = storage.clone();
        let storage: Arc<dyn AutotuneStorage> = storage;
        let validator = ImpactValidator::new(metrics).with_settings(config.validation.clone());
        Self {
            detectors: DetectorSet::standard(Some(event_store)),
            generator: StrategyGenerator::new().with_rules(config.generator),
            gate: config.gate,
            executor: Arc::new(StrategyExecutor::new(storage.clone())),
            validator: Arc::new(validator),
            storage,
            tracker,
            metrics: Arc::new(EngineMetrics::new()),
            config,
            shutdown: CancellationToken::new(),
            monitors: Mutex::new(Vec::new()),
        }
    }

    pub fn with_detectors(mut self, detectors: DetectorSet) -> Self {
        self.detectors = detectors;
        self
    }

    pub fn with_generator(mut self, generator: StrategyGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_executor(mut self, executor: Arc<StrategyExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_validator(mut self, validator: Arc<ImpactValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn storage(&self) -> &Arc<dyn AutotuneStorage> {
        &self.storage
    }

    pub fn tracker(&self) -> &Arc<StateTracker> {
        &self.tracker
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    pub fn executor(&self) -> &Arc<StrategyExecutor> {
        &self.executor
    }

    pub fn validator(&self) -> &Arc<ImpactValidator> {
        &self.validator
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Analyze one batch and act on what it shows.
    ///
    /// While the engine is paused the batch is still analyzed and its result
    /// recorded, but no strategy is executed.
    pub async fn process_learning_batch(
        &self,
        events: &[LearningEvent],
    ) -> EngineResult<BatchOutcome> {
        let mut operation = self
            .tracker
            .start_operation(OperationType::PatternDetection)
            .await?;

        let detection = self.detectors.analyze(events).await;
        self.metrics
            .record_detection(detection.patterns.len(), detection.failures.len());
        self.metrics.record_batch(events.len());

        let mut outcome = BatchOutcome {
            patterns: detection.patterns,
            detector_failures: detection.failures,
            ..BatchOutcome::default()
        };

        if !outcome.patterns.is_empty() {
            match self.act_on(outcome.patterns.clone()).await {
                Ok(acted) => {
                    outcome.result_id = Some(acted.result_id);
                    outcome.strategy_count = acted.strategy_count;
                    outcome.executed_count = acted.executed_count;
                }
                Err(e) => {
                    self.fail(&mut operation, &e.to_string()).await;
                    return Err(e);
                }
            }
        }

        self.tracker
            .complete_operation(
                &mut operation,
                counts(
                    outcome.patterns.len(),
                    outcome.strategy_count,
                    outcome.executed_count,
                ),
            )
            .await?;
        tracing::debug!(
            events = events.len(),
            patterns = outcome.patterns.len(),
            executed = outcome.executed_count,
            "learning batch processed"
        );
        Ok(outcome)
    }

    /// Run one full cycle over recent completed events. Never fails; errors
    /// are reported in the returned [`LearningCycleReport`].
    pub async fn execute_autonomous_learning_cycle(&self) -> LearningCycleReport {
        if self.tracker.is_paused() {
            tracing::info!("engine paused; learning cycle skipped");
            return LearningCycleReport::Skipped;
        }

        let report = match self.run_cycle().await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "learning cycle failed");
                LearningCycleReport::Failed {
                    error: e.to_string(),
                }
            }
        };
        self.metrics.record_cycle(report.is_failed());
        report
    }

    async fn run_cycle(&self) -> EngineResult<LearningCycleReport> {
        let mut operation = self.tracker.start_operation(OperationType::Learning).await?;
        match self.cycle_body().await {
            Ok((report, metrics)) => {
                self.tracker.complete_operation(&mut operation, metrics).await?;
                Ok(report)
            }
            Err(e) => {
                self.fail(&mut operation, &e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn cycle_body(&self) -> EngineResult<(LearningCycleReport, BTreeMap<String, f64>)> {
        let since = Utc::now() - Duration::hours(self.config.cycle.lookback_hours);
        let events = self
            .storage
            .query_events(
                EventQuery::default()
                    .with_status(EventStatus::Completed)
                    .since(since)
                    .limit(self.config.cycle.max_events),
            )
            .await?;

        let detection = self.detectors.analyze(&events).await;
        self.metrics
            .record_detection(detection.patterns.len(), detection.failures.len());

        if detection.patterns.is_empty() {
            tracing::info!(events = events.len(), "learning cycle found no patterns");
            return Ok((
                LearningCycleReport::NoPatterns {
                    events_analyzed: events.len(),
                },
                counts(0, 0, 0),
            ));
        }

        let pattern_count = detection.patterns.len();
        let acted = self.act_on(detection.patterns).await?;
        let report = LearningCycleReport::Completed {
            result_id: acted.result_id.clone(),
            pattern_count,
            strategy_count: acted.strategy_count,
            executed_count: acted.executed_count,
        };
        tracing::info!(
            result_id = %acted.result_id,
            events = events.len(),
            patterns = pattern_count,
            strategies = acted.strategy_count,
            executed = acted.executed_count,
            "learning cycle completed"
        );
        Ok((
            report,
            counts(pattern_count, acted.strategy_count, acted.executed_count),
        ))
    }

    /// Generate strategies for `patterns`, persist the result, then apply
    /// the strategies the gate admits unless the engine is paused.
    async fn act_on(&self, patterns: Vec<LearningPattern>) -> EngineResult<ActedOn> {
        let generated = self.generator.generate_all(&patterns);
        self.metrics.record_generated(generated.len());

        let mut result = EngineLearningResult::new(patterns);
        result.adopt(generated);
        let admitted = self.gate.rank(&result.recommendations);
        let result_id = result.id.clone();
        let strategy_count = result.recommendations.len();
        self.storage.create_result(result).await?;

        if let Err(e) = self.tracker.set_confidence(self.average_confidence(&admitted)).await {
            tracing::warn!(error = %e, "engine confidence not updated");
        }

        if self.tracker.is_paused() {
            tracing::info!(
                result_id = %result_id,
                admitted = admitted.len(),
                "engine paused; strategies recorded without execution"
            );
            return Ok(ActedOn {
                result_id,
                strategy_count,
                executed_count: 0,
            });
        }

        let applied = self.apply_strategies_with_validation(admitted).await;
        let executed_count = applied.executed.len();
        self.track(applied.validations);
        self.storage
            .set_executed_count(&result_id, executed_count)
            .await?;

        Ok(ActedOn {
            result_id,
            strategy_count,
            executed_count,
        })
    }

    fn average_confidence(&self, strategies: &[OptimizationStrategy]) -> f64 {
        if strategies.is_empty() {
            return self.tracker.state().confidence;
        }
        strategies.iter().map(|s| s.confidence).sum::<f64>() / strategies.len() as f64
    }

    /// Execute each strategy in turn and spawn a monitoring task for every
    /// one that was applied.
    ///
    /// A strategy whose execution fails after it may have written anything is
    /// rolled back straight away.
    pub async fn apply_strategies_with_validation(
        &self,
        strategies: Vec<OptimizationStrategy>,
    ) -> AppliedStrategies {
        let mut applied = AppliedStrategies::default();
        for strategy in strategies {
            let baseline = match self.validator.snapshot().await {
                Ok(baseline) => baseline,
                Err(e) => {
                    tracing::warn!(strategy_id = %strategy.id, error = %e, "no baseline; strategy skipped");
                    applied.failures.push(StrategyFailure {
                        strategy_id: strategy.id.clone(),
                        error: e.to_string(),
                        rejected: true,
                    });
                    continue;
                }
            };

            match self.executor.execute(&strategy).await {
                Ok(_) => {
                    self.metrics.record_executed();
                    applied.executed.push(strategy.id.clone());
                    applied
                        .validations
                        .push(self.spawn_monitor(strategy, baseline));
                }
                Err(e) if e.is_rejection() => {
                    self.metrics.record_rejected();
                    applied.failures.push(StrategyFailure {
                        strategy_id: strategy.id.clone(),
                        error: e.to_string(),
                        rejected: true,
                    });
                }
                Err(e) => {
                    tracing::error!(strategy_id = %strategy.id, error = %e, "strategy execution failed");
                    if self.executor.rollback(&strategy).await.is_ok() {
                        self.metrics.record_rollback();
                    }
                    applied.failures.push(StrategyFailure {
                        strategy_id: strategy.id.clone(),
                        error: e.to_string(),
                        rejected: false,
                    });
                }
            }
        }
        applied
    }

    fn spawn_monitor(
        &self,
        strategy: OptimizationStrategy,
        baseline: PerformanceMetrics,
    ) -> JoinHandle<ValidationOutcome> {
        let task = MonitorTask {
            storage: self.storage.clone(),
            executor: self.executor.clone(),
            validator: self.validator.clone(),
            tracker: self.tracker.clone(),
            metrics: self.metrics.clone(),
            cancel: self.shutdown.child_token(),
        };
        tokio::spawn(async move { task.run(strategy, baseline).await })
    }

    fn monitors(&self) -> MutexGuard<'_, Vec<JoinHandle<ValidationOutcome>>> {
        self.monitors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Keep `handles`, dropping tasks that already finished. Their outcome is
    /// already in the counters and on the learning result.
    fn track(&self, handles: Vec<JoinHandle<ValidationOutcome>>) {
        let mut monitors = self.monitors();
        monitors.retain(|h| !h.is_finished());
        monitors.extend(handles);
    }

    /// Monitoring tasks not yet awaited.
    pub fn pending_validations(&self) -> usize {
        self.monitors().iter().filter(|h| !h.is_finished()).count()
    }

    /// Monitoring tasks held, finished or not.
    pub fn tracked_validations(&self) -> usize {
        self.monitors().len()
    }

    /// Wait for every monitoring task still tracked. Tasks that finished
    /// before a later batch was applied have been dropped already.
    pub async fn wait_for_validations(&self) -> Vec<ValidationOutcome> {
        let handles: Vec<_> = self.monitors().drain(..).collect();
        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::error!(error = %e, "monitoring task panicked"),
            }
        }
        outcomes
    }

    /// Cancel in-flight monitoring. Applied strategies stay in place.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn fail(&self, operation: &mut EngineOperation, error: &str) {
        if let Err(e) = self.tracker.fail_operation(operation, error).await {
            tracing::error!(operation_id = %operation.id, error = %e, "operation failure not recorded");
        }
    }
}

fn counts(patterns: usize, strategies: usize, executed: usize) -> BTreeMap<String, f64> {
    let mut metrics = BTreeMap::new();
    metrics.insert("patternCount".to_string(), patterns as f64);
    metrics.insert("strategyCount".to_string(), strategies as f64);
    metrics.insert("executedCount".to_string(), executed as f64);
    metrics
}

/// Everything a monitoring task needs, detached from the orchestrator.
struct MonitorTask {
    storage: Arc<dyn AutotuneStorage>,
    executor: Arc<StrategyExecutor>,
    validator: Arc<ImpactValidator>,
    tracker: Arc<StateTracker>,
    metrics: Arc<EngineMetrics>,
    cancel: CancellationToken,
}

impl MonitorTask {
    async fn run(
        self,
        strategy: OptimizationStrategy,
        baseline: PerformanceMetrics,
    ) -> ValidationOutcome {
        let strategy_id = strategy.id.clone();
        let mut operation = match self.tracker.start_operation(OperationType::Validation).await {
            Ok(op) => Some(op),
            Err(e) => {
                tracing::warn!(strategy_id = %strategy_id, error = %e, "validation operation not tracked");
                None
            }
        };

        let outcome = match self.validator.monitor(&strategy, &baseline, &self.cancel).await {
            Ok(MonitorOutcome::Held { average, impact, .. }) => {
                self.metrics.record_validation(true);
                self.record_held(&strategy, baseline, average, impact.weighted_improvement)
                    .await;
                ValidationOutcome::Kept {
                    strategy_id: strategy_id.clone(),
                    weighted_improvement: impact.weighted_improvement,
                }
            }
            Ok(MonitorOutcome::Breached {
                metric,
                expected,
                observed,
                ..
            }) => {
                self.metrics.record_validation(false);
                let reason = format!("{metric} {observed:.3} outside expected {expected:.3}");
                self.roll_back(&strategy, reason).await
            }
            Ok(MonitorOutcome::Cancelled { .. }) => ValidationOutcome::Cancelled {
                strategy_id: strategy_id.clone(),
            },
            Err(e) => {
                self.metrics.record_validation(false);
                tracing::warn!(strategy_id = %strategy_id, error = %e, "monitoring failed");
                self.roll_back(&strategy, e.to_string()).await
            }
        };

        if let Some(op) = operation.as_mut() {
            let settled = match &outcome {
                ValidationOutcome::Cancelled { .. } => self.tracker.cancel_operation(op).await,
                ValidationOutcome::RollbackFailed { error, .. } => {
                    self.tracker.fail_operation(op, error.clone()).await
                }
                _ => self.tracker.complete_operation(op, BTreeMap::new()).await,
            };
            if let Err(e) = settled {
                tracing::warn!(strategy_id = %strategy_id, error = %e, "validation operation not settled");
            }
        }
        outcome
    }

    async fn roll_back(&self, strategy: &OptimizationStrategy, reason: String) -> ValidationOutcome {
        match self.executor.rollback(strategy).await {
            Ok(_) => {
                self.metrics.record_rollback();
                tracing::warn!(strategy_id = %strategy.id, reason = %reason, "strategy reverted after validation");
                ValidationOutcome::RolledBack {
                    strategy_id: strategy.id.clone(),
                    reason,
                }
            }
            Err(e) => {
                tracing::error!(strategy_id = %strategy.id, error = %e, "rollback failed");
                ValidationOutcome::RollbackFailed {
                    strategy_id: strategy.id.clone(),
                    error: e.to_string(),
                }
            }
        }
    }

    async fn record_held(
        &self,
        strategy: &OptimizationStrategy,
        before: PerformanceMetrics,
        after: PerformanceMetrics,
        improvement: f64,
    ) {
        let Some(result_id) = &strategy.learning_result_id else {
            return;
        };
        let annotation = PerformanceAnnotation::new(AnnotationKind::StrategyValidated, strategy.id.clone())
            .with_detail(format!("weighted improvement {improvement:.4}"));
        if let Err(e) = self.storage.append_annotation(result_id, annotation).await {
            tracing::warn!(strategy_id = %strategy.id, error = %e, "validation annotation not recorded");
        }
        let block = PerformanceBlock {
            before_metrics: before,
            after_metrics: after,
            improvement,
        };
        if let Err(e) = self.storage.set_performance(result_id, block).await {
            tracing::warn!(strategy_id = %strategy.id, error = %e, "performance block not recorded");
        }
    }
}
