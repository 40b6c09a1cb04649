use crate::error::{ValidatorError, ValidatorResult};
use crate::impact::{
    calculate_strategy_impact, confidence_multiplier, load_factor, projected_impact,
    realized_impact, ImpactMetric, StrategyImpact,
};
use crate::registry::{ValidationContext, ValidationPhase, ValidationRegistry};
use crate::settings::ValidationSettings;
use autotune_metrics::{MetricRecord, MetricsProvider};
use autotune_types::{
    LearningPattern, MetadataMap, MetricKind, OptimizationStrategy, PerformanceMetrics, StrategyId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of one metric in an impact validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricCheck {
    pub metric: ImpactMetric,
    pub projected: Option<f64>,
    pub realized: Option<f64>,
    /// Minimum realized improvement, `realized_fraction` of the projection.
    pub required: Option<f64>,
    pub passed: bool,
}

impl MetricCheck {
    /// A metric whose baseline gives no signal is inconclusive and does not
    /// fail the validation.
    pub fn is_inconclusive(&self) -> bool {
        self.required.is_none() || self.realized.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub strategy_id: StrategyId,
    pub baseline: PerformanceMetrics,
    pub observed: PerformanceMetrics,
    pub confidence_multiplier: f64,
    pub checks: Vec<MetricCheck>,
    pub impact: StrategyImpact,
}

impl ImpactReport {
    pub fn is_valid(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &MetricCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// Result of watching a strategy across one monitoring window.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorOutcome {
    /// Every target metric's average stayed inside the tolerance band.
    Held {
        samples: usize,
        average: PerformanceMetrics,
        impact: StrategyImpact,
    },
    /// A target metric's average left the band.
    Breached {
        metric: MetricKind,
        expected: f64,
        observed: f64,
        average: PerformanceMetrics,
    },
    /// The window was cancelled before it closed.
    Cancelled { samples: usize },
}

impl MonitorOutcome {
    pub fn held(&self) -> bool {
        matches!(self, Self::Held { .. })
    }
}

/// Value a target metric should reach if the strategy delivers its expected
/// improvement.
pub fn expected_value(kind: MetricKind, baseline: f64, expected_improvement: f64) -> f64 {
    if kind.lower_is_better() {
        baseline * (1.0 - expected_improvement)
    } else {
        baseline * (1.0 + expected_improvement)
    }
}

/// Whether `observed` lies inside the band around `expected`.
pub fn within_tolerance(kind: MetricKind, expected: f64, observed: f64, tolerance: f64) -> bool {
    if kind.lower_is_better() {
        observed <= expected * tolerance
    } else {
        observed >= expected / tolerance
    }
}

/// Compares live metrics against what a strategy promised.
pub struct ImpactValidator {
    metrics: Arc<dyn MetricsProvider>,
    settings: ValidationSettings,
    registry: Arc<ValidationRegistry>,
}

impl ImpactValidator {
    pub fn new(metrics: Arc<dyn MetricsProvider>) -> Self {
        Self {
            metrics,
            settings: ValidationSettings::default(),
            registry: Arc::new(ValidationRegistry::new()),
        }
    }

    pub fn with_settings(mut self, settings: ValidationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_registry(mut self, registry: Arc<ValidationRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn settings(&self) -> &ValidationSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ValidationRegistry> {
        &self.registry
    }

    pub async fn snapshot(&self) -> ValidatorResult<PerformanceMetrics> {
        Ok(self.metrics.collect_snapshot().await?)
    }

    /// Measure a baseline, wait one validation window, then require every
    /// metric to realize at least `realized_fraction` of its projection.
    pub async fn validate_impact(
        &self,
        strategy: &OptimizationStrategy,
        pattern: &LearningPattern,
    ) -> ValidatorResult<ImpactReport> {
        let guard = self.registry.begin(ValidationContext::new(
            strategy.id.clone(),
            strategy.kind(),
            ValidationPhase::Impact,
        ));

        let baseline = self.snapshot().await?;
        let projected = projected_impact(pattern, &baseline);
        guard.set_baseline(baseline);
        guard.set_projected(projected.clone());
        if let Some(search_id) = pattern.feature_str("searchId") {
            guard.sample_query(search_id);
        }
        tokio::time::sleep(self.settings.window()).await;
        let observed = self.snapshot().await?;
        let realized = realized_impact(&baseline, &observed);

        let checks = ImpactMetric::ALL
            .iter()
            .map(|metric| {
                let projected = projected.get(metric).copied().flatten();
                let realized = realized.get(metric).copied().flatten();
                let required = projected.map(|p| p * self.settings.realized_fraction);
                let passed = match (realized, required) {
                    (Some(r), Some(req)) => r >= req,
                    _ => true,
                };
                MetricCheck {
                    metric: *metric,
                    projected,
                    realized,
                    required,
                    passed,
                }
            })
            .collect();

        let impact = calculate_strategy_impact(
            &baseline,
            &observed,
            load_factor(&baseline, &observed),
            self.settings.significance_threshold,
        );
        let report = ImpactReport {
            strategy_id: strategy.id.clone(),
            baseline,
            observed,
            confidence_multiplier: confidence_multiplier(pattern),
            checks,
            impact,
        };

        if report.is_valid() {
            tracing::info!(
                strategy_id = %strategy.id,
                weighted_improvement = report.impact.weighted_improvement,
                significance = report.impact.significance,
                "impact validated"
            );
        } else {
            let failed: Vec<String> = report.failed().map(|c| c.metric.to_string()).collect();
            tracing::warn!(
                strategy_id = %strategy.id,
                failed = ?failed,
                "impact below projection"
            );
        }
        self.record(strategy, &report.impact).await;
        Ok(report)
    }

    /// Sample every `sample_interval_ms` across the window and compare the
    /// average of each target metric with the value the strategy promised.
    pub async fn monitor(
        &self,
        strategy: &OptimizationStrategy,
        baseline: &PerformanceMetrics,
        cancel: &CancellationToken,
    ) -> ValidatorResult<MonitorOutcome> {
        let _guard = self.registry.begin(
            ValidationContext::new(strategy.id.clone(), strategy.kind(), ValidationPhase::Monitor)
                .with_baseline(*baseline),
        );

        let ticks = self.settings.samples_per_window();
        let interval = self.settings.sample_interval();
        let mut samples = Vec::with_capacity(ticks as usize);
        for _ in 0..ticks {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(strategy_id = %strategy.id, samples = samples.len(), "monitoring cancelled");
                    return Ok(MonitorOutcome::Cancelled { samples: samples.len() });
                }
                _ = tokio::time::sleep(interval) => {}
            }
            samples.push(self.snapshot().await?);
        }

        let average = PerformanceMetrics::average(&samples).ok_or_else(|| {
            ValidatorError::InvalidSettings("monitoring window produced no samples".to_string())
        })?;

        let targets: Vec<MetricKind> = if strategy.metadata.target_metrics.is_empty() {
            vec![MetricKind::Latency]
        } else {
            strategy.metadata.target_metrics.clone()
        };
        let improvement = strategy.metadata.expected_improvement;
        for kind in targets {
            let base = baseline.get(kind);
            if base.is_nan() || base <= 0.0 {
                tracing::debug!(strategy_id = %strategy.id, metric = %kind, "no baseline for metric");
                continue;
            }
            let expected = expected_value(kind, base, improvement);
            let observed = average.get(kind);
            if !within_tolerance(kind, expected, observed, self.settings.monitor_tolerance) {
                tracing::warn!(
                    strategy_id = %strategy.id,
                    metric = %kind,
                    expected,
                    observed,
                    "monitored metric outside tolerance"
                );
                return Ok(MonitorOutcome::Breached {
                    metric: kind,
                    expected,
                    observed,
                    average,
                });
            }
        }

        let impact = calculate_strategy_impact(
            baseline,
            &average,
            load_factor(baseline, &average),
            self.settings.significance_threshold,
        );
        tracing::info!(
            strategy_id = %strategy.id,
            samples = samples.len(),
            weighted_improvement = impact.weighted_improvement,
            "strategy held through monitoring window"
        );
        self.record(strategy, &impact).await;
        Ok(MonitorOutcome::Held {
            samples: samples.len(),
            average,
            impact,
        })
    }

    async fn record(&self, strategy: &OptimizationStrategy, impact: &StrategyImpact) {
        let mut metadata = MetadataMap::new();
        metadata.insert("strategyId".into(), strategy.id.as_str().into());
        metadata.insert("strategyType".into(), strategy.kind().to_string().into());
        let record = MetricRecord::new("strategy_impact", impact.weighted_improvement, impact.significance)
            .with_metadata(metadata);
        if let Err(e) = self.metrics.record_metric(record).await {
            tracing::warn!(strategy_id = %strategy.id, error = %e, "failed to record strategy impact");
        }
    }
}
