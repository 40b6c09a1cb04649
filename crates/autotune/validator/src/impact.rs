//! Impact arithmetic shared by validation and monitoring.
//!
//! All ratios are relative to a baseline. A baseline of zero or below gives no
//! signal for that metric: the metric is reported as inconclusive and left out
//! instead of producing NaN or infinity.

use autotune_types::{pattern_types, LearningPattern, MetricKind, PerformanceMetrics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Factor used for a pattern-strength input the pattern does not carry.
pub const MISSING_FACTOR: f64 = 0.5;

/// Bound on the t-score when the deltas have no spread.
const T_SCORE_CAP: f64 = 50.0;

/// The four metrics an impact validation checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactMetric {
    Latency,
    Throughput,
    ErrorRate,
    ResourceUtilization,
}

impl ImpactMetric {
    pub const ALL: [ImpactMetric; 4] = [
        ImpactMetric::Latency,
        ImpactMetric::Throughput,
        ImpactMetric::ErrorRate,
        ImpactMetric::ResourceUtilization,
    ];

    pub fn lower_is_better(&self) -> bool {
        !matches!(self, Self::Throughput)
    }

    fn read(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            Self::Latency => metrics.latency,
            Self::Throughput => metrics.throughput,
            Self::ErrorRate => metrics.error_rate,
            Self::ResourceUtilization => metrics.resource_utilization(),
        }
    }

    fn read_pattern(&self, pattern: &LearningPattern) -> Option<f64> {
        match self {
            Self::Latency => pattern.metrics.latency,
            Self::Throughput => pattern.metrics.throughput,
            Self::ErrorRate => pattern.metrics.error_rate,
            Self::ResourceUtilization => pattern.metrics.resource_utilization,
        }
    }
}

impl fmt::Display for ImpactMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Latency => "latency",
            Self::Throughput => "throughput",
            Self::ErrorRate => "error_rate",
            Self::ResourceUtilization => "resource_utilization",
        };
        f.write_str(s)
    }
}

/// Relative improvement of `observed` over `baseline`, positive when better.
/// `None` when the baseline gives no signal.
pub fn oriented_improvement(baseline: f64, observed: f64, lower_is_better: bool) -> Option<f64> {
    if baseline.is_nan() || baseline <= 0.0 || !observed.is_finite() {
        return None;
    }
    let delta = if lower_is_better {
        (baseline - observed) / baseline
    } else {
        (observed - baseline) / baseline
    };
    Some(delta)
}

/// Product of the four strength factors, each in (0, 1].
///
/// A factor whose input is missing or not positive counts as
/// [`MISSING_FACTOR`], so the strength never reaches zero.
pub fn pattern_strength(pattern: &LearningPattern) -> f64 {
    let confidence = strength_factor(Some(pattern.confidence), |c| c);
    let relevant = strength_factor(pattern.feature_f64("relevantHits"), |hits| hits / 1000.0);
    let total = strength_factor(pattern.feature_f64("totalHits"), |hits| hits / 10_000.0);
    let speed = strength_factor(pattern.feature_f64("took"), |took| 1000.0 / took);
    confidence * relevant * total * speed
}

fn strength_factor(input: Option<f64>, f: impl FnOnce(f64) -> f64) -> f64 {
    match input {
        Some(v) if v > 0.0 && v.is_finite() => f(v).min(1.0),
        _ => MISSING_FACTOR,
    }
}

/// Prior success rate of strategies derived from a pattern type.
pub fn historical_success_rate(pattern_type: &str) -> f64 {
    match pattern_type {
        pattern_types::HIGH_RELEVANCE_SEARCH => 0.85,
        pattern_types::PERFORMANCE_OPTIMIZATION => 0.75,
        pattern_types::CACHE_HIT => 0.9,
        pattern_types::INDEX_USAGE => 0.8,
        _ => 0.7,
    }
}

pub fn confidence_multiplier(pattern: &LearningPattern) -> f64 {
    (pattern_strength(pattern) * historical_success_rate(&pattern.pattern_type)).min(1.0)
}

/// Projected improvement per metric: the improvement the pattern's own
/// observation shows over the baseline, scaled by the confidence multiplier.
///
/// A metric the pattern does not observe is projected to hold steady (0.0),
/// so a regression on it still fails validation. Only a baseline that is not
/// positive makes a metric `None`.
pub fn projected_impact(
    pattern: &LearningPattern,
    baseline: &PerformanceMetrics,
) -> BTreeMap<ImpactMetric, Option<f64>> {
    let multiplier = confidence_multiplier(pattern);
    ImpactMetric::ALL
        .iter()
        .map(|metric| {
            let base = metric.read(baseline);
            let projected = if base.is_nan() || base <= 0.0 {
                None
            } else {
                let observed = metric.read_pattern(pattern).and_then(|observed| {
                    oriented_improvement(base, observed, metric.lower_is_better())
                });
                Some(observed.map_or(0.0, |p| p * multiplier))
            };
            (*metric, projected)
        })
        .collect()
}

/// Improvement realized between two snapshots, per metric.
pub fn realized_impact(
    before: &PerformanceMetrics,
    after: &PerformanceMetrics,
) -> BTreeMap<ImpactMetric, Option<f64>> {
    ImpactMetric::ALL
        .iter()
        .map(|metric| {
            (
                *metric,
                oriented_improvement(metric.read(before), metric.read(after), metric.lower_is_better()),
            )
        })
        .collect()
}

/// Ratio of resource utilization after to before; 1.0 when either is not
/// positive.
pub fn load_factor(before: &PerformanceMetrics, after: &PerformanceMetrics) -> f64 {
    let (b, a) = (before.resource_utilization(), after.resource_utilization());
    if b > 0.0 && a > 0.0 {
        a / b
    } else {
        1.0
    }
}

pub fn metric_weight(kind: MetricKind) -> f64 {
    match kind {
        MetricKind::Latency => 0.4,
        MetricKind::Throughput => 0.3,
        MetricKind::ErrorRate => 0.2,
        MetricKind::CpuUsage => 0.05,
        MetricKind::MemoryUsage => 0.05,
    }
}

/// Before/after comparison of one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyImpact {
    /// Raw relative deltas `(after - before) / before`. Latency is unscaled;
    /// the other metrics are multiplied by the load factor. Inconclusive
    /// metrics are absent.
    pub improvements: BTreeMap<MetricKind, f64>,
    /// Weighted sum of the deltas oriented so that positive is better.
    pub weighted_improvement: f64,
    pub load_factor: f64,
    pub significance: f64,
    pub is_significant: bool,
}

pub fn calculate_strategy_impact(
    before: &PerformanceMetrics,
    after: &PerformanceMetrics,
    load_factor: f64,
    significance_threshold: f64,
) -> StrategyImpact {
    let mut improvements = BTreeMap::new();
    let mut deltas = Vec::with_capacity(MetricKind::ALL.len());
    let mut weighted_improvement = 0.0;

    for kind in MetricKind::ALL {
        let baseline = before.get(kind);
        if baseline.is_nan() || baseline <= 0.0 {
            continue;
        }
        let raw = (after.get(kind) - baseline) / baseline;
        let delta = if kind == MetricKind::Latency {
            raw
        } else {
            raw * load_factor
        };
        if !delta.is_finite() {
            continue;
        }
        let better = if kind.lower_is_better() { -delta } else { delta };
        improvements.insert(kind, delta);
        deltas.push(delta);
        weighted_improvement += metric_weight(kind) * better;
    }

    let significance = significance(&deltas);
    StrategyImpact {
        improvements,
        weighted_improvement,
        load_factor,
        significance,
        is_significant: significance > significance_threshold,
    }
}

/// `1 / (1 + e^(t - ln n))` for the one-sample t-score of the raw `deltas`
/// against zero. Empty input has no significance.
pub fn significance(deltas: &[f64]) -> f64 {
    let n = deltas.len();
    if n == 0 {
        return 0.0;
    }
    let count = n as f64;
    let mean = deltas.iter().sum::<f64>() / count;
    let variance = if n > 1 {
        deltas.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (count - 1.0)
    } else {
        0.0
    };
    let sd = variance.sqrt();
    let t = if sd > 0.0 {
        (mean / (sd / count.sqrt())).clamp(-T_SCORE_CAP, T_SCORE_CAP)
    } else if mean > 0.0 {
        T_SCORE_CAP
    } else if mean < 0.0 {
        -T_SCORE_CAP
    } else {
        0.0
    };
    1.0 / (1.0 + (t - count.ln()).exp())
}
