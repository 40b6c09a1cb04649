use crate::detector::PatternDetector;
use crate::error::DetectorResult;
use async_trait::async_trait;
use autotune_types::{pattern_types, LearningEvent, LearningEventType, LearningPattern, PatternMetrics};
use std::collections::BTreeMap;

/// Groups threshold and system-state samples by metric name and reports
/// whether the latest sample of each group breached its threshold.
#[derive(Debug, Default)]
pub struct PerformanceDetector;

impl PerformanceDetector {
    pub const NAME: &'static str = "performance";

    pub fn new() -> Self {
        Self
    }
}

struct Sample<'a> {
    event: &'a LearningEvent,
    value: f64,
}

fn confidence_for(value: f64, threshold: f64, exceeded: bool) -> f64 {
    if !exceeded {
        return 0.3;
    }
    let severity = if threshold > 0.0 {
        ((value - threshold) / threshold).min(1.0)
    } else {
        1.0
    };
    0.5 + 0.5 * severity
}

fn metrics_for(metric_name: &str, value: f64) -> PatternMetrics {
    let mut metrics = PatternMetrics::default();
    match metric_name {
        "latency" => metrics.latency = Some(value),
        "throughput" => metrics.throughput = Some(value),
        "error_rate" | "errorRate" => metrics.error_rate = Some(value),
        "resource_utilization" | "resourceUtilization" => {
            metrics.resource_utilization = Some(value)
        }
        _ => {}
    }
    metrics
}

#[async_trait]
impl PatternDetector for PerformanceDetector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn analyze(&self, events: &[LearningEvent]) -> DetectorResult<Vec<LearningPattern>> {
        let mut groups: BTreeMap<&str, Vec<Sample<'_>>> = BTreeMap::new();
        for event in events.iter().filter(|e| {
            matches!(
                e.event_type,
                LearningEventType::MetricThreshold | LearningEventType::SystemState
            )
        }) {
            let (Some(name), Some(value)) =
                (event.metadata_str("metricName"), event.metadata_f64("value"))
            else {
                continue;
            };
            groups.entry(name).or_default().push(Sample { event, value });
        }

        let mut patterns = Vec::new();
        for (metric_name, samples) in groups {
            let Some(latest) = samples.iter().max_by_key(|s| s.event.timestamp) else {
                continue;
            };
            let Some(threshold) = latest.event.metadata_f64("threshold") else {
                tracing::debug!(metric = metric_name, "latest sample has no threshold");
                continue;
            };
            let exceeded = latest.value > threshold;
            patterns.push(
                LearningPattern::new(
                    pattern_types::PERFORMANCE_OPTIMIZATION,
                    confidence_for(latest.value, threshold, exceeded),
                    Self::NAME,
                )
                .with_feature("metricName", metric_name)
                .with_feature("value", latest.value)
                .with_feature("threshold", threshold)
                .with_feature("exceeded", exceeded)
                .with_feature("samples", samples.len() as u64)
                .with_metrics(metrics_for(metric_name, latest.value)),
            );
        }
        Ok(patterns)
    }
}
