use crate::detector::PatternDetector;
use crate::error::DetectorResult;
use async_trait::async_trait;
use autotune_types::{pattern_types, LearningEvent, LearningPattern};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;

const HOUR_MS: i64 = 3_600_000;

/// Buckets events into epoch-aligned one-hour windows and classifies each
/// window's numeric series.
///
/// A window is an ANOMALY when any value exceeds twice the mean, a TREND when
/// the last value exceeds the first by half, SEASONAL when the peak is above
/// 50, and TIME_BASED otherwise. The first matching test wins.
#[derive(Debug, Default)]
pub struct TimeWindowDetector;

impl TimeWindowDetector {
    pub const NAME: &'static str = "time_window";

    pub fn new() -> Self {
        Self
    }
}

/// Numeric reading of an event: first of `value`, `took`, `latency`.
fn event_value(event: &LearningEvent) -> Option<f64> {
    ["value", "took", "latency"]
        .iter()
        .find_map(|key| event.metadata_f64(key))
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct WindowStats {
    mean: f64,
    min: f64,
    max: f64,
    first: f64,
    last: f64,
}

impl WindowStats {
    /// `series` must be non-empty and in timestamp order.
    fn of(series: &[f64]) -> Option<Self> {
        let first = *series.first()?;
        let last = *series.last()?;
        let mean = series.iter().sum::<f64>() / series.len() as f64;
        let min = series.iter().copied().fold(f64::INFINITY, f64::min);
        let max = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            mean,
            min,
            max,
            first,
            last,
        })
    }

    fn classify(&self, series: &[f64]) -> (&'static str, f64) {
        if series.iter().any(|v| *v > 2.0 * self.mean) {
            (pattern_types::ANOMALY, 0.8)
        } else if self.last > self.first * 1.5 {
            (pattern_types::TREND, 0.7)
        } else if self.max > 50.0 {
            (pattern_types::SEASONAL, 0.6)
        } else {
            (pattern_types::TIME_BASED, 0.5)
        }
    }
}

#[async_trait]
impl PatternDetector for TimeWindowDetector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn analyze(&self, events: &[LearningEvent]) -> DetectorResult<Vec<LearningPattern>> {
        let mut windows: BTreeMap<i64, Vec<(DateTime<Utc>, f64)>> = BTreeMap::new();
        for event in events {
            if let Some(value) = event_value(event) {
                let bucket = event.timestamp.timestamp_millis().div_euclid(HOUR_MS);
                windows.entry(bucket).or_default().push((event.timestamp, value));
            }
        }

        let mut patterns = Vec::with_capacity(windows.len());
        for (bucket, mut points) in windows {
            points.sort_by_key(|(ts, _)| *ts);
            let series: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
            let Some(stats) = WindowStats::of(&series) else {
                continue;
            };
            let (pattern_type, confidence) = stats.classify(&series);
            let start = Utc.timestamp_millis_opt(bucket * HOUR_MS).single();
            let end = Utc.timestamp_millis_opt((bucket + 1) * HOUR_MS).single();

            let mut pattern = LearningPattern::new(pattern_type, confidence, Self::NAME)
                .with_feature("count", series.len() as u64)
                .with_feature("mean", stats.mean)
                .with_feature("min", stats.min)
                .with_feature("max", stats.max)
                .with_feature("first", stats.first)
                .with_feature("last", stats.last);
            if let (Some(start), Some(end)) = (start, end) {
                pattern = pattern
                    .with_feature("windowStart", start.to_rfc3339())
                    .with_feature("windowEnd", end.to_rfc3339());
            }
            patterns.push(pattern);
        }
        Ok(patterns)
    }
}
