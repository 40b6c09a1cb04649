//! Property tests: impact arithmetic.
//!
//! Pattern strength is a product in (0, 1], latency deltas ignore the
//! load factor while the other metrics scale with it, and no input produces
//! NaN in a reported figure.

use autotune_types::{pattern_types, LearningPattern, MetricKind, PerformanceMetrics};
use autotune_validator::{
    calculate_strategy_impact, confidence_multiplier, expected_value, load_factor,
    pattern_strength, realized_impact, significance, within_tolerance, ImpactMetric,
};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn arb_metrics() -> impl Strategy<Value = PerformanceMetrics> {
    (
        1.0f64..2_000.0,
        1.0f64..10_000.0,
        0.001f64..0.5,
        0.01f64..1.0,
        0.01f64..1.0,
    )
        .prop_map(|(latency, throughput, error_rate, cpu, mem)| {
            PerformanceMetrics::new(latency, throughput, error_rate).with_resources(cpu, mem)
        })
}

fn arb_pattern() -> impl Strategy<Value = LearningPattern> {
    (
        0.01f64..=1.0,
        prop::option::of(0.0f64..5_000.0),
        prop::option::of(0.0f64..50_000.0),
        prop::option::of(0.0f64..5_000.0),
    )
        .prop_map(|(confidence, relevant, total, took)| {
            let mut p = LearningPattern::new(pattern_types::HIGH_RELEVANCE_SEARCH, confidence, "test");
            if let Some(v) = relevant {
                p = p.with_feature("relevantHits", v);
            }
            if let Some(v) = total {
                p = p.with_feature("totalHits", v);
            }
            if let Some(v) = took {
                p = p.with_feature("took", v);
            }
            p
        })
}

fn arb_kind() -> impl Strategy<Value = MetricKind> {
    prop_oneof![
        Just(MetricKind::Latency),
        Just(MetricKind::Throughput),
        Just(MetricKind::ErrorRate),
        Just(MetricKind::CpuUsage),
        Just(MetricKind::MemoryUsage),
    ]
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Strength is strictly positive and never above one, even for zero hit
    /// counts; the confidence multiplier stays inside the unit interval.
    #[test]
    fn strength_is_bounded(pattern in arb_pattern()) {
        let strength = pattern_strength(&pattern);
        prop_assert!(strength > 0.0 && strength <= 1.0);
        prop_assert!(strength <= pattern.confidence);
        let multiplier = confidence_multiplier(&pattern);
        prop_assert!((0.0..=1.0).contains(&multiplier));
    }

    /// Latency is compared raw; every other metric is scaled by the load factor.
    #[test]
    fn only_non_latency_metrics_scale_with_load(before in arb_metrics(), after in arb_metrics(), load in 0.1f64..10.0) {
        let unit = calculate_strategy_impact(&before, &after, 1.0, 0.95);
        let scaled = calculate_strategy_impact(&before, &after, load, 0.95);

        let latency = (after.latency - before.latency) / before.latency;
        prop_assert!((scaled.improvements[&MetricKind::Latency] - latency).abs() < 1e-12);
        prop_assert_eq!(
            unit.improvements[&MetricKind::Latency],
            scaled.improvements[&MetricKind::Latency]
        );
        for kind in [MetricKind::Throughput, MetricKind::ErrorRate, MetricKind::CpuUsage, MetricKind::MemoryUsage] {
            let expected = unit.improvements[&kind] * load;
            prop_assert!((scaled.improvements[&kind] - expected).abs() <= 1e-9 * expected.abs().max(1.0));
        }
    }

    /// Reported figures are always finite and significance is a probability.
    #[test]
    fn impact_is_finite(before in arb_metrics(), after in arb_metrics()) {
        let impact = calculate_strategy_impact(&before, &after, load_factor(&before, &after), 0.95);
        prop_assert!(impact.weighted_improvement.is_finite());
        prop_assert!((0.0..=1.0).contains(&impact.significance));
        prop_assert_eq!(impact.is_significant, impact.significance > 0.95);
        prop_assert!(impact.improvements.values().all(|d| d.is_finite()));
    }

    /// Realized improvement is positive exactly when the metric moved the
    /// right way.
    #[test]
    fn realized_improvement_is_oriented(before in arb_metrics(), after in arb_metrics()) {
        let realized = realized_impact(&before, &after);
        let latency = realized[&ImpactMetric::Latency].unwrap();
        prop_assert_eq!(latency > 0.0, after.latency < before.latency);
        let throughput = realized[&ImpactMetric::Throughput].unwrap();
        prop_assert_eq!(throughput > 0.0, after.throughput > before.throughput);
    }

    /// Non-positive baselines are inconclusive, never NaN.
    #[test]
    fn zero_baseline_is_inconclusive(after in arb_metrics()) {
        let before = PerformanceMetrics::new(0.0, 0.0, 0.0);
        let realized = realized_impact(&before, &after);
        prop_assert!(realized[&ImpactMetric::Latency].is_none());
        prop_assert!(realized[&ImpactMetric::Throughput].is_none());
        let impact = calculate_strategy_impact(&before, &after, 1.0, 0.95);
        prop_assert!(!impact.improvements.contains_key(&MetricKind::Latency));
        prop_assert!(impact.weighted_improvement.is_finite());
    }

    /// Hitting the promised value always passes; missing it by more than the
    /// tolerance always fails.
    #[test]
    fn tolerance_band(kind in arb_kind(), baseline in 1.0f64..1_000.0, improvement in 0.0f64..0.5, tolerance in 1.0f64..1.5) {
        let expected = expected_value(kind, baseline, improvement);
        prop_assert!(within_tolerance(kind, expected, expected, tolerance));
        let outside = if kind.lower_is_better() {
            expected * tolerance * 1.01 + 1e-9
        } else {
            expected / tolerance / 1.01 - 1e-9
        };
        prop_assert!(!within_tolerance(kind, expected, outside, tolerance));
    }

    /// Significance never leaves [0, 1] whatever the deltas.
    #[test]
    fn significance_is_bounded(deltas in prop::collection::vec(-10.0f64..10.0, 0..20)) {
        let s = significance(&deltas);
        prop_assert!((0.0..=1.0).contains(&s));
    }
}

#[test]
fn worked_example_under_light_load() {
    let before = PerformanceMetrics::new(100.0, 1_000.0, 0.05);
    let after = PerformanceMetrics::new(80.0, 1_200.0, 0.03);
    let impact = calculate_strategy_impact(&before, &after, 0.8, 0.95);
    assert!((impact.improvements[&MetricKind::Latency] + 0.2).abs() < 1e-9);
    assert!((impact.improvements[&MetricKind::Throughput] - 0.16).abs() < 1e-9);
    assert!((impact.improvements[&MetricKind::ErrorRate] + 0.32).abs() < 1e-9);
    let weighted = 0.4 * 0.2 + 0.3 * 0.16 + 0.2 * 0.32;
    assert!((impact.weighted_improvement - weighted).abs() < 1e-9);
    assert_eq!(impact.load_factor, 0.8);

    // 1 / (1 + e^(t - ln 3)) over the raw deltas, t about -0.832
    assert!((impact.significance - 0.8733).abs() < 1e-3);
    assert!(!impact.is_significant);
}

proptest! {
    /// Significance falls as the deltas move up together: shifting every
    /// delta by a positive amount never raises it.
    #[test]
    fn significance_decreases_with_the_mean(
        deltas in prop::collection::vec(-1.0f64..1.0, 2..10),
        shift in 0.0f64..1.0,
    ) {
        let shifted: Vec<f64> = deltas.iter().map(|d| d + shift).collect();
        prop_assert!(significance(&shifted) <= significance(&deltas) + 1e-12);
    }
}
