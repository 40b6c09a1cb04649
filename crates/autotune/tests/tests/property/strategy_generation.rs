//! Property tests: strategy generation and the autonomy gate.
//!
//! Every relevance pattern yields a LOW risk weight adjustment mirroring its
//! confidence; the extra strategies follow the search's speed and size; the
//! gate's thresholds are strict.

use autotune_detectors::{PatternDetector, SearchRelevanceDetector};
use autotune_strategy::{AutonomyGate, StrategyGenerator};
use autotune_tests::search;
use autotune_types::{
    pattern_types, LearningPattern, OptimizationStrategy, RiskLevel, StrategyAction, StrategyKind,
};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn arb_relevance_pattern() -> impl Strategy<Value = LearningPattern> {
    (
        0.81f64..=1.0,
        prop::option::of(1.0f64..2_000.0),
        prop::option::of(1.0f64..20_000.0),
    )
        .prop_map(|(confidence, took, total)| {
            let mut p = LearningPattern::new(
                pattern_types::HIGH_RELEVANCE_SEARCH,
                confidence,
                "search_relevance",
            );
            if let Some(took) = took {
                p = p.with_feature("took", took);
            }
            if let Some(total) = total {
                p = p.with_feature("totalHits", total);
            }
            p
        })
}

fn arb_risk() -> impl Strategy<Value = RiskLevel> {
    prop_oneof![
        Just(RiskLevel::Low),
        Just(RiskLevel::Medium),
        Just(RiskLevel::High),
        Just(RiskLevel::Critical),
    ]
}

fn arb_strategy() -> impl Strategy<Value = OptimizationStrategy> {
    (0.0f64..=1.0, 0.0f64..=1.0, arb_risk()).prop_map(|(confidence, impact, risk)| {
        OptimizationStrategy::new(StrategyAction::CacheStrategy { ttl_secs: 300 }, risk, 0.3)
            .with_confidence(confidence)
            .with_impact(impact)
    })
}

fn has(strategies: &[OptimizationStrategy], kind: StrategyKind) -> bool {
    strategies.iter().any(|s| s.kind() == kind)
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// The weight adjustment always leads and mirrors the pattern confidence.
    #[test]
    fn weight_adjustment_leads(pattern in arb_relevance_pattern()) {
        let strategies = StrategyGenerator::new().generate(&pattern);
        let first = &strategies[0];
        prop_assert_eq!(first.kind(), StrategyKind::WeightAdjustment);
        prop_assert_eq!(first.risk_level(), RiskLevel::Low);
        prop_assert_eq!(first.priority, pattern.confidence);
        prop_assert_eq!(first.impact, pattern.confidence);
        prop_assert_eq!(first.confidence, pattern.confidence);
    }

    /// Speed and size decide the follow-up strategies.
    #[test]
    fn follow_ups_track_speed_and_size(pattern in arb_relevance_pattern()) {
        let strategies = StrategyGenerator::new().generate(&pattern);
        let took = pattern.feature_f64("took");
        let total = pattern.feature_f64("totalHits");

        prop_assert_eq!(
            has(&strategies, StrategyKind::QueryTransformation),
            took.is_some_and(|t| t < 100.0)
        );
        prop_assert_eq!(
            has(&strategies, StrategyKind::IndexOptimization),
            took.is_some_and(|t| t > 500.0)
        );
        prop_assert_eq!(
            has(&strategies, StrategyKind::CacheStrategy),
            total.is_some_and(|t| t > 1_000.0)
        );
    }

    /// Every strategy points back at its pattern and never outranks it.
    #[test]
    fn strategies_reference_their_pattern(pattern in arb_relevance_pattern()) {
        for s in StrategyGenerator::new().generate(&pattern) {
            prop_assert_eq!(s.pattern_id.as_ref(), Some(&pattern.id));
            prop_assert!(s.priority <= pattern.confidence);
            prop_assert!(s.risk_level() <= RiskLevel::Medium);
        }
    }

    /// Admission is exactly the conjunction of three strict checks.
    #[test]
    fn gate_is_strict(strategy in arb_strategy(), min_confidence in 0.0f64..1.0, min_impact in 0.0f64..1.0, max_risk in arb_risk()) {
        let gate = AutonomyGate::new()
            .with_min_confidence(min_confidence)
            .with_min_impact(min_impact)
            .with_max_risk(max_risk);
        let expected = strategy.confidence > min_confidence
            && strategy.impact > min_impact
            && strategy.risk_level() <= max_risk;
        prop_assert_eq!(gate.admits(&strategy), expected);

        let at_threshold = strategy.clone().with_confidence(min_confidence);
        prop_assert!(!gate.admits(&at_threshold));
    }

    /// Ranking keeps only admitted strategies, highest priority first.
    #[test]
    fn rank_orders_admitted(strategies in prop::collection::vec(arb_strategy(), 0..12), priorities in prop::collection::vec(0.0f64..1.0, 12)) {
        let strategies: Vec<_> = strategies
            .into_iter()
            .zip(priorities)
            .map(|(s, p)| s.with_priority(p))
            .collect();
        let gate = AutonomyGate::new();
        let ranked = gate.rank(&strategies);
        prop_assert_eq!(ranked.len(), gate.filter(&strategies).len());
        prop_assert!(ranked.iter().all(|s| gate.admits(s)));
        prop_assert!(ranked.windows(2).all(|w| w[0].priority >= w[1].priority));
    }

    /// A search is a relevance pattern exactly when its ratio exceeds 0.8.
    #[test]
    fn detector_threshold(total in 1u32..5_000, share in 0.0f64..=1.0, took in 1u32..1_000) {
        let relevant = (f64::from(total) * share).floor() as u32;
        let event = search(relevant, total, took);
        let rt = tokio::runtime::Runtime::new().unwrap();
        let patterns = rt
            .block_on(SearchRelevanceDetector::new().analyze(std::slice::from_ref(&event)))
            .unwrap();
        let ratio = f64::from(relevant) / f64::from(total);
        prop_assert_eq!(patterns.len(), usize::from(ratio > 0.8));
        if let Some(p) = patterns.first() {
            prop_assert!((p.confidence - ratio).abs() < 1e-12);
            prop_assert!(p.confidence > 0.8 && p.confidence <= 1.0);
        }
    }
}
