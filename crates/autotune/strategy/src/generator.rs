use autotune_types::{
    pattern_types, LearningPattern, MetricKind, OptimizationStrategy, RiskLevel, StrategyAction,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

/// Thresholds that decide which follow-up strategies a relevant search gets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorRules {
    /// Searches faster than this get query transformation.
    pub fast_took_ms: f64,
    /// Searches slower than this get index optimization.
    pub slow_took_ms: f64,
    /// Result sets larger than this get caching.
    pub cache_total_hits: f64,
}

impl Default for GeneratorRules {
    fn default() -> Self {
        Self {
            fast_took_ms: 100.0,
            slow_took_ms: 500.0,
            cache_total_hits: 1000.0,
        }
    }
}

/// Pure mapping from a pattern to candidate strategies.
#[derive(Debug, Clone, Default)]
pub struct StrategyGenerator {
    rules: GeneratorRules,
}

impl StrategyGenerator {
    pub const WEIGHT_IMPROVEMENT: f64 = 0.15;
    pub const TAG_FACTOR: f64 = 1.1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(mut self, rules: GeneratorRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn generate(&self, pattern: &LearningPattern) -> Vec<OptimizationStrategy> {
        let strategies = match pattern.pattern_type.as_str() {
            pattern_types::HIGH_RELEVANCE_SEARCH => self.for_relevant_search(pattern),
            pattern_types::USER_FEEDBACK => self.for_feedback(pattern),
            other => {
                tracing::trace!(pattern_type = other, "no strategy rule for pattern type");
                Vec::new()
            }
        };
        strategies
            .into_iter()
            .map(|s| s.with_pattern(pattern.id.clone()))
            .collect()
    }

    /// Generate for every pattern, keeping pattern order.
    pub fn generate_all(&self, patterns: &[LearningPattern]) -> Vec<OptimizationStrategy> {
        patterns.iter().flat_map(|p| self.generate(p)).collect()
    }

    fn for_relevant_search(&self, pattern: &LearningPattern) -> Vec<OptimizationStrategy> {
        let c = pattern.confidence;
        let search_pattern = search_pattern_of(pattern);
        let mut out = Vec::with_capacity(4);

        out.push(
            OptimizationStrategy::new(
                StrategyAction::WeightAdjustment {
                    title_factor: 1.0 + Self::WEIGHT_IMPROVEMENT,
                    tag_factor: Self::TAG_FACTOR,
                },
                RiskLevel::Low,
                Self::WEIGHT_IMPROVEMENT,
            )
            .with_priority(c)
            .with_impact(c)
            .with_confidence(c)
            .with_target_metrics([MetricKind::Latency])
            .with_search_pattern(search_pattern.clone()),
        );

        if let Some(took) = pattern.feature_f64("took") {
            if took < self.rules.fast_took_ms {
                out.push(
                    OptimizationStrategy::new(
                        StrategyAction::QueryTransformation {
                            rules: vec!["expand_synonyms".into(), "boost_exact_match".into()],
                        },
                        RiskLevel::Low,
                        0.2,
                    )
                    .with_priority(c * 0.95)
                    .with_impact(c * 0.95)
                    .with_confidence(c)
                    .with_target_metrics([MetricKind::Latency, MetricKind::Throughput])
                    .with_search_pattern(search_pattern.clone()),
                );
            } else if took > self.rules.slow_took_ms {
                let mut settings = BTreeMap::new();
                settings.insert("refresh_interval".to_string(), json!("30s"));
                settings.insert("merge_factor".to_string(), json!(10));
                out.push(
                    OptimizationStrategy::new(
                        StrategyAction::IndexOptimization { settings },
                        RiskLevel::Medium,
                        0.4,
                    )
                    .with_priority(c * 0.85)
                    .with_impact(c * 0.85)
                    .with_confidence(c * 0.9)
                    .with_target_metrics([MetricKind::Latency, MetricKind::CpuUsage])
                    .with_search_pattern(search_pattern.clone()),
                );
            }
        }

        if pattern
            .feature_f64("totalHits")
            .is_some_and(|hits| hits > self.rules.cache_total_hits)
        {
            out.push(
                OptimizationStrategy::new(
                    StrategyAction::CacheStrategy { ttl_secs: 300 },
                    RiskLevel::Low,
                    0.3,
                )
                .with_priority(c * 0.9)
                .with_impact(c * 0.9)
                .with_confidence(c)
                .with_target_metrics([MetricKind::Latency, MetricKind::Throughput])
                .with_search_pattern(search_pattern),
            );
        }
        out
    }

    /// Feedback loops change ranking from user signals, so they are always
    /// proposed at MEDIUM risk and never pass the autonomous gate.
    fn for_feedback(&self, pattern: &LearningPattern) -> Vec<OptimizationStrategy> {
        let c = pattern.confidence;
        let rule = match pattern.feature_str("feedbackType") {
            Some(kind) => format!("boost_on_{kind}"),
            None => return Vec::new(),
        };
        vec![OptimizationStrategy::new(
            StrategyAction::FeedbackLoop { rules: vec![rule] },
            RiskLevel::Medium,
            0.1,
        )
        .with_priority(c * 0.8)
        .with_impact(c * 0.8)
        .with_confidence(c)
        .with_target_metrics([MetricKind::Throughput])
        .with_search_pattern(search_pattern_of(pattern))]
    }
}

fn search_pattern_of(pattern: &LearningPattern) -> Option<String> {
    pattern
        .feature_str("searchPattern")
        .or_else(|| pattern.feature_str("searchType"))
        .map(str::to_string)
}
