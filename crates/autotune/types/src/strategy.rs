use crate::clamp_unit;
use crate::ids::{LearningResultId, PatternId, StrategyId};
use crate::metrics::MetricKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Coarse classification gating autonomous execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Discriminant of [`StrategyAction`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyKind {
    WeightAdjustment,
    QueryTransformation,
    IndexOptimization,
    CacheStrategy,
    FeedbackLoop,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::WeightAdjustment => "WEIGHT_ADJUSTMENT",
            Self::QueryTransformation => "QUERY_TRANSFORMATION",
            Self::IndexOptimization => "INDEX_OPTIMIZATION",
            Self::CacheStrategy => "CACHE_STRATEGY",
            Self::FeedbackLoop => "FEEDBACK_LOOP",
        };
        f.write_str(s)
    }
}

/// The concrete configuration change a strategy proposes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyAction {
    /// Multiply the title and tag field boosts; content is left unchanged.
    WeightAdjustment { title_factor: f64, tag_factor: f64 },
    /// Install query rewriting rules for a search pattern.
    QueryTransformation { rules: Vec<String> },
    /// Apply index settings for a search pattern.
    IndexOptimization { settings: BTreeMap<String, Value> },
    /// Cache results of a search pattern.
    CacheStrategy { ttl_secs: u64 },
    /// Route feedback for a search pattern back into ranking.
    FeedbackLoop { rules: Vec<String> },
}

impl StrategyAction {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::WeightAdjustment { .. } => StrategyKind::WeightAdjustment,
            Self::QueryTransformation { .. } => StrategyKind::QueryTransformation,
            Self::IndexOptimization { .. } => StrategyKind::IndexOptimization,
            Self::CacheStrategy { .. } => StrategyKind::CacheStrategy,
            Self::FeedbackLoop { .. } => StrategyKind::FeedbackLoop,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyMetadata {
    pub target_metrics: Vec<MetricKind>,
    pub expected_improvement: f64,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_pattern: Option<String>,
}

/// A proposed, typed configuration change derived from a pattern.
///
/// Immutable after generation except for [`attach_to`](Self::attach_to),
/// which links it to the learning result that owns it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationStrategy {
    pub id: StrategyId,
    pub action: StrategyAction,
    pub priority: f64,
    pub confidence: f64,
    pub impact: f64,
    pub metadata: StrategyMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_result_id: Option<LearningResultId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_id: Option<PatternId>,
}

impl OptimizationStrategy {
    pub fn new(action: StrategyAction, risk_level: RiskLevel, expected_improvement: f64) -> Self {
        Self {
            id: StrategyId::generate(),
            action,
            priority: 0.0,
            confidence: 0.0,
            impact: 0.0,
            metadata: StrategyMetadata {
                target_metrics: Vec::new(),
                expected_improvement,
                risk_level,
                dependencies: Vec::new(),
                search_pattern: None,
            },
            learning_result_id: None,
            pattern_id: None,
        }
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = clamp_unit(priority);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_unit(confidence);
        self
    }

    pub fn with_impact(mut self, impact: f64) -> Self {
        self.impact = clamp_unit(impact);
        self
    }

    pub fn with_target_metrics(mut self, metrics: impl IntoIterator<Item = MetricKind>) -> Self {
        self.metadata.target_metrics = metrics.into_iter().collect();
        self
    }

    pub fn with_search_pattern(mut self, pattern: Option<String>) -> Self {
        self.metadata.search_pattern = pattern;
        self
    }

    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.metadata.dependencies.push(dependency.into());
        self
    }

    pub fn with_pattern(mut self, pattern_id: PatternId) -> Self {
        self.pattern_id = Some(pattern_id);
        self
    }

    pub fn attach_to(&mut self, result_id: LearningResultId) {
        self.learning_result_id = Some(result_id);
    }

    pub fn kind(&self) -> StrategyKind {
        self.action.kind()
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.metadata.risk_level
    }
}
