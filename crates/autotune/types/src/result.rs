use crate::clamp_unit;
use crate::ids::{LearningResultId, StrategyId};
use crate::metrics::PerformanceMetrics;
use crate::pattern::LearningPattern;
use crate::strategy::OptimizationStrategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    StrategyExecuted,
    StrategyRolledBack,
    StrategyValidated,
}

/// Timestamped note appended to a learning result as strategies run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceAnnotation {
    pub kind: AnnotationKind,
    pub strategy_id: StrategyId,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl PerformanceAnnotation {
    pub fn new(kind: AnnotationKind, strategy_id: StrategyId) -> Self {
        Self {
            kind,
            strategy_id,
            at: Utc::now(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Measured before/after comparison appended once a strategy is validated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceBlock {
    pub before_metrics: PerformanceMetrics,
    pub after_metrics: PerformanceMetrics,
    pub improvement: f64,
}

/// Durable record of one learning cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineLearningResult {
    pub id: LearningResultId,
    pub patterns: Vec<LearningPattern>,
    pub confidence: f64,
    pub recommendations: Vec<OptimizationStrategy>,
    #[serde(default)]
    pub executed_count: usize,
    #[serde(default)]
    pub annotations: Vec<PerformanceAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceBlock>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EngineLearningResult {
    /// Build a result whose aggregate confidence is the mean pattern confidence.
    pub fn new(patterns: Vec<LearningPattern>) -> Self {
        let confidence = if patterns.is_empty() {
            0.0
        } else {
            patterns.iter().map(|p| p.confidence).sum::<f64>() / patterns.len() as f64
        };
        let now = Utc::now();
        Self {
            id: LearningResultId::generate(),
            patterns,
            confidence: clamp_unit(confidence),
            recommendations: Vec::new(),
            executed_count: 0,
            annotations: Vec::new(),
            performance: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Take ownership of the strategies, linking each one to this result.
    pub fn adopt(&mut self, strategies: Vec<OptimizationStrategy>) {
        for mut strategy in strategies {
            strategy.attach_to(self.id.clone());
            self.recommendations.push(strategy);
        }
        self.updated_at = Utc::now();
    }

    pub fn annotations_for(&self, strategy_id: &StrategyId) -> Vec<&PerformanceAnnotation> {
        self.annotations
            .iter()
            .filter(|a| &a.strategy_id == strategy_id)
            .collect()
    }
}
