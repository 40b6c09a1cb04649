use autotune_types::{OptimizationStrategy, RiskLevel};
use serde::{Deserialize, Serialize};

/// The only check between a generated strategy and autonomous execution.
///
/// A strategy passes when its confidence and impact are strictly above the
/// minimums and its risk does not exceed `max_risk`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutonomyGate {
    pub min_confidence: f64,
    pub min_impact: f64,
    pub max_risk: RiskLevel,
}

impl AutonomyGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn with_min_impact(mut self, min_impact: f64) -> Self {
        self.min_impact = min_impact;
        self
    }

    pub fn with_max_risk(mut self, max_risk: RiskLevel) -> Self {
        self.max_risk = max_risk;
        self
    }

    pub fn admits(&self, strategy: &OptimizationStrategy) -> bool {
        strategy.confidence > self.min_confidence
            && strategy.impact > self.min_impact
            && strategy.risk_level() <= self.max_risk
    }

    /// Strategies that pass the gate, in input order.
    pub fn filter(&self, strategies: &[OptimizationStrategy]) -> Vec<OptimizationStrategy> {
        strategies
            .iter()
            .filter(|s| self.admits(s))
            .cloned()
            .collect()
    }

    /// Admitted strategies, highest priority first.
    pub fn rank(&self, strategies: &[OptimizationStrategy]) -> Vec<OptimizationStrategy> {
        let mut admitted = self.filter(strategies);
        admitted.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        admitted
    }
}

impl Default for AutonomyGate {
    fn default() -> Self {
        Self {
            min_confidence: 0.8,
            min_impact: 0.5,
            max_risk: RiskLevel::Low,
        }
    }
}
