use autotune_types::StrategyId;
use serde::{Deserialize, Serialize};

/// Field boosts of the tuned ranking function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchWeights {
    pub title: f64,
    pub content: f64,
    pub tag: f64,
}

impl SearchWeights {
    pub fn new(title: f64, content: f64, tag: f64) -> Self {
        Self {
            title,
            content,
            tag,
        }
    }

    /// Scale title and tag boosts. Content is never adjusted.
    pub fn scaled(&self, title_factor: f64, tag_factor: f64) -> Self {
        Self {
            title: self.title * title_factor,
            content: self.content,
            tag: self.tag * tag_factor,
        }
    }
}

impl Default for SearchWeights {
    fn default() -> Self {
        Self::new(2.0, 1.0, 1.5)
    }
}

/// Stored value of one `search_weights` version.
///
/// A version written by a strategy carries the weights it replaced; a version
/// written by a rollback names the strategy it undid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightsRecord {
    pub weights: SearchWeights,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<SearchWeights>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_id: Option<StrategyId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolled_back: Option<StrategyId>,
}

impl WeightsRecord {
    pub fn seed(weights: SearchWeights) -> Self {
        Self {
            weights,
            previous: None,
            strategy_id: None,
            rolled_back: None,
        }
    }

    pub fn applied(weights: SearchWeights, previous: SearchWeights, strategy_id: StrategyId) -> Self {
        Self {
            weights,
            previous: Some(previous),
            strategy_id: Some(strategy_id),
            rolled_back: None,
        }
    }

    pub fn restored(weights: SearchWeights, undone: StrategyId) -> Self {
        Self {
            weights,
            previous: None,
            strategy_id: None,
            rolled_back: Some(undone),
        }
    }
}
