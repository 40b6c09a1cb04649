use crate::clamp_unit;
use crate::event::MetadataMap;
use crate::ids::PatternId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known pattern classifiers.
pub mod pattern_types {
    pub const HIGH_RELEVANCE_SEARCH: &str = "high_relevance_search";
    pub const USER_FEEDBACK: &str = "user_feedback";
    pub const PERFORMANCE_OPTIMIZATION: &str = "performance_optimization";
    pub const CACHE_HIT: &str = "cache_hit_pattern";
    pub const INDEX_USAGE: &str = "index_usage_pattern";
    pub const TIME_BASED: &str = "TIME_BASED";
    pub const ANOMALY: &str = "ANOMALY";
    pub const TREND: &str = "TREND";
    pub const SEASONAL: &str = "SEASONAL";
}

/// Performance figures observed alongside a pattern, when known.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_utilization: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternMetadata {
    /// Name of the detector that produced the pattern.
    pub source: String,
    pub detected_at: DateTime<Utc>,
    #[serde(default)]
    pub extra: MetadataMap,
}

/// A regularity detected over one or more events. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPattern {
    pub id: PatternId,
    #[serde(rename = "type")]
    pub pattern_type: String,
    pub confidence: f64,
    #[serde(default)]
    pub features: MetadataMap,
    #[serde(default)]
    pub metrics: PatternMetrics,
    pub metadata: PatternMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LearningPattern {
    pub fn new(pattern_type: impl Into<String>, confidence: f64, source: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: PatternId::generate(),
            pattern_type: pattern_type.into(),
            confidence: clamp_unit(confidence),
            features: MetadataMap::new(),
            metrics: PatternMetrics::default(),
            metadata: PatternMetadata {
                source: source.into(),
                detected_at: now,
                extra: MetadataMap::new(),
            },
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_feature(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.features.insert(key.into(), value.into());
        self
    }

    pub fn with_metrics(mut self, metrics: PatternMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.extra.insert(key.into(), value.into());
        self
    }

    pub fn feature_f64(&self, key: &str) -> Option<f64> {
        self.features
            .get(key)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
    }

    pub fn feature_str(&self, key: &str) -> Option<&str> {
        self.features.get(key).and_then(Value::as_str)
    }

    pub fn is_type(&self, pattern_type: &str) -> bool {
        self.pattern_type == pattern_type
    }
}
