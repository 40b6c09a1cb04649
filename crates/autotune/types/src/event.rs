use crate::error::TypesError;
use crate::ids::EventId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Free-form key/value metadata carried by events and patterns.
pub type MetadataMap = BTreeMap<String, Value>;

/// Kind of observed signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LearningEventType {
    SearchPattern,
    UserFeedback,
    ModelUpdate,
    AdaptationRule,
    SignalDetected,
    MetricThreshold,
    SystemState,
    ExperimentResult,
}

impl LearningEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchPattern => "SEARCH_PATTERN",
            Self::UserFeedback => "USER_FEEDBACK",
            Self::ModelUpdate => "MODEL_UPDATE",
            Self::AdaptationRule => "ADAPTATION_RULE",
            Self::SignalDetected => "SIGNAL_DETECTED",
            Self::MetricThreshold => "METRIC_THRESHOLD",
            Self::SystemState => "SYSTEM_STATE",
            Self::ExperimentResult => "EXPERIMENT_RESULT",
        }
    }
}

impl fmt::Display for LearningEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LearningEventType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SEARCH_PATTERN" => Ok(Self::SearchPattern),
            "USER_FEEDBACK" => Ok(Self::UserFeedback),
            "MODEL_UPDATE" => Ok(Self::ModelUpdate),
            "ADAPTATION_RULE" => Ok(Self::AdaptationRule),
            "SIGNAL_DETECTED" => Ok(Self::SignalDetected),
            "METRIC_THRESHOLD" => Ok(Self::MetricThreshold),
            "SYSTEM_STATE" => Ok(Self::SystemState),
            "EXPERIMENT_RESULT" => Ok(Self::ExperimentResult),
            other => Err(TypesError::UnknownVariant {
                kind: "event type",
                value: other.to_string(),
            }),
        }
    }
}

/// Processing status of an event.
///
/// `Completed`, `Failed` and `Ignored` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Ignored,
}

impl EventStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Ignored)
    }

    pub fn can_transition_to(&self, next: EventStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Ignored)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
                | (Self::Processing, Self::Ignored)
        )
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Ignored => "IGNORED",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl Default for EventPriority {
    fn default() -> Self {
        Self::Medium
    }
}

/// An observed signal: a search outcome, a piece of feedback, a metric breach.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningEvent {
    pub id: EventId,
    #[serde(rename = "type")]
    pub event_type: LearningEventType,
    pub status: EventStatus,
    #[serde(default)]
    pub priority: EventPriority,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: MetadataMap,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl LearningEvent {
    pub fn new(event_type: LearningEventType) -> Self {
        Self {
            id: EventId::generate(),
            event_type,
            status: EventStatus::Pending,
            priority: EventPriority::default(),
            timestamp: Utc::now(),
            metadata: MetadataMap::new(),
            retry_count: 0,
            correlation_id: None,
            session_id: None,
            user_id: None,
            tags: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = id;
        self
    }

    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: EventPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn with_user_id(mut self, id: impl Into<String>) -> Self {
        self.user_id = Some(id.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Numeric metadata value. Accepts JSON numbers and numeric strings,
    /// since stream producers often stringify every field.
    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        let value = match self.metadata.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Move to `next`, rejecting any move out of a terminal state.
    pub fn transition(&mut self, next: EventStatus) -> Result<(), TypesError> {
        if !self.status.can_transition_to(next) {
            return Err(TypesError::InvalidEventTransition {
                id: self.id.to_string(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Fresh pending copy for another attempt.
    pub fn retry_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.id = EventId::generate();
        copy.status = EventStatus::Pending;
        copy.retry_count = self.retry_count.saturating_add(1);
        copy
    }
}
