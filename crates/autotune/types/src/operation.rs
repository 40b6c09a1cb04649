use crate::error::TypesError;
use crate::event::MetadataMap;
use crate::ids::OperationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    Learning,
    Optimization,
    Validation,
    Rollback,
    PatternDetection,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Learning => "LEARNING",
            Self::Optimization => "OPTIMIZATION",
            Self::Validation => "VALIDATION",
            Self::Rollback => "ROLLBACK",
            Self::PatternDetection => "PATTERN_DETECTION",
        };
        f.write_str(s)
    }
}

/// Operation lifecycle. Transitions are one-way; the last three are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: OperationStatus) -> bool {
        match self {
            Self::Pending => !matches!(next, Self::Pending),
            Self::InProgress => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// A tracked unit of engine work.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOperation {
    pub id: OperationId,
    #[serde(rename = "type")]
    pub op_type: OperationType,
    pub status: OperationStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub metadata: MetadataMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EngineOperation {
    pub fn new(op_type: OperationType) -> Self {
        Self {
            id: OperationId::generate(),
            op_type,
            status: OperationStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
            metrics: BTreeMap::new(),
            metadata: MetadataMap::new(),
            error: None,
        }
    }

    pub fn with_metadata(mut self, metadata: MetadataMap) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn start(&mut self) -> Result<(), TypesError> {
        self.transition(OperationStatus::InProgress)
    }

    pub fn complete(&mut self, metrics: BTreeMap<String, f64>) -> Result<(), TypesError> {
        self.transition(OperationStatus::Completed)?;
        self.metrics.extend(metrics);
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TypesError> {
        self.transition(OperationStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), TypesError> {
        self.transition(OperationStatus::Cancelled)
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds())
    }

    fn transition(&mut self, next: OperationStatus) -> Result<(), TypesError> {
        if !self.status.can_transition_to(next) {
            return Err(TypesError::InvalidOperationTransition {
                id: self.id.to_string(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.end_time = Some(Utc::now());
        }
        Ok(())
    }
}
