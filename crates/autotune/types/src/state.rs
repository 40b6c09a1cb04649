use crate::clamp_unit;
use crate::error::TypesError;
use crate::event::MetadataMap;
use crate::ids::EngineStateId;
use crate::operation::OperationType;
use crate::strategy::RiskLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineStatus {
    Initializing,
    Ready,
    Learning,
    Optimizing,
    Paused,
    Error,
}

impl EngineStatus {
    /// Whether the engine may move from `self` to `next`.
    ///
    /// Nothing returns to `Initializing`; a paused engine only leaves
    /// through `Ready` (resume) or `Error`.
    pub fn can_transition_to(&self, next: EngineStatus) -> bool {
        match (self, next) {
            (_, Self::Initializing) => false,
            (Self::Paused, Self::Ready | Self::Error | Self::Paused) => true,
            (Self::Paused, _) => false,
            _ => true,
        }
    }

    /// The status an engine reports while `phase` is running.
    pub fn for_phase(phase: OperationType) -> Self {
        match phase {
            OperationType::Learning | OperationType::PatternDetection => Self::Learning,
            OperationType::Optimization | OperationType::Validation | OperationType::Rollback => {
                Self::Optimizing
            }
        }
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initializing => "INITIALIZING",
            Self::Ready => "READY",
            Self::Learning => "LEARNING",
            Self::Optimizing => "OPTIMIZING",
            Self::Paused => "PAUSED",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// How much risk the engine accepts for autonomous changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Low,
    Medium,
    High,
}

impl RiskTolerance {
    /// Highest risk level this tolerance accepts.
    pub fn ceiling(&self) -> RiskLevel {
        match self {
            Self::Low => RiskLevel::Medium,
            Self::Medium => RiskLevel::High,
            Self::High => RiskLevel::Critical,
        }
    }

    pub fn permits(&self, risk: RiskLevel) -> bool {
        risk <= self.ceiling()
    }
}

impl Default for RiskTolerance {
    fn default() -> Self {
        Self::Low
    }
}

impl fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStateMetadata {
    #[serde(default)]
    pub risk_tolerance: RiskTolerance,
    #[serde(default)]
    pub extra: MetadataMap,
}

/// Immutable snapshot of the engine. Every transition returns a new value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineState {
    pub id: EngineStateId,
    pub status: EngineStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<OperationType>,
    pub confidence: f64,
    pub last_active: DateTime<Utc>,
    #[serde(default)]
    pub metadata: EngineStateMetadata,
}

impl EngineState {
    pub fn initializing(risk_tolerance: RiskTolerance) -> Self {
        Self {
            id: EngineStateId::generate(),
            status: EngineStatus::Initializing,
            current_phase: None,
            confidence: 0.0,
            last_active: Utc::now(),
            metadata: EngineStateMetadata {
                risk_tolerance,
                extra: MetadataMap::new(),
            },
        }
    }

    pub fn risk_tolerance(&self) -> RiskTolerance {
        self.metadata.risk_tolerance
    }

    pub fn with_status(
        &self,
        status: EngineStatus,
        phase: Option<OperationType>,
    ) -> Result<Self, TypesError> {
        if !self.status.can_transition_to(status) {
            return Err(TypesError::InvalidEngineTransition {
                from: self.status.to_string(),
                to: status.to_string(),
            });
        }
        let mut next = self.clone();
        next.status = status;
        next.current_phase = phase;
        next.last_active = Utc::now();
        Ok(next)
    }

    pub fn with_confidence(&self, confidence: f64) -> Self {
        let mut next = self.clone();
        next.confidence = clamp_unit(confidence);
        next.last_active = Utc::now();
        next
    }

    pub fn with_risk_tolerance(&self, tolerance: RiskTolerance) -> Self {
        let mut next = self.clone();
        next.metadata.risk_tolerance = tolerance;
        next.last_active = Utc::now();
        next
    }
}
