use autotune_storage::StorageError;
use autotune_types::{RiskLevel, RiskTolerance, StrategyId};

pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Which path found the weight configuration missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightsPhase {
    Execute,
    Rollback,
}

impl WeightsPhase {
    fn message(&self) -> &'static str {
        match self {
            Self::Execute => "no active weights to adjust",
            Self::Rollback => "No weights found for rollback",
        }
    }
}

/// Errors from strategy execution and rollback.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("strategy {strategy} rejected: risk {risk} exceeds tolerance {tolerance}")]
    RiskRejected {
        strategy: StrategyId,
        risk: RiskLevel,
        tolerance: RiskTolerance,
    },

    #[error("{}", .0.message())]
    NoActiveWeights(WeightsPhase),

    #[error("strategy {0} does not reference an existing learning result")]
    OrphanStrategy(StrategyId),

    #[error("invalid configuration at {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ExecutorError {
    /// Execution was refused before any configuration was written.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::RiskRejected { .. }
                | Self::OrphanStrategy(_)
                | Self::NoActiveWeights(WeightsPhase::Execute)
        )
    }
}
