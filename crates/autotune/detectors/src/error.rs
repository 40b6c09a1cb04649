use autotune_storage::StorageError;
use thiserror::Error;

pub type DetectorResult<T> = Result<T, DetectorError>;

/// Errors that abort one detector's contribution to a cycle.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid event {id}: {reason}")]
    InvalidEvent { id: String, reason: String },

    #[error("detector failed: {0}")]
    Failed(String),
}
