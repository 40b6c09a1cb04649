use autotune_metrics::MetricsError;

pub type ValidatorResult<T> = Result<T, ValidatorError>;

#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    #[error("metrics unavailable: {0}")]
    Metrics(#[from] MetricsError),

    #[error("validation cancelled")]
    Cancelled,

    #[error("invalid validation settings: {0}")]
    InvalidSettings(String),
}
