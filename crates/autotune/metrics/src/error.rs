use thiserror::Error;

pub type MetricsResult<T> = Result<T, MetricsError>;

/// Errors surfaced by a metrics collaborator.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metric {0} is unavailable")]
    Unavailable(String),

    #[error("invalid metric value for {name}: {value}")]
    InvalidValue { name: String, value: f64 },

    #[error("metrics backend error: {0}")]
    Backend(String),
}
