use autotune_executor::ExecutorError;
use autotune_metrics::MetricsError;
use autotune_storage::StorageError;
use autotune_stream::StreamError;
use autotune_types::TypesError;
use autotune_validator::ValidatorError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("validation error: {0}")]
    Validator(#[from] ValidatorError),

    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Transition(#[from] TypesError),

    #[error("operation {0} is not in flight")]
    UnknownOperation(String),
}
