use thiserror::Error;

pub type StreamResult<T> = Result<T, StreamError>;

#[derive(Debug, Error)]
pub enum StreamError {
    /// The caller's cancellation token fired while the read was blocked.
    #[error("stream read cancelled")]
    Cancelled,

    #[error("invalid entry id: {0}")]
    InvalidEntryId(String),

    #[error("malformed entry {entry}: {reason}")]
    Malformed { entry: String, reason: String },

    #[error("stream backend error: {0}")]
    Backend(String),
}
