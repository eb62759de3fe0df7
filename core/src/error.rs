use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed input: {reason}")]
    MalformedInput { reason: String },

    #[error("Model artifact '{name}' unavailable")]
    ModelUnavailable { name: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SentinelResult<T> = Result<T, SentinelError>;
