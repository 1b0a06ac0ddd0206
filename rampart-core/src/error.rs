use thiserror::Error;

/// Error taxonomy for the assessment pipeline.
///
/// Validation failures ([`PipelineError::InvalidTarget`]) are surfaced
/// synchronously at submission and never enter the queue. Capability and
/// timeout failures are caught inside the worker loop and folded into a
/// terminal `failed` job record instead of propagating.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Capability failed: {0}")]
    Capability(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<redis::RedisError> for PipelineError {
    fn from(err: redis::RedisError) -> Self {
        PipelineError::Queue(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
