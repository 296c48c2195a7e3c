//! Recommendation engine errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecsysError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unknown interaction type: {0}")]
    UnknownInteractionType(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Embedding provider error: {0}")]
    Embedding(String),

    #[error(transparent)]
    Core(#[from] njjc_core::CoreError),
}

pub type RecsysResult<T> = Result<T, RecsysError>;
