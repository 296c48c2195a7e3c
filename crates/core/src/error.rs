//! Error type shared by the NJJC platform crates

use thiserror::Error;

/// Errors raised by the shared platform layer (configuration, database pool)
#[derive(Debug, Error)]
pub enum CoreError {
    /// A configuration value is missing, unparsable, or out of range
    #[error("Configuration error: {message}")]
    ConfigurationError {
        message: String,
        /// Environment variable that caused the failure, when known
        key: Option<String>,
    },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Logging initialization failed: {0}")]
    LoggingError(String),
}

impl CoreError {
    pub fn config(message: impl Into<String>, key: &str) -> Self {
        CoreError::ConfigurationError {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Environment key associated with a configuration error
    pub fn key(&self) -> Option<&str> {
        match self {
            CoreError::ConfigurationError { key, .. } => key.as_deref(),
            _ => None,
        }
    }
}
