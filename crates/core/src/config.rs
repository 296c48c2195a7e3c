//! Shared configuration loader for NJJC services and batch jobs
//!
//! Configuration is read from environment variables carrying the `NJJC_`
//! prefix, optionally seeded from a `.env` file via dotenvy. Override order is
//! defaults < .env < process environment.
//!
//! # Example
//!
//! ```no_run
//! use njjc_core::config::{load_dotenv, ConfigLoader, DatabaseConfig};
//!
//! # fn example() -> Result<(), njjc_core::CoreError> {
//! load_dotenv();
//! let db_config = DatabaseConfig::from_env()?;
//! db_config.validate()?;
//! # Ok(())
//! # }
//! ```

use crate::error::CoreError;
use std::time::Duration;
use url::Url;

/// Configuration loader trait
///
/// Implemented by every configuration section so binaries can load and
/// validate them uniformly.
pub trait ConfigLoader: Sized {
    /// Load configuration from environment variables, falling back to
    /// defaults for optional values.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if a required variable is missing or a
    /// value cannot be parsed.
    fn from_env() -> Result<Self, CoreError>;

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` naming the offending key.
    fn validate(&self) -> Result<(), CoreError>;
}

/// PostgreSQL connection settings
///
/// # Environment Variables
///
/// - `NJJC_DATABASE_URL` or `DATABASE_URL` (required)
/// - `NJJC_DATABASE_MAX_CONNECTIONS` (default: 20)
/// - `NJJC_DATABASE_MIN_CONNECTIONS` (default: 2)
/// - `NJJC_DATABASE_CONNECT_TIMEOUT` seconds (default: 30)
/// - `NJJC_DATABASE_IDLE_TIMEOUT` seconds (default: 600)
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    pub min_connections: u32,
    /// Connection acquire timeout
    pub connect_timeout: Duration,
    /// Idle connection timeout
    pub idle_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/njjc".to_string(),
            max_connections: 20,
            min_connections: 2,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl ConfigLoader for DatabaseConfig {
    fn from_env() -> Result<Self, CoreError> {
        let url = std::env::var("NJJC_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| {
                CoreError::config(
                    "DATABASE_URL or NJJC_DATABASE_URL must be set",
                    "NJJC_DATABASE_URL",
                )
            })?;

        let defaults = DatabaseConfig::default();
        let max_connections =
            parse_env_var("NJJC_DATABASE_MAX_CONNECTIONS", defaults.max_connections)?;
        let min_connections =
            parse_env_var("NJJC_DATABASE_MIN_CONNECTIONS", defaults.min_connections)?;
        let connect_timeout_secs = parse_env_var("NJJC_DATABASE_CONNECT_TIMEOUT", 30u64)?;
        let idle_timeout_secs = parse_env_var("NJJC_DATABASE_IDLE_TIMEOUT", 600u64)?;

        Ok(Self {
            url,
            max_connections,
            min_connections,
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            idle_timeout: Duration::from_secs(idle_timeout_secs),
        })
    }

    fn validate(&self) -> Result<(), CoreError> {
        Url::parse(&self.url).map_err(|e| {
            CoreError::config(format!("Invalid DATABASE_URL: {}", e), "NJJC_DATABASE_URL")
        })?;

        if self.max_connections == 0 {
            return Err(CoreError::config(
                "max_connections must be greater than 0",
                "NJJC_DATABASE_MAX_CONNECTIONS",
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(CoreError::config(
                format!(
                    "min_connections ({}) cannot exceed max_connections ({})",
                    self.min_connections, self.max_connections
                ),
                "NJJC_DATABASE_MIN_CONNECTIONS",
            ));
        }

        if self.connect_timeout.as_secs() == 0 {
            return Err(CoreError::config(
                "connect_timeout must be greater than 0 seconds",
                "NJJC_DATABASE_CONNECT_TIMEOUT",
            ));
        }

        if self.idle_timeout.as_secs() == 0 {
            return Err(CoreError::config(
                "idle_timeout must be greater than 0 seconds",
                "NJJC_DATABASE_IDLE_TIMEOUT",
            ));
        }

        Ok(())
    }
}

/// Parse an environment variable, returning `default` when it is unset
///
/// # Errors
///
/// Returns a `ConfigurationError` if the variable is set but cannot be parsed
/// into `T`.
pub fn parse_env_var<T>(key: &str, default: T) -> Result<T, CoreError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .ok()
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| CoreError::config(format!("Failed to parse {}: {}", key, e), key))
        })
        .unwrap_or(Ok(default))
}

/// Load `.env` if present. A missing file is not an error.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }
}
