//! Structured logging initialization
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and either a
//! JSON or human readable fmt layer. `RUST_LOG` always wins over the
//! configured level.

use crate::config::parse_env_var;
use crate::error::CoreError;
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Logging configuration
///
/// - `NJJC_LOG_LEVEL` (default: "info")
/// - `NJJC_LOG_FORMAT` json | pretty (default: json)
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub service_name: String,
    pub level: String,
    pub format: LogFormat,
}

impl LogConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }

    pub fn from_env(service_name: impl Into<String>) -> Result<Self, CoreError> {
        let defaults = Self::new(service_name);
        let level = std::env::var("NJJC_LOG_LEVEL").unwrap_or(defaults.level);
        let format = parse_env_var("NJJC_LOG_FORMAT", defaults.format)?;

        let config = Self {
            service_name: defaults.service_name,
            level,
            format,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.to_lowercase().as_str()) {
            return Err(CoreError::config(
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.level,
                    valid_levels.join(", ")
                ),
                "NJJC_LOG_LEVEL",
            ));
        }
        Ok(())
    }
}

/// Initialize the global tracing subscriber. Must be called once at startup.
pub fn init_logging(config: &LogConfig) -> Result<(), CoreError> {
    config.validate()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true),
            )
            .try_init(),
    };
    result.map_err(|e| CoreError::LoggingError(e.to_string()))?;

    tracing::info!(service = %config.service_name, level = %config.level, "Logging initialized");
    Ok(())
}
