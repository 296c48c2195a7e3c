//! # NJJC Core
//!
//! Shared building blocks for the NJJC platform crates.
//!
//! ## Modules
//!
//! - `error`: Platform error type
//! - `config`: Environment configuration loading and validation
//! - `database`: Shared PostgreSQL connection pool
//! - `math`: Vector similarity helpers
//! - `logging`: Structured logging setup

pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod math;

pub use config::{load_dotenv, parse_env_var, ConfigLoader, DatabaseConfig};
pub use database::{DatabasePool, PoolStats};
pub use error::CoreError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use math::{cosine_distance, cosine_similarity, dot_product, l2_norm, similarity_from_distance};
