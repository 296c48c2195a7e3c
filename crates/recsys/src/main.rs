//! recsys-train: rewrite every collaborative latent vector
//!
//! Batch job meant to run from cron. Reads the full interaction log from
//! PostgreSQL, factorizes it and writes user and item vectors in bulk.

use anyhow::Context;
use njjc_core::config::{load_dotenv, ConfigLoader, DatabaseConfig};
use njjc_core::{init_logging, DatabasePool, LogConfig};
use njjc_recsys::{PgStore, RecsysConfig, SvdTrainer, TrainConfig};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let log_config = LogConfig::from_env("recsys-train").context("Invalid logging configuration")?;
    init_logging(&log_config).context("Failed to initialize logging")?;

    let db_config = DatabaseConfig::from_env().context("Failed to load database configuration")?;
    db_config
        .validate()
        .context("Invalid database configuration")?;

    let config = RecsysConfig::from_env().context("Failed to load recommender configuration")?;
    config
        .validate()
        .context("Invalid recommender configuration")?;

    let pool = DatabasePool::new(&db_config)
        .await
        .context("Failed to connect to PostgreSQL")?;
    anyhow::ensure!(pool.is_healthy().await, "Database health check failed");
    let stats = pool.stats();
    info!(size = stats.size, idle = stats.idle, "Database pool ready");
    let store = Arc::new(PgStore::new(pool.into_inner()));

    info!(n_components = config.cf_dim, "Starting collaborative training");
    let trainer = SvdTrainer::new(
        store.clone(),
        store,
        TrainConfig {
            n_components: config.cf_dim,
        },
    );
    let report = trainer.train().await.context("Collaborative training failed")?;

    if report.skipped {
        info!("Nothing to train");
    } else {
        info!(
            users = report.users_updated,
            items = report.items_updated,
            components = report.components,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Training complete"
        );
    }

    Ok(())
}
