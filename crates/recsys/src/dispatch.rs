//! Background dispatch of preference vector recomputation
//!
//! Interaction recording schedules a recompute for the acting user and returns
//! immediately. A single worker task drains the queue, so recomputes for the
//! same user are applied in arrival order; results are last-write-wins.

use crate::profile::UserVectorCalculator;
use crate::types::UserId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Sink for "this user's preference vector is stale" signals
pub trait RecomputeTrigger: Send + Sync {
    /// Must not block on the recomputation itself
    fn schedule(&self, user_id: UserId);
}

/// Cloneable sender side of the recompute queue
#[derive(Clone)]
pub struct RecomputeHandle {
    sender: mpsc::UnboundedSender<UserId>,
}

impl RecomputeTrigger for RecomputeHandle {
    fn schedule(&self, user_id: UserId) {
        if self.sender.send(user_id).is_err() {
            warn!(user_id, "Recompute worker stopped; dropping vector refresh");
        }
    }
}

/// Worker that recomputes preference vectors off the request path
pub struct RecomputeWorker;

impl RecomputeWorker {
    /// Spawn the worker on the current tokio runtime.
    ///
    /// The task ends once every `RecomputeHandle` has been dropped and the
    /// queue is drained.
    pub fn spawn(calculator: Arc<UserVectorCalculator>) -> (RecomputeHandle, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<UserId>();

        let task = tokio::spawn(async move {
            info!("Preference vector worker started");
            while let Some(user_id) = receiver.recv().await {
                match calculator.recompute(user_id).await {
                    Ok(Some(_)) => debug!(user_id, "Preference vector refreshed"),
                    Ok(None) => debug!(user_id, "No usable interaction signal"),
                    Err(e) => error!(user_id, error = %e, "Preference vector refresh failed"),
                }
            }
            info!("Preference vector worker stopped");
        });

        (RecomputeHandle { sender }, task)
    }
}

/// Trigger that drops every signal; for read-only deployments
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTrigger;

impl RecomputeTrigger for NoopTrigger {
    fn schedule(&self, user_id: UserId) {
        debug!(user_id, "Recompute trigger disabled");
    }
}
