//! Collaborative latent vectors via truncated SVD
//!
//! Builds a dense user x item matrix from the full interaction log (missing
//! pairs count as 0) and factorizes it. User factors are `U * Sigma`, item
//! factors are the rows of `V`. Every stored vector is zero-padded to exactly
//! `n_components` elements so collaborative queries always compare vectors of
//! one width.

use crate::error::{RecsysError, RecsysResult};
use crate::store::{InteractionLog, VectorStore};
use crate::types::{ItemId, UserId};
use nalgebra::DMatrix;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Never factorize with fewer components than this
const MIN_COMPONENTS: usize = 2;

/// Trainer configuration
#[derive(Debug, Clone, Copy)]
pub struct TrainConfig {
    /// Width of every stored collaborative vector
    pub n_components: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self { n_components: 64 }
    }
}

/// Outcome of one training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub users_updated: usize,
    pub items_updated: usize,
    /// Components actually taken from the decomposition (before padding)
    pub components: usize,
    pub elapsed: Duration,
    /// True when the log was empty and nothing was written
    pub skipped: bool,
}

impl TrainingReport {
    fn skipped(elapsed: Duration) -> Self {
        Self {
            users_updated: 0,
            items_updated: 0,
            components: 0,
            elapsed,
            skipped: true,
        }
    }
}

/// Dense implicit-feedback matrix with ascending id order on both axes
#[derive(Debug, Clone)]
pub struct InteractionMatrix {
    pub user_ids: Vec<UserId>,
    pub item_ids: Vec<ItemId>,
    pub values: DMatrix<f64>,
}

impl InteractionMatrix {
    /// Returns `None` for an empty log. Repeated (user, item) pairs are
    /// averaged into one cell.
    pub fn from_scores(scores: &[(UserId, ItemId, f32)]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }

        let mut cells: BTreeMap<(UserId, ItemId), (f64, u32)> = BTreeMap::new();
        for &(user_id, item_id, score) in scores {
            let cell = cells.entry((user_id, item_id)).or_insert((0.0, 0));
            cell.0 += f64::from(score);
            cell.1 += 1;
        }

        let user_ids: Vec<UserId> = cells
            .keys()
            .map(|(u, _)| *u)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let item_ids: Vec<ItemId> = cells
            .keys()
            .map(|(_, i)| *i)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let user_index: BTreeMap<UserId, usize> =
            user_ids.iter().enumerate().map(|(idx, id)| (*id, idx)).collect();
        let item_index: BTreeMap<ItemId, usize> =
            item_ids.iter().enumerate().map(|(idx, id)| (*id, idx)).collect();

        let mut values = DMatrix::<f64>::zeros(user_ids.len(), item_ids.len());
        for ((user_id, item_id), (sum, count)) in cells {
            values[(user_index[&user_id], item_index[&item_id])] = sum / f64::from(count);
        }

        Some(Self {
            user_ids,
            item_ids,
            values,
        })
    }

    pub fn n_users(&self) -> usize {
        self.user_ids.len()
    }

    pub fn n_items(&self) -> usize {
        self.item_ids.len()
    }
}

/// Latent factors ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct Factors {
    pub users: Vec<(UserId, Vec<f32>)>,
    pub items: Vec<(ItemId, Vec<f32>)>,
    pub components: usize,
}

/// `max(2, min(n_components, n_users - 1, n_items - 1))`
pub fn component_count(n_components: usize, n_users: usize, n_items: usize) -> usize {
    n_components
        .min(n_users.saturating_sub(1))
        .min(n_items.saturating_sub(1))
        .max(MIN_COMPONENTS)
}

/// Truncated SVD of `matrix`, padded to `n_components`
pub fn factorize(matrix: &InteractionMatrix, n_components: usize) -> RecsysResult<Factors> {
    let svd = matrix.values.clone().svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| RecsysError::Training("SVD did not produce U".to_string()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| RecsysError::Training("SVD did not produce V^T".to_string()))?;
    let sigma = svd.singular_values;

    // Descending singular values; the decomposition has at most min(m, n).
    let mut order: Vec<usize> = (0..sigma.len()).collect();
    order.sort_by(|&a, &b| sigma[b].total_cmp(&sigma[a]).then(a.cmp(&b)));

    let k = component_count(n_components, matrix.n_users(), matrix.n_items())
        .min(order.len())
        .min(n_components);
    let order = &order[..k];

    let users = matrix
        .user_ids
        .iter()
        .enumerate()
        .map(|(row, user_id)| {
            let mut vector = vec![0.0f32; n_components];
            for (slot, &component) in order.iter().enumerate() {
                vector[slot] = (u[(row, component)] * sigma[component]) as f32;
            }
            (*user_id, vector)
        })
        .collect();

    let items = matrix
        .item_ids
        .iter()
        .enumerate()
        .map(|(col, item_id)| {
            let mut vector = vec![0.0f32; n_components];
            for (slot, &component) in order.iter().enumerate() {
                vector[slot] = v_t[(component, col)] as f32;
            }
            (*item_id, vector)
        })
        .collect();

    Ok(Factors {
        users,
        items,
        components: k,
    })
}

/// Batch job that rewrites every collaborative vector
pub struct SvdTrainer {
    interactions: Arc<dyn InteractionLog>,
    vectors: Arc<dyn VectorStore>,
    config: TrainConfig,
}

impl SvdTrainer {
    pub fn new(
        interactions: Arc<dyn InteractionLog>,
        vectors: Arc<dyn VectorStore>,
        config: TrainConfig,
    ) -> Self {
        Self {
            interactions,
            vectors,
            config,
        }
    }

    pub async fn train(&self) -> RecsysResult<TrainingReport> {
        let started = Instant::now();
        let n_components = self.config.n_components;

        let scores = self.interactions.all_scores().await?;
        let Some(matrix) = InteractionMatrix::from_scores(&scores) else {
            warn!("No interactions recorded; collaborative training skipped");
            return Ok(TrainingReport::skipped(started.elapsed()));
        };

        info!(
            interactions = scores.len(),
            users = matrix.n_users(),
            items = matrix.n_items(),
            n_components,
            "Training collaborative model"
        );

        let factors = tokio::task::spawn_blocking(move || factorize(&matrix, n_components))
            .await
            .map_err(|e| RecsysError::Training(format!("SVD task failed: {}", e)))??;

        debug!(components = factors.components, "SVD finished");

        let users_updated = factors.users.len();
        let items_updated = factors.items.len();
        self.vectors
            .write_cf_vectors(factors.users, factors.items)
            .await?;

        let report = TrainingReport {
            users_updated,
            items_updated,
            components: factors.components,
            elapsed: started.elapsed(),
            skipped: false,
        };
        info!(
            users_updated,
            items_updated,
            components = report.components,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Collaborative vectors written"
        );
        Ok(report)
    }
}
