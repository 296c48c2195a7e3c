//! User preference vector
//!
//! A user's content-preference vector is the score-weighted average of the
//! embeddings of the items behind their most recent interactions. Negative
//! scores (NOT_INTERESTED) pull the vector away from those items.

use crate::error::RecsysResult;
use crate::store::{Catalog, InteractionLog, Stores, VectorStore};
use crate::types::{Interaction, ItemId, User, UserId};
use ndarray::{Array1, ArrayView1};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_INTERACTION_LIMIT: usize = 50;

/// Recomputes and persists `User.preference_vector`
pub struct UserVectorCalculator {
    catalog: Arc<dyn Catalog>,
    interactions: Arc<dyn InteractionLog>,
    vectors: Arc<dyn VectorStore>,
    interaction_limit: usize,
}

impl UserVectorCalculator {
    pub fn new(stores: &Stores, interaction_limit: usize) -> Self {
        Self {
            catalog: stores.catalog.clone(),
            interactions: stores.interactions.clone(),
            vectors: stores.vectors.clone(),
            interaction_limit,
        }
    }

    /// Recompute with the configured interaction window
    pub async fn recompute(&self, user_id: UserId) -> RecsysResult<Option<Vec<f32>>> {
        self.calculate(user_id, self.interaction_limit).await
    }

    /// Weighted average over the user's `limit` most recent interactions.
    ///
    /// Returns `None` (and leaves the stored vector untouched) when the user
    /// does not exist or when no interaction contributes weight.
    pub async fn calculate(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> RecsysResult<Option<Vec<f32>>> {
        if self.catalog.user(user_id).await?.is_none() {
            debug!(user_id, "Skipping preference vector for unknown user");
            return Ok(None);
        }

        let history = self.interactions.recent_for_user(user_id, limit).await?;
        if history.is_empty() {
            return Ok(None);
        }

        let item_ids: Vec<ItemId> = history.iter().map(|i| i.item_id).collect();
        let embeddings = self.vectors.item_embeddings(&item_ids).await?;

        let Some(vector) = weighted_average(&history, &embeddings) else {
            debug!(user_id, interactions = history.len(), "Interaction weight is zero");
            return Ok(None);
        };

        self.vectors
            .set_user_preference_vector(user_id, vector.clone())
            .await?;
        debug!(user_id, interactions = history.len(), "Preference vector stored");
        Ok(Some(vector))
    }

    /// Stored vector if present, otherwise a freshly computed one
    pub async fn preference_vector(&self, user: &User) -> RecsysResult<Option<Vec<f32>>> {
        if let Some(vector) = &user.preference_vector {
            return Ok(Some(vector.clone()));
        }
        self.calculate(user.id, self.interaction_limit).await
    }
}

/// `sum(embedding * score) / sum(score)` over interactions whose item has an
/// embedding. Interactions without one are not counted in the weight total.
pub fn weighted_average(
    interactions: &[Interaction],
    embeddings: &HashMap<ItemId, Vec<f32>>,
) -> Option<Vec<f32>> {
    let mut accumulated: Option<Array1<f32>> = None;
    let mut total_weight = 0.0f32;

    for interaction in interactions {
        let Some(embedding) = embeddings.get(&interaction.item_id) else {
            continue;
        };
        if embedding.is_empty() {
            continue;
        }

        let view = ArrayView1::from(embedding.as_slice());
        match accumulated.as_mut() {
            None => accumulated = Some(&view * interaction.score),
            Some(sum) if sum.len() == view.len() => sum.scaled_add(interaction.score, &view),
            Some(sum) => {
                warn!(
                    item_id = interaction.item_id,
                    expected = sum.len(),
                    actual = view.len(),
                    "Embedding dimension mismatch; interaction skipped"
                );
                continue;
            }
        }
        total_weight += interaction.score;
    }

    if total_weight.abs() <= f32::EPSILON {
        return None;
    }

    accumulated.map(|sum| (sum / total_weight).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InteractionType;
    use chrono::Utc;

    fn interaction(item_id: ItemId, kind: InteractionType, score: f32) -> Interaction {
        Interaction {
            id: item_id,
            user_id: 1,
            item_id,
            kind,
            score,
            duration: 0.0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_weighted_average_like_and_comment() {
        let history = vec![
            interaction(1, InteractionType::Like, 5.0),
            interaction(2, InteractionType::Comment, 3.0),
        ];
        let embeddings: HashMap<ItemId, Vec<f32>> =
            [(1, vec![1.0, 0.0]), (2, vec![0.0, 1.0])].into_iter().collect();

        let vector = weighted_average(&history, &embeddings).unwrap();
        assert!((vector[0] - 0.625).abs() < 1e-6);
        assert!((vector[1] - 0.375).abs() < 1e-6);
    }

    #[test]
    fn test_missing_embeddings_are_not_weighted() {
        let history = vec![
            interaction(1, InteractionType::Like, 5.0),
            interaction(2, InteractionType::Comment, 3.0),
        ];
        let embeddings: HashMap<ItemId, Vec<f32>> = [(1, vec![2.0, 4.0])].into_iter().collect();

        let vector = weighted_average(&history, &embeddings).unwrap();
        assert_eq!(vector, vec![2.0, 4.0]);
    }

    #[test]
    fn test_negative_signal_subtracts() {
        let history = vec![
            interaction(1, InteractionType::Like, 5.0),
            interaction(2, InteractionType::NotInterested, -5.0),
            interaction(3, InteractionType::Comment, 3.0),
        ];
        let embeddings: HashMap<ItemId, Vec<f32>> = [
            (1, vec![1.0, 0.0]),
            (2, vec![0.0, 1.0]),
            (3, vec![1.0, 1.0]),
        ]
        .into_iter()
        .collect();

        // (5*[1,0] - 5*[0,1] + 3*[1,1]) / 3 = [8/3, -2/3]
        let vector = weighted_average(&history, &embeddings).unwrap();
        assert!((vector[0] - 8.0 / 3.0).abs() < 1e-5);
        assert!((vector[1] + 2.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_total_weight_yields_none() {
        let history = vec![
            interaction(1, InteractionType::Like, 5.0),
            interaction(2, InteractionType::NotInterested, -5.0),
        ];
        let embeddings: HashMap<ItemId, Vec<f32>> =
            [(1, vec![1.0, 0.0]), (2, vec![0.0, 1.0])].into_iter().collect();

        assert!(weighted_average(&history, &embeddings).is_none());
        assert!(weighted_average(&history, &HashMap::new()).is_none());
    }
}
