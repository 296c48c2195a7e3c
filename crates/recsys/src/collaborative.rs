//! Collaborative candidate source
//!
//! Nearest items to the user's collaborative latent vector, produced by the
//! SVD trainer. Users the trainer has never seen contribute nothing here.

use crate::error::RecsysResult;
use crate::store::{VectorSpace, VectorStore};
use crate::types::{CandidateScores, ItemId, User};
use njjc_core::math::similarity_from_distance;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

pub struct CollaborativeSource {
    vectors: Arc<dyn VectorStore>,
    limit: usize,
}

impl CollaborativeSource {
    pub fn new(vectors: Arc<dyn VectorStore>, limit: usize) -> Self {
        Self { vectors, limit }
    }

    /// Top items by latent-space similarity, `cf_score = max(0, 1 - d)`
    pub async fn candidates(
        &self,
        user: &User,
        exclude: &HashSet<ItemId>,
    ) -> RecsysResult<Vec<(ItemId, CandidateScores)>> {
        let Some(latent) = user.cf_latent_vector.as_deref() else {
            return Ok(Vec::new());
        };

        let neighbors = self
            .vectors
            .nearest_items(VectorSpace::Collaborative, latent, self.limit, exclude)
            .await?;
        debug!(user_id = user.id, count = neighbors.len(), "Collaborative candidates");

        Ok(neighbors
            .into_iter()
            .map(|n| {
                let scores = CandidateScores {
                    cf_score: Some(similarity_from_distance(n.distance)),
                    ..CandidateScores::unscored(n.created_at)
                };
                (n.item_id, scores)
            })
            .collect())
    }
}
