//! Content-based retrieval
//!
//! Ranks items by cosine distance between their content embedding and a
//! query vector: the user's preference vector for candidates, or another
//! item's embedding for "more like this".

use crate::error::RecsysResult;
use crate::store::{Catalog, VectorSpace, VectorStore};
use crate::types::{CandidateScores, ItemId, ScoredItem};
use njjc_core::math::similarity_from_distance;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

pub struct ContentSource {
    catalog: Arc<dyn Catalog>,
    vectors: Arc<dyn VectorStore>,
    limit: usize,
}

impl ContentSource {
    pub fn new(catalog: Arc<dyn Catalog>, vectors: Arc<dyn VectorStore>, limit: usize) -> Self {
        Self {
            catalog,
            vectors,
            limit,
        }
    }

    /// Items nearest to a preference vector, `content_score = max(0, 1 - d)`
    pub async fn candidates(
        &self,
        preference: &[f32],
        exclude: &HashSet<ItemId>,
    ) -> RecsysResult<Vec<(ItemId, CandidateScores)>> {
        let neighbors = self
            .vectors
            .nearest_items(VectorSpace::Content, preference, self.limit, exclude)
            .await?;

        Ok(neighbors
            .into_iter()
            .map(|n| {
                let scores = CandidateScores {
                    content_score: Some(similarity_from_distance(n.distance)),
                    ..CandidateScores::unscored(n.created_at)
                };
                (n.item_id, scores)
            })
            .collect())
    }

    /// Nearest content neighbours of `item_id`, never including the item.
    ///
    /// An unknown item or one without an embedding yields an empty list.
    pub async fn similar_items(
        &self,
        item_id: ItemId,
        limit: usize,
    ) -> RecsysResult<Vec<ScoredItem>> {
        let Some(item) = self.catalog.item(item_id).await? else {
            debug!(item_id, "Similar items requested for unknown item");
            return Ok(Vec::new());
        };
        let Some(embedding) = item.embedding else {
            debug!(item_id, "Item has no embedding yet");
            return Ok(Vec::new());
        };

        let exclude: HashSet<ItemId> = [item_id].into_iter().collect();
        let neighbors = self
            .vectors
            .nearest_items(VectorSpace::Content, &embedding, limit, &exclude)
            .await?;

        Ok(neighbors
            .into_iter()
            .map(|n| ScoredItem {
                item_id: n.item_id,
                similarity: similarity_from_distance(n.distance),
            })
            .collect())
    }
}
