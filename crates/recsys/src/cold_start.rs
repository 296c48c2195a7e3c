//! Cold start and popularity candidates
//!
//! Users without a preference vector get recent items from the categories
//! they picked at signup, at a flat content score. Every request also pulls
//! the newest items overall so the pool is never empty.

use crate::error::RecsysResult;
use crate::store::Catalog;
use crate::types::{CandidateScores, ItemId, User};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

pub struct ColdStartSource {
    catalog: Arc<dyn Catalog>,
    category_limit: usize,
    popular_limit: usize,
    flat_score: f32,
}

impl ColdStartSource {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        category_limit: usize,
        popular_limit: usize,
        flat_score: f32,
    ) -> Self {
        Self {
            catalog,
            category_limit,
            popular_limit,
            flat_score,
        }
    }

    /// Newest items in the user's interested categories. A user with no
    /// categories gets nothing from this source.
    pub async fn category_candidates(
        &self,
        user: &User,
        exclude: &HashSet<ItemId>,
    ) -> RecsysResult<Vec<(ItemId, CandidateScores)>> {
        if user.interested_categories.is_empty() {
            debug!(user_id = user.id, "No interested categories for cold start");
            return Ok(Vec::new());
        }

        let items = self
            .catalog
            .recent_items(
                self.category_limit,
                Some(user.interested_categories.as_slice()),
                exclude,
            )
            .await?;

        Ok(items
            .into_iter()
            .map(|item| {
                let scores = CandidateScores {
                    content_score: Some(self.flat_score),
                    ..CandidateScores::unscored(item.created_at)
                };
                (item.id, scores)
            })
            .collect())
    }

    /// Newest items overall, without score fields
    pub async fn popular_candidates(
        &self,
        exclude: &HashSet<ItemId>,
    ) -> RecsysResult<Vec<(ItemId, CandidateScores)>> {
        let items = self
            .catalog
            .recent_items(self.popular_limit, None, exclude)
            .await?;

        Ok(items
            .into_iter()
            .map(|item| (item.id, CandidateScores::unscored(item.created_at)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::Item;
    use chrono::{Duration, Utc};

    fn store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        for (id, category, age) in [
            (1, "music", 5),
            (2, "games", 1),
            (3, "music", 2),
            (4, "news", 0),
        ] {
            store.insert_item(Item::new(id, category, now - Duration::days(age)));
        }
        store
    }

    #[tokio::test]
    async fn test_category_candidates_get_flat_score() {
        let source = ColdStartSource::new(store(), 30, 30, 0.5);
        let mut user = User::new(1);
        user.interested_categories = vec!["music".to_string()];

        let candidates = source
            .category_candidates(&user, &HashSet::new())
            .await
            .unwrap();
        let ids: Vec<ItemId> = candidates.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert!(candidates.iter().all(|(_, s)| s.content_score == Some(0.5)));
    }

    #[tokio::test]
    async fn test_no_categories_means_no_cold_start_items() {
        let source = ColdStartSource::new(store(), 30, 30, 0.5);
        let candidates = source
            .category_candidates(&User::new(1), &HashSet::new())
            .await
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_popular_candidates_are_newest_and_unscored() {
        let source = ColdStartSource::new(store(), 30, 2, 0.5);
        let exclude: HashSet<ItemId> = [4].into_iter().collect();

        let candidates = source.popular_candidates(&exclude).await.unwrap();
        let ids: Vec<ItemId> = candidates.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(candidates
            .iter()
            .all(|(_, s)| s.cf_score.is_none() && s.content_score.is_none()));
    }
}
