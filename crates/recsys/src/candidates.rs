//! Candidate generation
//!
//! Pulls candidates from up to three sources and merges them by item id:
//!
//! 1. collaborative neighbours of the user's latent vector;
//! 2. content neighbours of the preference vector, or cold-start category
//!    items when the user has no preference vector;
//! 3. the newest items overall, which only fill gaps.
//!
//! Earlier sources win: a later source only fills score fields that are
//! still empty. Every source is handed the exclusion set.

use crate::cold_start::ColdStartSource;
use crate::collaborative::CollaborativeSource;
use crate::content_based::ContentSource;
use crate::error::RecsysResult;
use crate::profile::UserVectorCalculator;
use crate::store::{Catalog, InteractionLog, Stores};
use crate::types::{CandidateScores, ItemId, User, UserId};
use crate::RecsysConfig;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Candidate pool keyed by item id; iteration order is ascending id
pub type Candidates = BTreeMap<ItemId, CandidateScores>;

pub struct CandidateGenerator {
    catalog: Arc<dyn Catalog>,
    interactions: Arc<dyn InteractionLog>,
    calculator: Arc<UserVectorCalculator>,
    collaborative: CollaborativeSource,
    content: ContentSource,
    cold_start: ColdStartSource,
    /// `None` when the configured window does not fit in a `Duration`
    soft_exclusion: Option<Duration>,
}

impl CandidateGenerator {
    pub fn new(
        stores: &Stores,
        calculator: Arc<UserVectorCalculator>,
        config: &RecsysConfig,
    ) -> Self {
        Self {
            catalog: stores.catalog.clone(),
            interactions: stores.interactions.clone(),
            calculator,
            collaborative: CollaborativeSource::new(stores.vectors.clone(), config.cf_candidates),
            content: ContentSource::new(
                stores.catalog.clone(),
                stores.vectors.clone(),
                config.content_candidates,
            ),
            cold_start: ColdStartSource::new(
                stores.catalog.clone(),
                config.cold_start_candidates,
                config.popular_candidates,
                config.cold_start_score,
            ),
            soft_exclusion: Duration::try_days(config.soft_exclusion_days),
        }
    }

    pub fn content_source(&self) -> &ContentSource {
        &self.content
    }

    /// Reported items plus anything the user touched in the soft window
    pub async fn exclusion_set(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> RecsysResult<HashSet<ItemId>> {
        let mut excluded = self.catalog.reported_items(user_id).await?;
        let recent = self
            .interactions
            .items_since(user_id, self.soft_window_start(now))
            .await?;
        excluded.extend(recent);
        Ok(excluded)
    }

    /// Start of the soft exclusion window. A window reaching past the
    /// representable range covers the whole history.
    fn soft_window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self
            .soft_exclusion
            .and_then(|window| now.checked_sub_signed(window))
        {
            Some(since) => since.max(DateTime::<Utc>::UNIX_EPOCH),
            None => {
                warn!("Soft exclusion window out of range; excluding all history");
                DateTime::<Utc>::UNIX_EPOCH
            }
        }
    }

    /// Merged candidate pool. A source that fails is logged and skipped.
    pub async fn generate(
        &self,
        user: &User,
        exclusion: &HashSet<ItemId>,
    ) -> RecsysResult<Candidates> {
        let mut candidates = Candidates::new();

        match self.collaborative.candidates(user, exclusion).await {
            Ok(batch) => merge(&mut candidates, batch),
            Err(e) => warn!(user_id = user.id, error = %e, "Collaborative source failed"),
        }

        let preference = match self.calculator.preference_vector(user).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(user_id = user.id, error = %e, "Preference vector unavailable");
                None
            }
        };

        let personal = match preference {
            Some(vector) => self.content.candidates(&vector, exclusion).await,
            None => {
                debug!(user_id = user.id, "Cold start candidates");
                self.cold_start.category_candidates(user, exclusion).await
            }
        };
        match personal {
            Ok(batch) => merge(&mut candidates, batch),
            Err(e) => warn!(user_id = user.id, error = %e, "Content source failed"),
        }

        match self.cold_start.popular_candidates(exclusion).await {
            Ok(batch) => merge(&mut candidates, batch),
            Err(e) => warn!(user_id = user.id, error = %e, "Popularity source failed"),
        }

        debug!(
            user_id = user.id,
            candidates = candidates.len(),
            excluded = exclusion.len(),
            "Candidates generated"
        );
        Ok(candidates)
    }
}

/// Add a source's batch; existing entries only gain missing fields
pub fn merge(candidates: &mut Candidates, batch: Vec<(ItemId, CandidateScores)>) {
    for (item_id, scores) in batch {
        candidates
            .entry(item_id)
            .and_modify(|existing| existing.fill_missing(&scores))
            .or_insert(scores);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{InteractionType, Item, NewInteraction, Report};

    fn generator(store: Arc<MemoryStore>) -> CandidateGenerator {
        let stores = Stores::shared(store);
        let config = RecsysConfig::default();
        let calculator = Arc::new(UserVectorCalculator::new(
            &stores,
            config.recent_interaction_limit,
        ));
        CandidateGenerator::new(&stores, calculator, &config)
    }

    #[test]
    fn test_merge_keeps_first_score() {
        let now = Utc::now();
        let mut candidates = Candidates::new();
        merge(
            &mut candidates,
            vec![(
                1,
                CandidateScores {
                    cf_score: Some(0.8),
                    ..CandidateScores::unscored(now)
                },
            )],
        );
        merge(
            &mut candidates,
            vec![
                (
                    1,
                    CandidateScores {
                        cf_score: Some(0.1),
                        content_score: Some(0.5),
                        created_at: now,
                    },
                ),
                (2, CandidateScores::unscored(now)),
            ],
        );

        assert_eq!(candidates[&1].cf_score, Some(0.8));
        assert_eq!(candidates[&1].content_score, Some(0.5));
        assert_eq!(candidates.len(), 2);
    }

    #[tokio::test]
    async fn test_exclusion_set_combines_reports_and_recent_history() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        store
            .add_report(Report {
                user_id: 1,
                item_id: 10,
                reason: "spam".to_string(),
                created_at: now - Duration::days(400),
            })
            .await
            .unwrap();
        for (item_id, age) in [(11, 2), (12, 8)] {
            store
                .append(NewInteraction {
                    user_id: 1,
                    item_id,
                    kind: InteractionType::View,
                    score: 1.0,
                    duration: 0.0,
                    created_at: now - Duration::days(age),
                })
                .await
                .unwrap();
        }

        let excluded = generator(store).exclusion_set(1, now).await.unwrap();
        assert!(excluded.contains(&10));
        assert!(excluded.contains(&11));
        assert!(!excluded.contains(&12));
    }

    #[tokio::test]
    async fn test_oversized_window_excludes_whole_history() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store
            .append(NewInteraction {
                user_id: 1,
                item_id: 20,
                kind: InteractionType::View,
                score: 1.0,
                duration: 0.0,
                created_at: now - Duration::days(5000),
            })
            .await
            .unwrap();

        let stores = Stores::shared(store);
        let config = RecsysConfig {
            soft_exclusion_days: 1_000_000_000,
            ..RecsysConfig::default()
        };
        let calculator = Arc::new(UserVectorCalculator::new(
            &stores,
            config.recent_interaction_limit,
        ));
        let generator = CandidateGenerator::new(&stores, calculator, &config);

        let excluded = generator.exclusion_set(1, now).await.unwrap();
        assert_eq!(excluded, HashSet::from([20]));
    }

    #[tokio::test]
    async fn test_cold_user_gets_category_and_popular_items() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store.insert_item(Item::new(1, "music", now - Duration::days(3)));
        store.insert_item(Item::new(2, "games", now - Duration::days(1)));

        let mut user = User::new(5);
        user.interested_categories = vec!["music".to_string()];
        store.insert_user(user.clone());

        let candidates = generator(store)
            .generate(&user, &HashSet::new())
            .await
            .unwrap();

        assert_eq!(candidates[&1].content_score, Some(0.5));
        assert_eq!(candidates[&2].content_score, None);
        assert!(candidates.values().all(|s| s.cf_score.is_none()));
    }
}
