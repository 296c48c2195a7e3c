//! Candidate exclusion, ranking weights and item similarity

use super::{interaction, seeded_store};
use crate::candidates::CandidateGenerator;
use crate::dispatch::NoopTrigger;
use crate::profile::UserVectorCalculator;
use crate::ranking::Ranker;
use crate::recommendation::RecommendationService;
use crate::store::{Catalog, InteractionLog, VectorStore};
use crate::types::{CandidateScores, InteractionType, Item, ItemId, Report, User};
use crate::RecsysConfig;
use chrono::Utc;
use njjc_core::math::similarity_from_distance;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[tokio::test]
async fn test_candidates_never_contain_excluded_items() {
    let (store, stores) = seeded_store();
    let mut user = User::new(1);
    user.cf_latent_vector = Some(vec![1.0, 0.0]);
    user.interested_categories = vec!["general".to_string()];
    store.insert_user(user.clone());
    store
        .write_cf_vectors(
            vec![(1, vec![1.0, 0.0])],
            (1..=10).map(|id| (id, vec![1.0, id as f32])).collect(),
        )
        .await
        .unwrap();

    let config = RecsysConfig::default();
    let calculator = Arc::new(UserVectorCalculator::new(&stores, 50));
    let generator = CandidateGenerator::new(&stores, calculator, &config);

    // Every subset of items 1..=6 plus a few ids that do not exist
    for mask in 0u32..64 {
        let mut exclusion: HashSet<ItemId> = (1..=6)
            .filter(|id| mask & (1u32 << (id - 1)) != 0)
            .collect();
        exclusion.extend([404, 405]);

        let candidates = generator.generate(&user, &exclusion).await.unwrap();
        assert!(candidates.keys().all(|id| !exclusion.contains(id)));
        assert_eq!(candidates.len(), 10 - exclusion.len() + 2);
    }
}

#[tokio::test]
async fn test_recently_seen_and_reported_items_are_filtered() {
    let (store, stores) = seeded_store();
    let now = Utc::now();
    store
        .append(interaction(1, 3, InteractionType::View, now))
        .await
        .unwrap();
    store
        .add_report(Report {
            user_id: 1,
            item_id: 5,
            reason: "offensive".to_string(),
            created_at: now,
        })
        .await
        .unwrap();

    let service =
        RecommendationService::new(stores, Arc::new(NoopTrigger), RecsysConfig::default());
    let feed = service.generate_recommendations(1).await.unwrap();
    let ids: HashSet<ItemId> = feed.iter().map(|r| r.item_id).collect();

    assert!(!ids.contains(&3));
    assert!(!ids.contains(&5));
    assert_eq!(ids.len(), 8);
}

#[test]
fn test_similarity_is_never_negative() {
    for distance in [0.0, 0.5, 1.0, 1.5, 2.0, f32::NAN, f32::INFINITY] {
        assert!(similarity_from_distance(distance) >= 0.0);
    }
}

#[test]
fn test_cold_user_has_zero_cf_weight() {
    let ranker = Ranker::default();
    let now = Utc::now();
    let user = User::new(1);

    let with_cf: BTreeMap<ItemId, CandidateScores> = [(
        1,
        CandidateScores {
            created_at: now,
            cf_score: Some(1.0),
            content_score: Some(0.4),
        },
    )]
    .into_iter()
    .collect();
    let without_cf: BTreeMap<ItemId, CandidateScores> = [(
        1,
        CandidateScores {
            created_at: now,
            cf_score: None,
            content_score: Some(0.4),
        },
    )]
    .into_iter()
    .collect();

    let a = ranker.rank(&user, &with_cf, now);
    let b = ranker.rank(&user, &without_cf, now);
    assert_eq!(a[0].score, b[0].score);
}

#[tokio::test]
async fn test_similar_items_for_item_without_embedding() {
    let (store, stores) = seeded_store();
    store.insert_item(Item::new(50, "general", Utc::now()));

    let service =
        RecommendationService::new(stores, Arc::new(NoopTrigger), RecsysConfig::default());
    assert!(service.similar_items(50, 20).await.unwrap().is_empty());

    let similar = service.similar_items(1, 3).await.unwrap();
    let ids: Vec<ItemId> = similar.iter().map(|s| s.item_id).collect();
    assert_eq!(ids, vec![2, 3, 4]);
}
