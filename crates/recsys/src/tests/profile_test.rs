//! Preference vector recomputation

use super::{interaction, item_with_embedding, seeded_store};
use crate::profile::UserVectorCalculator;
use crate::store::{Catalog, InteractionLog, MemoryStore, Stores};
use crate::types::{InteractionType, User};
use chrono::{Duration, Utc};
use std::sync::Arc;

#[tokio::test]
async fn test_user_without_history_keeps_stored_vector() {
    let (store, stores) = seeded_store();
    let mut user = User::new(2);
    user.preference_vector = Some(vec![0.3, 0.4]);
    store.insert_user(user);

    let calculator = UserVectorCalculator::new(&stores, 50);
    assert!(calculator.recompute(2).await.unwrap().is_none());

    let stored = store.user(2).await.unwrap().unwrap();
    assert_eq!(stored.preference_vector, Some(vec![0.3, 0.4]));
}

#[tokio::test]
async fn test_unknown_user_is_a_no_op() {
    let (_store, stores) = seeded_store();
    let calculator = UserVectorCalculator::new(&stores, 50);
    assert!(calculator.recompute(999).await.unwrap().is_none());
}

#[tokio::test]
async fn test_like_and_comment_blend() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    store.insert_item(item_with_embedding(1, vec![1.0, 0.0], now));
    store.insert_item(item_with_embedding(2, vec![0.0, 1.0], now));
    store.insert_user(User::new(1));

    store
        .append(interaction(1, 1, InteractionType::Like, now))
        .await
        .unwrap();
    store
        .append(interaction(1, 2, InteractionType::Comment, now))
        .await
        .unwrap();

    let calculator = UserVectorCalculator::new(&Stores::shared(store.clone()), 50);
    let vector = calculator.recompute(1).await.unwrap().unwrap();
    assert!((vector[0] - 0.625).abs() < 1e-6);
    assert!((vector[1] - 0.375).abs() < 1e-6);

    let stored = store.user(1).await.unwrap().unwrap();
    assert_eq!(stored.preference_vector, Some(vector));
}

#[tokio::test]
async fn test_recompute_is_idempotent() {
    let (store, stores) = seeded_store();
    let now = Utc::now();
    for (item_id, kind) in [
        (1, InteractionType::Like),
        (4, InteractionType::View),
        (7, InteractionType::NotInterested),
        (9, InteractionType::Comment),
    ] {
        store
            .append(interaction(1, item_id, kind, now - Duration::minutes(item_id)))
            .await
            .unwrap();
    }

    let calculator = UserVectorCalculator::new(&stores, 50);
    let first = calculator.recompute(1).await.unwrap().unwrap();
    let second = calculator.recompute(1).await.unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(
        store.user(1).await.unwrap().unwrap().preference_vector,
        Some(second)
    );
}

#[tokio::test]
async fn test_only_most_recent_interactions_count() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    store.insert_item(item_with_embedding(1, vec![1.0, 0.0], now));
    store.insert_item(item_with_embedding(2, vec![0.0, 1.0], now));
    store.insert_user(User::new(1));

    store
        .append(interaction(1, 1, InteractionType::Like, now - Duration::hours(2)))
        .await
        .unwrap();
    store
        .append(interaction(1, 2, InteractionType::Like, now))
        .await
        .unwrap();

    let calculator = UserVectorCalculator::new(&Stores::shared(store), 1);
    let vector = calculator.recompute(1).await.unwrap().unwrap();
    assert_eq!(vector, vec![0.0, 1.0]);
}
