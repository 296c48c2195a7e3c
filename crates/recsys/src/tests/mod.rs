//! Crate-level behaviour tests over the in-memory store

mod profile_test;
mod recommendation_test;

use crate::store::{MemoryStore, Stores};
use crate::types::{InteractionType, Item, ItemId, NewInteraction, User, UserId};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

fn item_with_embedding(id: ItemId, embedding: Vec<f32>, created_at: DateTime<Utc>) -> Item {
    let mut item = Item::new(id, "general", created_at);
    item.embedding = Some(embedding);
    item
}

fn interaction(
    user_id: UserId,
    item_id: ItemId,
    kind: InteractionType,
    at: DateTime<Utc>,
) -> NewInteraction {
    NewInteraction {
        user_id,
        item_id,
        kind,
        score: kind.score(0.0),
        duration: 0.0,
        created_at: at,
    }
}

/// Ten items on the unit circle, one user with no history
fn seeded_store() -> (Arc<MemoryStore>, Stores) {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    for id in 1..=10 {
        let angle = id as f32 * 0.3;
        store.insert_item(item_with_embedding(
            id,
            vec![angle.cos(), angle.sin()],
            now - Duration::days(id),
        ));
    }
    store.insert_user(User::new(1));
    let stores = Stores::shared(store.clone());
    (store, stores)
}
