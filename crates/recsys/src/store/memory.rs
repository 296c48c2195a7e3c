//! In-process store backend
//!
//! Implements every storage trait over concurrent maps with exact cosine
//! distance. Used by tests and by single-node deployments that keep the
//! catalog in memory.

use super::{Catalog, InteractionLog, Neighbor, VectorSpace, VectorStore};
use crate::error::{RecsysError, RecsysResult};
use crate::types::{
    CategoryId, Interaction, InteractionId, InteractionType, Item, ItemId, ItemSummary,
    NewInteraction, Report, User, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use njjc_core::math::cosine_distance;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct InteractionTable {
    rows: Vec<Interaction>,
    next_id: InteractionId,
}

impl InteractionTable {
    fn insert(&mut self, new: NewInteraction) -> Interaction {
        self.next_id += 1;
        let interaction = Interaction {
            id: self.next_id,
            user_id: new.user_id,
            item_id: new.item_id,
            kind: new.kind,
            score: new.score,
            duration: new.duration,
            created_at: new.created_at,
        };
        self.rows.push(interaction.clone());
        interaction
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<UserId, User>,
    items: DashMap<ItemId, Item>,
    reports: DashMap<UserId, Vec<Report>>,
    interactions: RwLock<InteractionTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn insert_item(&self, item: Item) {
        self.items.insert(item.id, item);
    }

    /// Copy of the full interaction log in insertion order
    pub async fn interactions(&self) -> Vec<Interaction> {
        self.interactions.read().await.rows.clone()
    }

    fn vector_of(item: &Item, space: VectorSpace) -> Option<&Vec<f32>> {
        match space {
            VectorSpace::Content => item.embedding.as_ref(),
            VectorSpace::Collaborative => item.cf_latent_vector.as_ref(),
        }
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn item_embeddings(
        &self,
        item_ids: &[ItemId],
    ) -> RecsysResult<HashMap<ItemId, Vec<f32>>> {
        Ok(item_ids
            .iter()
            .filter_map(|id| {
                self.items
                    .get(id)
                    .and_then(|item| item.embedding.clone().map(|e| (*id, e)))
            })
            .collect())
    }

    async fn set_user_preference_vector(
        &self,
        user_id: UserId,
        vector: Vec<f32>,
    ) -> RecsysResult<()> {
        let mut user = self
            .users
            .get_mut(&user_id)
            .ok_or_else(|| RecsysError::Storage(format!("user {} not found", user_id)))?;
        user.preference_vector = Some(vector);
        Ok(())
    }

    async fn set_item_embedding(&self, item_id: ItemId, vector: Vec<f32>) -> RecsysResult<()> {
        let mut item = self
            .items
            .get_mut(&item_id)
            .ok_or_else(|| RecsysError::Storage(format!("item {} not found", item_id)))?;
        item.embedding = Some(vector);
        Ok(())
    }

    async fn write_cf_vectors(
        &self,
        users: Vec<(UserId, Vec<f32>)>,
        items: Vec<(ItemId, Vec<f32>)>,
    ) -> RecsysResult<()> {
        for (user_id, vector) in users {
            if let Some(mut user) = self.users.get_mut(&user_id) {
                user.cf_latent_vector = Some(vector);
            }
        }
        for (item_id, vector) in items {
            if let Some(mut item) = self.items.get_mut(&item_id) {
                item.cf_latent_vector = Some(vector);
            }
        }
        Ok(())
    }

    async fn nearest_items(
        &self,
        space: VectorSpace,
        query: &[f32],
        limit: usize,
        exclude: &HashSet<ItemId>,
    ) -> RecsysResult<Vec<Neighbor>> {
        let mut neighbors: Vec<Neighbor> = self
            .items
            .iter()
            .filter(|entry| !exclude.contains(entry.key()))
            .filter_map(|entry| {
                let item = entry.value();
                let vector = Self::vector_of(item, space)?;
                // A vector of another width cannot be compared
                if vector.len() != query.len() {
                    return None;
                }
                Some(Neighbor {
                    item_id: item.id,
                    created_at: item.created_at,
                    distance: cosine_distance(query, vector),
                })
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.item_id.cmp(&b.item_id))
        });
        neighbors.truncate(limit);
        Ok(neighbors)
    }
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn user(&self, user_id: UserId) -> RecsysResult<Option<User>> {
        Ok(self.users.get(&user_id).map(|u| u.value().clone()))
    }

    async fn item(&self, item_id: ItemId) -> RecsysResult<Option<Item>> {
        Ok(self.items.get(&item_id).map(|i| i.value().clone()))
    }

    async fn recent_items(
        &self,
        limit: usize,
        categories: Option<&[CategoryId]>,
        exclude: &HashSet<ItemId>,
    ) -> RecsysResult<Vec<ItemSummary>> {
        let mut summaries: Vec<ItemSummary> = self
            .items
            .iter()
            .filter(|entry| !exclude.contains(entry.key()))
            .filter(|entry| categories.map_or(true, |c| c.contains(&entry.value().category)))
            .map(|entry| entry.value().summary())
            .collect();

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        summaries.truncate(limit);
        Ok(summaries)
    }

    async fn reported_items(&self, user_id: UserId) -> RecsysResult<HashSet<ItemId>> {
        Ok(self
            .reports
            .get(&user_id)
            .map(|reports| reports.iter().map(|r| r.item_id).collect())
            .unwrap_or_default())
    }

    async fn add_report(&self, report: Report) -> RecsysResult<()> {
        self.reports.entry(report.user_id).or_default().push(report);
        Ok(())
    }

    async fn items_missing_embedding(&self, limit: usize) -> RecsysResult<Vec<Item>> {
        let mut items: Vec<Item> = self
            .items
            .iter()
            .filter(|entry| entry.value().embedding.is_none())
            .map(|entry| entry.value().clone())
            .collect();
        items.sort_by_key(|item| item.id);
        items.truncate(limit);
        Ok(items)
    }
}

#[async_trait]
impl InteractionLog for MemoryStore {
    async fn append(&self, interaction: NewInteraction) -> RecsysResult<Interaction> {
        Ok(self.interactions.write().await.insert(interaction))
    }

    async fn append_like(
        &self,
        user_id: UserId,
        item_id: ItemId,
        score: f32,
        at: DateTime<Utc>,
    ) -> RecsysResult<Option<Interaction>> {
        let mut table = self.interactions.write().await;
        let exists = table.rows.iter().any(|i| {
            i.user_id == user_id && i.item_id == item_id && i.kind == InteractionType::Like
        });
        if exists {
            return Ok(None);
        }

        Ok(Some(table.insert(NewInteraction {
            user_id,
            item_id,
            kind: InteractionType::Like,
            score,
            duration: 0.0,
            created_at: at,
        })))
    }

    async fn delete_likes(&self, user_id: UserId, item_id: ItemId) -> RecsysResult<u64> {
        let mut table = self.interactions.write().await;
        let before = table.rows.len();
        table.rows.retain(|i| {
            !(i.user_id == user_id && i.item_id == item_id && i.kind == InteractionType::Like)
        });
        Ok((before - table.rows.len()) as u64)
    }

    async fn recent_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> RecsysResult<Vec<Interaction>> {
        let table = self.interactions.read().await;
        let mut rows: Vec<Interaction> = table
            .rows
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn items_since(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> RecsysResult<HashSet<ItemId>> {
        let table = self.interactions.read().await;
        Ok(table
            .rows
            .iter()
            .filter(|i| i.user_id == user_id && i.created_at >= since)
            .map(|i| i.item_id)
            .collect())
    }

    async fn count(
        &self,
        user_id: UserId,
        item_id: ItemId,
        kind: InteractionType,
    ) -> RecsysResult<usize> {
        let table = self.interactions.read().await;
        Ok(table
            .rows
            .iter()
            .filter(|i| i.user_id == user_id && i.item_id == item_id && i.kind == kind)
            .count())
    }

    async fn all_scores(&self) -> RecsysResult<Vec<(UserId, ItemId, f32)>> {
        let table = self.interactions.read().await;
        Ok(table
            .rows
            .iter()
            .map(|i| (i.user_id, i.item_id, i.score))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(id: ItemId, category: &str, age_days: i64, embedding: Option<Vec<f32>>) -> Item {
        let mut item = Item::new(id, category, Utc::now() - Duration::days(age_days));
        item.embedding = embedding;
        item
    }

    #[tokio::test]
    async fn test_nearest_items_orders_by_distance_and_skips_excluded() {
        let store = MemoryStore::new();
        store.insert_item(item(1, "a", 0, Some(vec![1.0, 0.0])));
        store.insert_item(item(2, "a", 0, Some(vec![0.0, 1.0])));
        store.insert_item(item(3, "a", 0, Some(vec![1.0, 0.1])));
        store.insert_item(item(4, "a", 0, None));
        store.insert_item(item(5, "a", 0, Some(vec![1.0, 0.0, 0.0])));

        let exclude: HashSet<ItemId> = [1].into_iter().collect();
        let neighbors = store
            .nearest_items(VectorSpace::Content, &[1.0, 0.0], 10, &exclude)
            .await
            .unwrap();

        let ids: Vec<ItemId> = neighbors.iter().map(|n| n.item_id).collect();
        assert_eq!(ids, vec![3, 2]);
        assert!(neighbors[0].distance < neighbors[1].distance);
    }

    #[tokio::test]
    async fn test_recent_items_filters_categories() {
        let store = MemoryStore::new();
        store.insert_item(item(1, "cats", 3, None));
        store.insert_item(item(2, "dogs", 1, None));
        store.insert_item(item(3, "cats", 0, None));

        let categories = vec!["cats".to_string()];
        let recent = store
            .recent_items(10, Some(categories.as_slice()), &HashSet::new())
            .await
            .unwrap();
        let ids: Vec<ItemId> = recent.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 1]);

        let all = store.recent_items(2, None, &HashSet::new()).await.unwrap();
        assert_eq!(all.iter().map(|s| s.id).collect::<Vec<_>>(), vec![3, 2]);
    }

    #[tokio::test]
    async fn test_append_like_is_unique_per_pair() {
        let store = MemoryStore::new();
        let now = Utc::now();

        assert!(store.append_like(1, 10, 5.0, now).await.unwrap().is_some());
        assert!(store.append_like(1, 10, 5.0, now).await.unwrap().is_none());
        assert_eq!(store.count(1, 10, InteractionType::Like).await.unwrap(), 1);

        assert_eq!(store.delete_likes(1, 10).await.unwrap(), 1);
        assert_eq!(store.count(1, 10, InteractionType::Like).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_vector_for_unknown_user_fails() {
        let store = MemoryStore::new();
        let result = store.set_user_preference_vector(42, vec![1.0]).await;
        assert!(matches!(result, Err(RecsysError::Storage(_))));
    }
}
