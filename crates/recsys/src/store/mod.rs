//! Storage seams consumed by the recommendation core
//!
//! The web/storage layer owns the records; the recommender reaches them
//! through three traits so that the PostgreSQL backend and the in-memory
//! backend are interchangeable.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::RecsysResult;
use crate::types::{
    CategoryId, Interaction, InteractionType, Item, ItemId, ItemSummary, NewInteraction, Report,
    User, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Which vector column a similarity query runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorSpace {
    /// Item content embedding (dimension D_c)
    Content,
    /// Collaborative latent vector (dimension D_f)
    Collaborative,
}

/// Result row of a nearest-neighbour query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub item_id: ItemId,
    pub created_at: DateTime<Utc>,
    /// Cosine distance to the query vector
    pub distance: f32,
}

/// Persisted user and item vectors plus cosine top-K retrieval
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Content embeddings of the given items; items without one are absent.
    async fn item_embeddings(
        &self,
        item_ids: &[ItemId],
    ) -> RecsysResult<HashMap<ItemId, Vec<f32>>>;

    async fn set_user_preference_vector(&self, user_id: UserId, vector: Vec<f32>)
        -> RecsysResult<()>;

    async fn set_item_embedding(&self, item_id: ItemId, vector: Vec<f32>) -> RecsysResult<()>;

    /// Overwrite collaborative vectors in bulk
    async fn write_cf_vectors(
        &self,
        users: Vec<(UserId, Vec<f32>)>,
        items: Vec<(ItemId, Vec<f32>)>,
    ) -> RecsysResult<()>;

    /// Items with a non-null vector in `space`, ascending cosine distance to
    /// `query`, skipping anything in `exclude`.
    async fn nearest_items(
        &self,
        space: VectorSpace,
        query: &[f32],
        limit: usize,
        exclude: &HashSet<ItemId>,
    ) -> RecsysResult<Vec<Neighbor>>;
}

/// Read/write access to users, items and reports
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn user(&self, user_id: UserId) -> RecsysResult<Option<User>>;

    async fn item(&self, item_id: ItemId) -> RecsysResult<Option<Item>>;

    /// Newest items first, optionally restricted to `categories`
    async fn recent_items(
        &self,
        limit: usize,
        categories: Option<&[CategoryId]>,
        exclude: &HashSet<ItemId>,
    ) -> RecsysResult<Vec<ItemSummary>>;

    async fn reported_items(&self, user_id: UserId) -> RecsysResult<HashSet<ItemId>>;

    async fn add_report(&self, report: Report) -> RecsysResult<()>;

    async fn items_missing_embedding(&self, limit: usize) -> RecsysResult<Vec<Item>>;
}

/// Append-only interaction history
#[async_trait]
pub trait InteractionLog: Send + Sync {
    async fn append(&self, interaction: NewInteraction) -> RecsysResult<Interaction>;

    /// Insert a LIKE unless one already exists for the pair. The check and the
    /// insert are atomic; `None` means a LIKE was already present.
    async fn append_like(
        &self,
        user_id: UserId,
        item_id: ItemId,
        score: f32,
        at: DateTime<Utc>,
    ) -> RecsysResult<Option<Interaction>>;

    /// Remove every LIKE for the pair, returning how many were deleted
    async fn delete_likes(&self, user_id: UserId, item_id: ItemId) -> RecsysResult<u64>;

    /// Most recent first; equal timestamps ordered by id descending
    async fn recent_for_user(&self, user_id: UserId, limit: usize)
        -> RecsysResult<Vec<Interaction>>;

    async fn items_since(&self, user_id: UserId, since: DateTime<Utc>)
        -> RecsysResult<HashSet<ItemId>>;

    async fn count(
        &self,
        user_id: UserId,
        item_id: ItemId,
        kind: InteractionType,
    ) -> RecsysResult<usize>;

    /// Every (user, item, score) triple in the log
    async fn all_scores(&self) -> RecsysResult<Vec<(UserId, ItemId, f32)>>;
}

/// Bundle of store handles injected into the engine components
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn Catalog>,
    pub interactions: Arc<dyn InteractionLog>,
    pub vectors: Arc<dyn VectorStore>,
}

impl Stores {
    /// Use one backend for all three roles
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: Catalog + InteractionLog + VectorStore + 'static,
    {
        Self {
            catalog: store.clone(),
            interactions: store.clone(),
            vectors: store,
        }
    }
}
