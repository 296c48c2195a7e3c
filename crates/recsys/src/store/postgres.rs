//! PostgreSQL store backed by the pgvector extension
//!
//! Expected tables (owned and migrated by the web layer):
//!
//! - `accounts_user (id, preference_vector vector(768), cf_latent_vector vector(64))`
//! - `accounts_user_interested_categories (user_id, category_id)`
//! - `posts_post (id, category_id, title, content, embedding vector(768),
//!   cf_latent_vector vector(64), created_at)`
//! - `posts_userinteraction (id, user_id, post_id, interaction_type, score, duration, created_at)`
//! - `posts_report (id, user_id, post_id, reason, created_at)`
//!
//! Vectors are sent as pgvector text literals and read back as `real[]`.
//! `append_like` holds a transaction-scoped advisory lock on the (user, post)
//! pair, so concurrent likes from this store never insert twice. No unique
//! index is required (PostgreSQL 11 or later for `hashtextextended`).

use super::{Catalog, InteractionLog, Neighbor, VectorSpace, VectorStore};
use crate::error::{RecsysError, RecsysResult};
use crate::types::{
    CategoryId, Interaction, InteractionType, Item, ItemId, ItemSummary, NewInteraction, Report,
    User, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::{HashMap, HashSet};
use tracing::debug;

const LIKE_LOCK: &str =
    "SELECT pg_advisory_xact_lock(hashtextextended($1::text || ':' || $2::text, 0))";

const INTERACTION_COLUMNS: &str =
    "id, user_id, post_id, interaction_type, score, duration, created_at";

/// pgvector text representation: `[0.1,0.2,0.3]`
pub fn vector_literal(vector: &[f32]) -> String {
    let parts: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

fn vector_column(space: VectorSpace) -> &'static str {
    match space {
        VectorSpace::Content => "embedding",
        VectorSpace::Collaborative => "cf_latent_vector",
    }
}

fn interaction_from_row(row: &PgRow) -> RecsysResult<Interaction> {
    let kind: String = row.try_get("interaction_type")?;
    let score: f64 = row.try_get("score")?;
    let duration: Option<f64> = row.try_get("duration")?;

    Ok(Interaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        item_id: row.try_get("post_id")?,
        kind: kind.parse()?,
        score: score as f32,
        duration: duration.unwrap_or(0.0) as f32,
        created_at: row.try_get("created_at")?,
    })
}

fn item_from_row(row: &PgRow) -> RecsysResult<Item> {
    Ok(Item {
        id: row.try_get("id")?,
        category: row.try_get("category_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        embedding: row.try_get("embedding")?,
        cf_latent_vector: row.try_get("cf_latent_vector")?,
        created_at: row.try_get("created_at")?,
    })
}

fn ids_of(exclude: &HashSet<ItemId>) -> Vec<ItemId> {
    exclude.iter().copied().collect()
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn write_vectors(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        table: &str,
        rows: Vec<(i64, Vec<f32>)>,
    ) -> RecsysResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let (ids, literals): (Vec<i64>, Vec<String>) = rows
            .into_iter()
            .map(|(id, vector)| (id, vector_literal(&vector)))
            .unzip();

        let sql = format!(
            r#"
            UPDATE {table} AS t
            SET cf_latent_vector = v.vec::vector
            FROM UNNEST($1::bigint[], $2::text[]) AS v(id, vec)
            WHERE t.id = v.id
            "#
        );
        let result = sqlx::query(&sql)
            .bind(ids)
            .bind(literals)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl VectorStore for PgStore {
    async fn item_embeddings(
        &self,
        item_ids: &[ItemId],
    ) -> RecsysResult<HashMap<ItemId, Vec<f32>>> {
        let rows = sqlx::query(
            r#"
            SELECT id, embedding::real[] AS embedding
            FROM posts_post
            WHERE id = ANY($1) AND embedding IS NOT NULL
            "#,
        )
        .bind(item_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> RecsysResult<(ItemId, Vec<f32>)> {
                Ok((r.try_get("id")?, r.try_get("embedding")?))
            })
            .collect()
    }

    async fn set_user_preference_vector(
        &self,
        user_id: UserId,
        vector: Vec<f32>,
    ) -> RecsysResult<()> {
        let result =
            sqlx::query("UPDATE accounts_user SET preference_vector = $2::vector WHERE id = $1")
                .bind(user_id)
                .bind(vector_literal(&vector))
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RecsysError::Storage(format!("user {} not found", user_id)));
        }
        Ok(())
    }

    async fn set_item_embedding(&self, item_id: ItemId, vector: Vec<f32>) -> RecsysResult<()> {
        let result = sqlx::query("UPDATE posts_post SET embedding = $2::vector WHERE id = $1")
            .bind(item_id)
            .bind(vector_literal(&vector))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RecsysError::Storage(format!("item {} not found", item_id)));
        }
        Ok(())
    }

    async fn write_cf_vectors(
        &self,
        users: Vec<(UserId, Vec<f32>)>,
        items: Vec<(ItemId, Vec<f32>)>,
    ) -> RecsysResult<()> {
        let mut tx = self.pool.begin().await?;
        let users_updated = self.write_vectors(&mut tx, "accounts_user", users).await?;
        let items_updated = self.write_vectors(&mut tx, "posts_post", items).await?;
        tx.commit().await?;

        debug!(users_updated, items_updated, "Collaborative vectors written");
        Ok(())
    }

    async fn nearest_items(
        &self,
        space: VectorSpace,
        query: &[f32],
        limit: usize,
        exclude: &HashSet<ItemId>,
    ) -> RecsysResult<Vec<Neighbor>> {
        let column = vector_column(space);
        let sql = format!(
            r#"
            SELECT id, created_at, ({column} <=> $1::vector) AS distance
            FROM posts_post
            WHERE {column} IS NOT NULL AND NOT (id = ANY($2))
            ORDER BY {column} <=> $1::vector, id
            LIMIT $3
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(vector_literal(query))
            .bind(ids_of(exclude))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|r| -> RecsysResult<Neighbor> {
                let distance: f64 = r.try_get("distance")?;
                Ok(Neighbor {
                    item_id: r.try_get("id")?,
                    created_at: r.try_get("created_at")?,
                    distance: distance as f32,
                })
            })
            .collect()
    }
}

#[async_trait]
impl Catalog for PgStore {
    async fn user(&self, user_id: UserId) -> RecsysResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id,
                   preference_vector::real[] AS preference_vector,
                   cf_latent_vector::real[] AS cf_latent_vector
            FROM accounts_user
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let categories = sqlx::query(
            r#"
            SELECT category_id
            FROM accounts_user_interested_categories
            WHERE user_id = $1
            ORDER BY category_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(User {
            id: row.try_get("id")?,
            preference_vector: row.try_get("preference_vector")?,
            cf_latent_vector: row.try_get("cf_latent_vector")?,
            interested_categories: categories
                .iter()
                .map(|r| r.try_get::<CategoryId, _>("category_id"))
                .collect::<Result<Vec<CategoryId>, _>>()?,
        }))
    }

    async fn item(&self, item_id: ItemId) -> RecsysResult<Option<Item>> {
        let row = sqlx::query(
            r#"
            SELECT id, category_id, title, content,
                   embedding::real[] AS embedding,
                   cf_latent_vector::real[] AS cf_latent_vector,
                   created_at
            FROM posts_post
            WHERE id = $1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn recent_items(
        &self,
        limit: usize,
        categories: Option<&[CategoryId]>,
        exclude: &HashSet<ItemId>,
    ) -> RecsysResult<Vec<ItemSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, created_at
            FROM posts_post
            WHERE ($1::text[] IS NULL OR category_id = ANY($1))
              AND NOT (id = ANY($2))
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(categories.map(|c| c.to_vec()))
        .bind(ids_of(exclude))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> RecsysResult<ItemSummary> {
                Ok(ItemSummary {
                    id: r.try_get("id")?,
                    created_at: r.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn reported_items(&self, user_id: UserId) -> RecsysResult<HashSet<ItemId>> {
        let rows = sqlx::query("SELECT DISTINCT post_id FROM posts_report WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|r| r.try_get::<ItemId, _>("post_id").map_err(RecsysError::from))
            .collect()
    }

    async fn add_report(&self, report: Report) -> RecsysResult<()> {
        sqlx::query(
            r#"
            INSERT INTO posts_report (user_id, post_id, reason, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(report.user_id)
        .bind(report.item_id)
        .bind(&report.reason)
        .bind(report.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn items_missing_embedding(&self, limit: usize) -> RecsysResult<Vec<Item>> {
        let rows = sqlx::query(
            r#"
            SELECT id, category_id, title, content,
                   NULL::real[] AS embedding,
                   cf_latent_vector::real[] AS cf_latent_vector,
                   created_at
            FROM posts_post
            WHERE embedding IS NULL
            ORDER BY id
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }
}

#[async_trait]
impl InteractionLog for PgStore {
    async fn append(&self, interaction: NewInteraction) -> RecsysResult<Interaction> {
        let sql = format!(
            r#"
            INSERT INTO posts_userinteraction
                (user_id, post_id, interaction_type, score, duration, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {INTERACTION_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(interaction.user_id)
            .bind(interaction.item_id)
            .bind(interaction.kind.as_str())
            .bind(interaction.score as f64)
            .bind(interaction.duration as f64)
            .bind(interaction.created_at)
            .fetch_one(&self.pool)
            .await?;

        interaction_from_row(&row)
    }

    async fn append_like(
        &self,
        user_id: UserId,
        item_id: ItemId,
        score: f32,
        at: DateTime<Utc>,
    ) -> RecsysResult<Option<Interaction>> {
        let mut tx = self.pool.begin().await?;

        // Serializes likes on the same (user, post) pair until commit
        sqlx::query(LIKE_LOCK)
            .bind(user_id)
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        let sql = format!(
            r#"
            INSERT INTO posts_userinteraction
                (user_id, post_id, interaction_type, score, duration, created_at)
            SELECT $1, $2, 'LIKE', $3, 0, $4
            WHERE NOT EXISTS (
                SELECT 1 FROM posts_userinteraction
                WHERE user_id = $1 AND post_id = $2 AND interaction_type = 'LIKE'
            )
            RETURNING {INTERACTION_COLUMNS}
            "#
        );
        let inserted = sqlx::query(&sql)
            .bind(user_id)
            .bind(item_id)
            .bind(score as f64)
            .bind(at)
            .fetch_optional(&mut *tx)
            .await;

        let row = match inserted {
            Ok(row) => row,
            // A writer outside this store won the race on a unique LIKE index
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!(user_id, item_id, "Like already recorded");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        tx.commit().await?;

        row.as_ref().map(interaction_from_row).transpose()
    }

    async fn delete_likes(&self, user_id: UserId, item_id: ItemId) -> RecsysResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM posts_userinteraction
            WHERE user_id = $1 AND post_id = $2 AND interaction_type = 'LIKE'
            "#,
        )
        .bind(user_id)
        .bind(item_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn recent_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> RecsysResult<Vec<Interaction>> {
        let sql = format!(
            r#"
            SELECT {INTERACTION_COLUMNS}
            FROM posts_userinteraction
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(interaction_from_row).collect()
    }

    async fn items_since(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> RecsysResult<HashSet<ItemId>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT post_id
            FROM posts_userinteraction
            WHERE user_id = $1 AND created_at >= $2
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| r.try_get::<ItemId, _>("post_id").map_err(RecsysError::from))
            .collect()
    }

    async fn count(
        &self,
        user_id: UserId,
        item_id: ItemId,
        kind: InteractionType,
    ) -> RecsysResult<usize> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM posts_userinteraction
            WHERE user_id = $1 AND post_id = $2 AND interaction_type = $3
            "#,
        )
        .bind(user_id)
        .bind(item_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count as usize)
    }

    async fn all_scores(&self) -> RecsysResult<Vec<(UserId, ItemId, f32)>> {
        let rows = sqlx::query("SELECT user_id, post_id, score FROM posts_userinteraction")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|r| -> RecsysResult<(UserId, ItemId, f32)> {
                let score: f64 = r.try_get("score")?;
                Ok((r.try_get("user_id")?, r.try_get("post_id")?, score as f32))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_literal() {
        assert_eq!(vector_literal(&[1.0, -0.5, 0.25]), "[1,-0.5,0.25]");
        assert_eq!(vector_literal(&[]), "[]");
    }

    #[test]
    fn test_vector_column() {
        assert_eq!(vector_column(VectorSpace::Content), "embedding");
        assert_eq!(vector_column(VectorSpace::Collaborative), "cf_latent_vector");
    }
}
