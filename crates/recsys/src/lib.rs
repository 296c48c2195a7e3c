//! NJJC hybrid feed recommender
//!
//! Blends three signals into one ranked feed:
//!
//! - collaborative filtering over latent vectors produced by a truncated SVD
//!   of the user x item implicit-feedback matrix;
//! - content similarity between item embeddings and a per-user preference
//!   vector derived from recent interactions;
//! - freshness decay on item age.
//!
//! Storage is reached through the traits in [`store`]; the PostgreSQL/pgvector
//! backend and the in-memory backend are interchangeable.

pub mod candidates;
pub mod cold_start;
pub mod collaborative;
pub mod content_based;
pub mod dispatch;
pub mod embedding;
pub mod error;
pub mod interactions;
pub mod matrix_factorization;
pub mod profile;
pub mod ranking;
pub mod recommendation;
pub mod store;
pub mod types;

pub use candidates::{CandidateGenerator, Candidates};
pub use dispatch::{NoopTrigger, RecomputeHandle, RecomputeTrigger, RecomputeWorker};
pub use embedding::{BackfillReport, CaptionProvider, EmbeddingBackfill, EmbeddingProvider};
pub use error::{RecsysError, RecsysResult};
pub use interactions::{InteractionRecorder, LikeToggle};
pub use matrix_factorization::{SvdTrainer, TrainConfig, TrainingReport};
pub use profile::UserVectorCalculator;
pub use ranking::{Ranker, RankingWeights};
pub use recommendation::RecommendationService;
pub use store::{Catalog, InteractionLog, MemoryStore, PgStore, Stores, VectorStore};
pub use types::*;

use njjc_core::config::{parse_env_var, ConfigLoader};
use njjc_core::CoreError;

/// Longest accepted soft exclusion window, in days
pub const MAX_SOFT_EXCLUSION_DAYS: i64 = 3650;

/// Recommender tuning
///
/// # Environment Variables
///
/// Every field maps to `NJJC_RECSYS_<FIELD>` in upper case, for example
/// `NJJC_RECSYS_CF_DIM` or `NJJC_RECSYS_SOFT_EXCLUSION_DAYS`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecsysConfig {
    /// Content embedding dimension (default: 768)
    pub content_dim: usize,
    /// Collaborative latent dimension, also the SVD component count (default: 64)
    pub cf_dim: usize,
    /// Interactions averaged into a preference vector (default: 50)
    pub recent_interaction_limit: usize,
    /// Rolling window hiding recently seen items (default: 7)
    pub soft_exclusion_days: i64,
    pub cf_candidates: usize,
    pub content_candidates: usize,
    pub cold_start_candidates: usize,
    pub popular_candidates: usize,
    /// Flat content score for cold start items (default: 0.5)
    pub cold_start_score: f32,
    /// Freshness decay per day of age (default: 0.1)
    pub freshness_decay: f32,
    /// Feed length cap (default: 100)
    pub max_results: usize,
    pub similar_items_limit: usize,
}

impl Default for RecsysConfig {
    fn default() -> Self {
        Self {
            content_dim: 768,
            cf_dim: 64,
            recent_interaction_limit: profile::DEFAULT_INTERACTION_LIMIT,
            soft_exclusion_days: 7,
            cf_candidates: 50,
            content_candidates: 50,
            cold_start_candidates: 30,
            popular_candidates: 30,
            cold_start_score: 0.5,
            freshness_decay: 0.1,
            max_results: 100,
            similar_items_limit: 20,
        }
    }
}

impl ConfigLoader for RecsysConfig {
    fn from_env() -> Result<Self, CoreError> {
        let d = RecsysConfig::default();
        Ok(Self {
            content_dim: parse_env_var("NJJC_RECSYS_CONTENT_DIM", d.content_dim)?,
            cf_dim: parse_env_var("NJJC_RECSYS_CF_DIM", d.cf_dim)?,
            recent_interaction_limit: parse_env_var(
                "NJJC_RECSYS_RECENT_INTERACTION_LIMIT",
                d.recent_interaction_limit,
            )?,
            soft_exclusion_days: parse_env_var(
                "NJJC_RECSYS_SOFT_EXCLUSION_DAYS",
                d.soft_exclusion_days,
            )?,
            cf_candidates: parse_env_var("NJJC_RECSYS_CF_CANDIDATES", d.cf_candidates)?,
            content_candidates: parse_env_var(
                "NJJC_RECSYS_CONTENT_CANDIDATES",
                d.content_candidates,
            )?,
            cold_start_candidates: parse_env_var(
                "NJJC_RECSYS_COLD_START_CANDIDATES",
                d.cold_start_candidates,
            )?,
            popular_candidates: parse_env_var(
                "NJJC_RECSYS_POPULAR_CANDIDATES",
                d.popular_candidates,
            )?,
            cold_start_score: parse_env_var("NJJC_RECSYS_COLD_START_SCORE", d.cold_start_score)?,
            freshness_decay: parse_env_var("NJJC_RECSYS_FRESHNESS_DECAY", d.freshness_decay)?,
            max_results: parse_env_var("NJJC_RECSYS_MAX_RESULTS", d.max_results)?,
            similar_items_limit: parse_env_var(
                "NJJC_RECSYS_SIMILAR_ITEMS_LIMIT",
                d.similar_items_limit,
            )?,
        })
    }

    fn validate(&self) -> Result<(), CoreError> {
        let non_zero = [
            (self.content_dim, "NJJC_RECSYS_CONTENT_DIM"),
            (self.recent_interaction_limit, "NJJC_RECSYS_RECENT_INTERACTION_LIMIT"),
            (self.max_results, "NJJC_RECSYS_MAX_RESULTS"),
            (self.similar_items_limit, "NJJC_RECSYS_SIMILAR_ITEMS_LIMIT"),
        ];
        for (value, key) in non_zero {
            if value == 0 {
                return Err(CoreError::config(format!("{} must be greater than 0", key), key));
            }
        }

        if self.cf_dim < 2 {
            return Err(CoreError::config(
                format!("cf_dim must be at least 2, got {}", self.cf_dim),
                "NJJC_RECSYS_CF_DIM",
            ));
        }

        if !(0..=MAX_SOFT_EXCLUSION_DAYS).contains(&self.soft_exclusion_days) {
            return Err(CoreError::config(
                format!(
                    "soft_exclusion_days must be within [0, {}], got {}",
                    MAX_SOFT_EXCLUSION_DAYS, self.soft_exclusion_days
                ),
                "NJJC_RECSYS_SOFT_EXCLUSION_DAYS",
            ));
        }

        if !self.freshness_decay.is_finite() || self.freshness_decay < 0.0 {
            return Err(CoreError::config(
                "freshness_decay must be a non-negative number",
                "NJJC_RECSYS_FRESHNESS_DECAY",
            ));
        }

        if !(0.0..=1.0).contains(&self.cold_start_score) {
            return Err(CoreError::config(
                "cold_start_score must be within [0, 1]",
                "NJJC_RECSYS_COLD_START_SCORE",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
