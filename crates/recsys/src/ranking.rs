//! Final scoring of the candidate pool
//!
//! score = w_cf * cf_score + w_content * content_score + w_fresh * freshness
//!
//! The collaborative weight is zero until the user has a latent vector.

use crate::candidates::Candidates;
use crate::types::{RankedItem, User};
use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: f32 = 86_400.0;

/// Component weights for one user
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    pub cf: f32,
    pub content: f32,
    pub freshness: f32,
}

impl RankingWeights {
    /// No collaborative signal yet
    pub const COLD: RankingWeights = RankingWeights {
        cf: 0.0,
        content: 0.7,
        freshness: 0.3,
    };

    pub const HYBRID: RankingWeights = RankingWeights {
        cf: 0.4,
        content: 0.4,
        freshness: 0.2,
    };

    pub fn for_user(user: &User) -> Self {
        if user.cf_latent_vector.is_some() {
            Self::HYBRID
        } else {
            Self::COLD
        }
    }
}

pub struct Ranker {
    freshness_decay: f32,
    max_results: usize,
}

impl Ranker {
    pub fn new(freshness_decay: f32, max_results: usize) -> Self {
        Self {
            freshness_decay,
            max_results,
        }
    }

    /// `1 / (1 + decay * age_days)` with fractional days; future timestamps
    /// count as age 0.
    pub fn freshness(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
        let age_seconds = (now - created_at).num_seconds().max(0) as f32;
        let age_days = age_seconds / SECONDS_PER_DAY;
        1.0 / (1.0 + self.freshness_decay * age_days)
    }

    /// Highest score first; equal scores keep ascending item id order.
    pub fn rank(
        &self,
        user: &User,
        candidates: &Candidates,
        now: DateTime<Utc>,
    ) -> Vec<RankedItem> {
        let weights = RankingWeights::for_user(user);

        let mut ranked: Vec<RankedItem> = candidates
            .iter()
            .map(|(item_id, scores)| {
                let cf_score = scores.cf_score.unwrap_or(0.0);
                let content_score = scores.content_score.unwrap_or(0.0);
                let freshness = self.freshness(scores.created_at, now);
                RankedItem {
                    item_id: *item_id,
                    score: weights.cf * cf_score
                        + weights.content * content_score
                        + weights.freshness * freshness,
                    cf_score,
                    content_score,
                    freshness,
                }
            })
            .collect();

        // Stable: ties stay in the map's ascending id order
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(self.max_results);
        ranked
    }
}

impl Default for Ranker {
    fn default() -> Self {
        Self::new(0.1, 100)
    }
}
