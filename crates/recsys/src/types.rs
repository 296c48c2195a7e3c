//! Domain records shared by the recommendation modules

use crate::error::RecsysError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type UserId = i64;
pub type ItemId = i64;
pub type InteractionId = i64;
pub type CategoryId = String;

/// User as seen by the recommender
#[derive(Debug, Clone, PartialEq, Default)]
pub struct User {
    pub id: UserId,
    /// Content-preference vector (dimension D_c), null until first computed
    pub preference_vector: Option<Vec<f32>>,
    /// Collaborative latent vector (dimension D_f), null until first training run
    pub cf_latent_vector: Option<Vec<f32>>,
    /// Categories chosen at signup, used only for cold start
    pub interested_categories: Vec<CategoryId>,
}

impl User {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// Post eligible for recommendation
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub category: CategoryId,
    pub title: String,
    pub content: String,
    /// Content embedding supplied by the embedding provider
    pub embedding: Option<Vec<f32>>,
    /// Collaborative latent vector written by the trainer
    pub cf_latent_vector: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn new(id: ItemId, category: impl Into<CategoryId>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            category: category.into(),
            title: String::new(),
            content: String::new(),
            embedding: None,
            cf_latent_vector: None,
            created_at,
        }
    }

    pub fn summary(&self) -> ItemSummary {
        ItemSummary {
            id: self.id,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemSummary {
    pub id: ItemId,
    pub created_at: DateTime<Utc>,
}

/// Closed set of interaction kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionType {
    View,
    Like,
    Comment,
    NotInterested,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::View => "VIEW",
            InteractionType::Like => "LIKE",
            InteractionType::Comment => "COMMENT",
            InteractionType::NotInterested => "NOT_INTERESTED",
        }
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionType {
    type Err = RecsysError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VIEW" => Ok(InteractionType::View),
            "LIKE" => Ok(InteractionType::Like),
            "COMMENT" => Ok(InteractionType::Comment),
            "NOT_INTERESTED" => Ok(InteractionType::NotInterested),
            other => Err(RecsysError::UnknownInteractionType(other.to_string())),
        }
    }
}

/// Persisted interaction event. Never updated after insert.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    pub id: InteractionId,
    pub user_id: UserId,
    pub item_id: ItemId,
    pub kind: InteractionType,
    pub score: f32,
    /// Dwell time in seconds (0 for non-view events)
    pub duration: f32,
    pub created_at: DateTime<Utc>,
}

/// Interaction about to be appended to the log
#[derive(Debug, Clone, PartialEq)]
pub struct NewInteraction {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub kind: InteractionType,
    pub score: f32,
    pub duration: f32,
    pub created_at: DateTime<Utc>,
}

/// Permanent hard-exclusion marker
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Per-request score bundle for one candidate item
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateScores {
    pub created_at: DateTime<Utc>,
    pub cf_score: Option<f32>,
    pub content_score: Option<f32>,
}

impl CandidateScores {
    pub fn unscored(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            cf_score: None,
            content_score: None,
        }
    }

    /// Fill score fields that are still missing; present values are kept.
    pub fn fill_missing(&mut self, other: &CandidateScores) {
        if self.cf_score.is_none() {
            self.cf_score = other.cf_score;
        }
        if self.content_score.is_none() {
            self.content_score = other.content_score;
        }
    }
}

/// Final ranked entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedItem {
    pub item_id: ItemId,
    pub score: f32,
    pub cf_score: f32,
    pub content_score: f32,
    pub freshness: f32,
}

/// Item returned by "more like this"
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredItem {
    pub item_id: ItemId,
    pub similarity: f32,
}
