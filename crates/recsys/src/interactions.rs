//! Implicit feedback recording
//!
//! Converts user actions into scored interaction records and signals the
//! background worker that the acting user's preference vector is stale.

use crate::dispatch::RecomputeTrigger;
use crate::error::RecsysResult;
use crate::store::{Catalog, InteractionLog};
use crate::types::{InteractionType, ItemId, NewInteraction, Report, UserId};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

const VIEW_BASE_SCORE: f32 = 1.0;
/// Dwell bonus per 5 seconds of viewing
const VIEW_DWELL_STEP: f32 = 0.1;
const VIEW_DWELL_CAP: f32 = 1.0;
const LIKE_SCORE: f32 = 5.0;
const COMMENT_SCORE: f32 = 3.0;
const NOT_INTERESTED_SCORE: f32 = -5.0;

impl InteractionType {
    /// Implicit rating of an interaction
    ///
    /// VIEW earns 1.0 plus a dwell bonus of 0.1 per 5 seconds, capped at 1.0.
    /// Content length is not an input, so there is no zero denominator.
    pub fn score(&self, duration: f32) -> f32 {
        match self {
            InteractionType::View => {
                let dwell = sanitize_duration(duration) / 5.0 * VIEW_DWELL_STEP;
                VIEW_BASE_SCORE + dwell.min(VIEW_DWELL_CAP)
            }
            InteractionType::Like => LIKE_SCORE,
            InteractionType::Comment => COMMENT_SCORE,
            InteractionType::NotInterested => NOT_INTERESTED_SCORE,
        }
    }

    /// Duration stored with the record; only views keep their dwell time
    pub fn recorded_duration(&self, duration: f32) -> f32 {
        match self {
            InteractionType::View => sanitize_duration(duration),
            InteractionType::Like | InteractionType::Comment | InteractionType::NotInterested => {
                0.0
            }
        }
    }
}

fn sanitize_duration(duration: f32) -> f32 {
    if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        0.0
    }
}

/// Result of pressing the like button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeToggle {
    pub is_liked: bool,
}

/// Writes interactions and reports, scheduling vector refreshes
pub struct InteractionRecorder {
    catalog: Arc<dyn Catalog>,
    interactions: Arc<dyn InteractionLog>,
    trigger: Arc<dyn RecomputeTrigger>,
}

impl InteractionRecorder {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        interactions: Arc<dyn InteractionLog>,
        trigger: Arc<dyn RecomputeTrigger>,
    ) -> Self {
        Self {
            catalog,
            interactions,
            trigger,
        }
    }

    /// Persist an interaction and return its score.
    ///
    /// A LIKE on an already liked item records nothing and schedules nothing.
    pub async fn record_interaction(
        &self,
        user_id: UserId,
        item_id: ItemId,
        kind: InteractionType,
        duration: f32,
    ) -> RecsysResult<f32> {
        self.record_at(user_id, item_id, kind, duration, Utc::now())
            .await
    }

    /// Same as `record_interaction` with an explicit event time
    pub async fn record_at(
        &self,
        user_id: UserId,
        item_id: ItemId,
        kind: InteractionType,
        duration: f32,
        at: DateTime<Utc>,
    ) -> RecsysResult<f32> {
        let score = kind.score(duration);

        if kind == InteractionType::Like {
            let inserted = self
                .interactions
                .append_like(user_id, item_id, score, at)
                .await?;
            if inserted.is_none() {
                debug!(user_id, item_id, "Item already liked");
                return Ok(score);
            }
        } else {
            self.interactions
                .append(NewInteraction {
                    user_id,
                    item_id,
                    kind,
                    score,
                    duration: kind.recorded_duration(duration),
                    created_at: at,
                })
                .await?;
        }

        debug!(user_id, item_id, %kind, score, "Interaction recorded");
        self.trigger.schedule(user_id);
        Ok(score)
    }

    /// Retract a like by deleting every LIKE record for the pair
    pub async fn unlike(&self, user_id: UserId, item_id: ItemId) -> RecsysResult<u64> {
        let deleted = self.interactions.delete_likes(user_id, item_id).await?;
        if deleted > 0 {
            debug!(user_id, item_id, deleted, "Like retracted");
            self.trigger.schedule(user_id);
        }
        Ok(deleted)
    }

    /// Like when not liked, unlike otherwise
    pub async fn toggle_like(&self, user_id: UserId, item_id: ItemId) -> RecsysResult<LikeToggle> {
        let liked = self
            .interactions
            .count(user_id, item_id, InteractionType::Like)
            .await?
            > 0;

        if liked {
            self.unlike(user_id, item_id).await?;
        } else {
            self.record_interaction(user_id, item_id, InteractionType::Like, 0.0)
                .await?;
        }

        Ok(LikeToggle { is_liked: !liked })
    }

    /// Comment-created hook
    pub async fn record_comment(&self, user_id: UserId, item_id: ItemId) -> RecsysResult<f32> {
        self.record_interaction(user_id, item_id, InteractionType::Comment, 0.0)
            .await
    }

    /// Permanently hide an item from the reporting user's recommendations
    pub async fn report_item(
        &self,
        user_id: UserId,
        item_id: ItemId,
        reason: impl Into<String>,
    ) -> RecsysResult<()> {
        self.catalog
            .add_report(Report {
                user_id,
                item_id,
                reason: reason.into(),
                created_at: Utc::now(),
            })
            .await?;
        info!(user_id, item_id, "Item reported");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTrigger {
        scheduled: Mutex<Vec<UserId>>,
    }

    impl RecomputeTrigger for RecordingTrigger {
        fn schedule(&self, user_id: UserId) {
            self.scheduled.lock().unwrap().push(user_id);
        }
    }

    fn recorder() -> (Arc<MemoryStore>, Arc<RecordingTrigger>, InteractionRecorder) {
        let store = Arc::new(MemoryStore::new());
        let trigger = Arc::new(RecordingTrigger::default());
        let recorder = InteractionRecorder::new(store.clone(), store.clone(), trigger.clone());
        (store, trigger, recorder)
    }

    #[test]
    fn test_interaction_scores() {
        assert_eq!(InteractionType::Like.score(0.0), 5.0);
        assert_eq!(InteractionType::Comment.score(120.0), 3.0);
        assert_eq!(InteractionType::NotInterested.score(30.0), -5.0);

        assert_eq!(InteractionType::View.score(0.0), 1.0);
        assert!((InteractionType::View.score(10.0) - 1.2).abs() < 1e-6);
        assert!((InteractionType::View.score(50.0) - 2.0).abs() < 1e-6);
        assert!((InteractionType::View.score(3600.0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_durations_are_clamped() {
        assert_eq!(InteractionType::View.score(-30.0), 1.0);
        assert_eq!(InteractionType::View.score(f32::NAN), 1.0);
        assert_eq!(InteractionType::View.score(f32::INFINITY), 1.0);
        assert_eq!(InteractionType::NotInterested.recorded_duration(12.0), 0.0);
        assert_eq!(InteractionType::View.recorded_duration(12.0), 12.0);
    }

    #[tokio::test]
    async fn test_record_interaction_persists_and_schedules() {
        let (store, trigger, recorder) = recorder();

        let score = recorder
            .record_interaction(7, 1, InteractionType::NotInterested, 40.0)
            .await
            .unwrap();
        assert_eq!(score, -5.0);

        let log = store.interactions().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].duration, 0.0);
        assert_eq!(*trigger.scheduled.lock().unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_duplicate_like_is_ignored() {
        let (store, trigger, recorder) = recorder();

        recorder
            .record_interaction(1, 2, InteractionType::Like, 0.0)
            .await
            .unwrap();
        recorder
            .record_interaction(1, 2, InteractionType::Like, 0.0)
            .await
            .unwrap();

        assert_eq!(store.count(1, 2, InteractionType::Like).await.unwrap(), 1);
        assert_eq!(trigger.scheduled.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_like_round_trip() {
        let (store, trigger, recorder) = recorder();

        assert!(recorder.toggle_like(3, 9).await.unwrap().is_liked);
        assert!(!recorder.toggle_like(3, 9).await.unwrap().is_liked);

        assert_eq!(store.count(3, 9, InteractionType::Like).await.unwrap(), 0);
        assert_eq!(*trigger.scheduled.lock().unwrap(), vec![3, 3]);
    }

    #[tokio::test]
    async fn test_unlike_without_like_does_not_schedule() {
        let (_store, trigger, recorder) = recorder();

        assert_eq!(recorder.unlike(3, 9).await.unwrap(), 0);
        assert!(trigger.scheduled.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_report_item_is_stored() {
        let (store, _trigger, recorder) = recorder();

        recorder.report_item(4, 11, "spam").await.unwrap();
        let reported = store.reported_items(4).await.unwrap();
        assert!(reported.contains(&11));
    }
}
