//! Hybrid recommendation service
//!
//! Entry point for the web layer. Wires the stores, the recompute trigger and
//! the engine components together and exposes the feed, "more like this",
//! feedback recording and the batch jobs.

use crate::candidates::CandidateGenerator;
use crate::dispatch::{RecomputeTrigger, RecomputeWorker};
use crate::embedding::{BackfillReport, CaptionProvider, EmbeddingBackfill, EmbeddingProvider};
use crate::error::RecsysResult;
use crate::interactions::{InteractionRecorder, LikeToggle};
use crate::matrix_factorization::{SvdTrainer, TrainConfig, TrainingReport};
use crate::profile::UserVectorCalculator;
use crate::ranking::Ranker;
use crate::store::Stores;
use crate::types::{InteractionType, ItemId, RankedItem, ScoredItem, UserId};
use crate::RecsysConfig;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct RecommendationService {
    stores: Stores,
    config: RecsysConfig,
    calculator: Arc<UserVectorCalculator>,
    generator: CandidateGenerator,
    ranker: Ranker,
    recorder: InteractionRecorder,
    trainer: SvdTrainer,
}

impl RecommendationService {
    /// Build a service that reports stale users to `trigger`
    pub fn new(stores: Stores, trigger: Arc<dyn RecomputeTrigger>, config: RecsysConfig) -> Self {
        let calculator = Arc::new(UserVectorCalculator::new(
            &stores,
            config.recent_interaction_limit,
        ));
        Self::assemble(stores, calculator, trigger, config)
    }

    /// Build a service backed by a freshly spawned recompute worker.
    ///
    /// The worker stops once the service is dropped.
    pub fn with_worker(stores: Stores, config: RecsysConfig) -> (Self, JoinHandle<()>) {
        let calculator = Arc::new(UserVectorCalculator::new(
            &stores,
            config.recent_interaction_limit,
        ));
        let (handle, task) = RecomputeWorker::spawn(calculator.clone());
        let service = Self::assemble(stores, calculator, Arc::new(handle), config);
        (service, task)
    }

    fn assemble(
        stores: Stores,
        calculator: Arc<UserVectorCalculator>,
        trigger: Arc<dyn RecomputeTrigger>,
        config: RecsysConfig,
    ) -> Self {
        let generator = CandidateGenerator::new(&stores, calculator.clone(), &config);
        let ranker = Ranker::new(config.freshness_decay, config.max_results);
        let recorder = InteractionRecorder::new(
            stores.catalog.clone(),
            stores.interactions.clone(),
            trigger,
        );
        let trainer = SvdTrainer::new(
            stores.interactions.clone(),
            stores.vectors.clone(),
            TrainConfig {
                n_components: config.cf_dim,
            },
        );

        Self {
            stores,
            config,
            calculator,
            generator,
            ranker,
            recorder,
            trainer,
        }
    }

    pub fn config(&self) -> &RecsysConfig {
        &self.config
    }

    /// Ranked feed for a user; an unknown user gets an empty feed
    pub async fn generate_recommendations(&self, user_id: UserId) -> RecsysResult<Vec<RankedItem>> {
        self.generate_recommendations_at(user_id, Utc::now()).await
    }

    /// Same as `generate_recommendations` with an explicit clock
    pub async fn generate_recommendations_at(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> RecsysResult<Vec<RankedItem>> {
        let Some(user) = self.stores.catalog.user(user_id).await? else {
            debug!(user_id, "Recommendations requested for unknown user");
            return Ok(Vec::new());
        };

        let exclusion = self.generator.exclusion_set(user_id, now).await?;
        let candidates = self.generator.generate(&user, &exclusion).await?;
        let ranked = self.ranker.rank(&user, &candidates, now);

        info!(
            user_id,
            candidates = candidates.len(),
            returned = ranked.len(),
            collaborative = user.cf_latent_vector.is_some(),
            "Recommendations generated"
        );
        Ok(ranked)
    }

    pub async fn similar_items(
        &self,
        item_id: ItemId,
        limit: usize,
    ) -> RecsysResult<Vec<ScoredItem>> {
        self.generator
            .content_source()
            .similar_items(item_id, limit)
            .await
    }

    pub async fn record_interaction(
        &self,
        user_id: UserId,
        item_id: ItemId,
        kind: InteractionType,
        duration: f32,
    ) -> RecsysResult<f32> {
        self.recorder
            .record_interaction(user_id, item_id, kind, duration)
            .await
    }

    pub async fn record_comment(&self, user_id: UserId, item_id: ItemId) -> RecsysResult<f32> {
        self.recorder.record_comment(user_id, item_id).await
    }

    pub async fn unlike(&self, user_id: UserId, item_id: ItemId) -> RecsysResult<u64> {
        self.recorder.unlike(user_id, item_id).await
    }

    pub async fn toggle_like(&self, user_id: UserId, item_id: ItemId) -> RecsysResult<LikeToggle> {
        self.recorder.toggle_like(user_id, item_id).await
    }

    pub async fn report_item(
        &self,
        user_id: UserId,
        item_id: ItemId,
        reason: impl Into<String>,
    ) -> RecsysResult<()> {
        self.recorder.report_item(user_id, item_id, reason).await
    }

    /// Synchronous recompute, bypassing the trigger
    pub async fn recompute_user_vector(&self, user_id: UserId) -> RecsysResult<Option<Vec<f32>>> {
        self.calculator.recompute(user_id).await
    }

    pub async fn train_collaborative_model(&self) -> RecsysResult<TrainingReport> {
        self.trainer.train().await
    }

    pub async fn backfill_embeddings(
        &self,
        provider: Arc<dyn EmbeddingProvider>,
        captioner: Option<Arc<dyn CaptionProvider>>,
        batch: usize,
    ) -> RecsysResult<BackfillReport> {
        let mut backfill = EmbeddingBackfill::new(
            self.stores.catalog.clone(),
            self.stores.vectors.clone(),
            provider,
            self.config.content_dim,
        );
        if let Some(captioner) = captioner {
            backfill = backfill.with_captions(captioner);
        }
        backfill.run(batch).await
    }
}
