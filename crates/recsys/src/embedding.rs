//! Content embedding collaborator
//!
//! The embedding model lives outside this crate. It is injected as an
//! `EmbeddingProvider`; `EmbeddingBackfill` walks items that have no
//! embedding yet and stores what the provider returns. An optional
//! `CaptionProvider` describes uploaded images so their captions join the
//! embedded text.

use crate::error::{RecsysError, RecsysResult};
use crate::store::{Catalog, VectorStore};
use crate::types::{Item, ItemId};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Markdown image tags: `![alt](path)`
static MARKDOWN_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[.*?\]\(.*?\)").expect("Invalid markdown image regex"));

/// Uploaded images only: `![alt](/media/...)`, capturing the path
static MEDIA_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[.*?\]\((/media/.*?)\)").expect("Invalid media image regex"));

/// Text-to-vector model
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> RecsysResult<Vec<f32>>;
}

/// Image-to-text model, given an uploaded image path such as `/media/a.png`
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    async fn caption(&self, path: &str) -> RecsysResult<String>;
}

/// Paths of uploaded images referenced by the body, in order
pub fn media_images(content: &str) -> Vec<&str> {
    MEDIA_IMAGE
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// Text fed to the embedding model: title, body with images removed, then
/// image captions
pub fn embedding_text(item: &Item, captions: &[String]) -> String {
    let body = MARKDOWN_IMAGE.replace_all(&item.content, "");
    format!("{} {} {}", item.title, body, captions.join(" "))
        .trim()
        .to_string()
}

/// Outcome of one backfill pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub processed: usize,
    pub updated: usize,
    /// Items with no text to embed
    pub skipped: usize,
    pub failed: usize,
}

pub struct EmbeddingBackfill {
    catalog: Arc<dyn Catalog>,
    vectors: Arc<dyn VectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
    captioner: Option<Arc<dyn CaptionProvider>>,
    dimension: usize,
}

impl EmbeddingBackfill {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        vectors: Arc<dyn VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
        dimension: usize,
    ) -> Self {
        Self {
            catalog,
            vectors,
            provider,
            captioner: None,
            dimension,
        }
    }

    /// Append captions of uploaded images to the embedded text
    pub fn with_captions(mut self, captioner: Arc<dyn CaptionProvider>) -> Self {
        self.captioner = Some(captioner);
        self
    }

    /// Embed up to `batch` items lacking an embedding.
    ///
    /// Per-item failures are logged and counted; only the initial catalog
    /// lookup can fail the whole pass.
    pub async fn run(&self, batch: usize) -> RecsysResult<BackfillReport> {
        let items = self.catalog.items_missing_embedding(batch).await?;
        let mut report = BackfillReport::default();

        if items.is_empty() {
            info!("No items need embeddings");
            return Ok(report);
        }
        info!(count = items.len(), "Backfilling item embeddings");

        for item in items {
            report.processed += 1;

            let captions = self.captions(&item).await;
            let text = embedding_text(&item, &captions);
            if text.is_empty() {
                debug!(item_id = item.id, "Item has no text to embed");
                report.skipped += 1;
                continue;
            }

            match self.embed_item(item.id, &text).await {
                Ok(()) => report.updated += 1,
                Err(e) => {
                    warn!(item_id = item.id, error = %e, "Embedding failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            processed = report.processed,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            "Embedding backfill finished"
        );
        Ok(report)
    }

    /// Captions that could be produced; failed images are skipped
    async fn captions(&self, item: &Item) -> Vec<String> {
        let Some(captioner) = &self.captioner else {
            return Vec::new();
        };

        let mut captions = Vec::new();
        for path in media_images(&item.content) {
            match captioner.caption(path).await {
                Ok(caption) if !caption.trim().is_empty() => captions.push(caption),
                Ok(_) => {}
                Err(e) => warn!(item_id = item.id, path, error = %e, "Image caption failed"),
            }
        }
        if !captions.is_empty() {
            debug!(item_id = item.id, captions = captions.len(), "Image captions added");
        }
        captions
    }

    async fn embed_item(&self, item_id: ItemId, text: &str) -> RecsysResult<()> {
        let vector = self.provider.embed(text).await?;
        if vector.len() != self.dimension {
            return Err(RecsysError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.vectors.set_item_embedding(item_id, vector).await
    }
}
