use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use newswire_common::{ArticleRecord, ArticleStatus, Enrichment, ExtractedArticle, Source};
use newswire_store::{ArticleStore, StoreError};

/// Typed outcome of a save attempt. `Duplicate` is a normal result, not an
/// error; `Failed` is logged and counted but never propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Duplicate,
    Failed,
}

/// Dedup and persistence gateway: fingerprints an article, skips already-seen
/// content, and writes the normalized record.
pub struct ArticleGateway {
    store: Arc<dyn ArticleStore>,
}

impl ArticleGateway {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    pub async fn save(
        &self,
        article: &ExtractedArticle,
        enrichment: &Enrichment,
        source: &Source,
        auto_publish: bool,
    ) -> SaveOutcome {
        let fingerprint = fingerprint(&article.title, &article.content);

        match self.store.find_by_fingerprint(&fingerprint).await {
            Ok(Some(_)) => {
                info!(
                    url = article.url.as_str(),
                    "Article already stored, skipping"
                );
                return SaveOutcome::Duplicate;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(url = article.url.as_str(), error = %e, "Fingerprint lookup failed");
                return SaveOutcome::Failed;
            }
        }

        let record = build_record(article, enrichment, source, auto_publish, fingerprint);

        match self.store.insert_article(&record).await {
            Ok(()) => {
                info!(
                    url = record.url.as_str(),
                    category = record.category.as_str(),
                    status = record.status.as_str(),
                    "Article saved"
                );
                SaveOutcome::Saved
            }
            // The unique constraint is authoritative: a concurrent cycle may
            // win the race between our existence check and this insert.
            Err(StoreError::DuplicateFingerprint(_)) => {
                info!(url = record.url.as_str(), "Concurrent duplicate, skipping");
                SaveOutcome::Duplicate
            }
            Err(e) => {
                warn!(url = record.url.as_str(), error = %e, "Failed to save article");
                SaveOutcome::Failed
            }
        }
    }
}

/// Stable content fingerprint: SHA-256 over title and content.
pub fn fingerprint(title: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"\n");
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn build_record(
    article: &ExtractedArticle,
    enrichment: &Enrichment,
    source: &Source,
    auto_publish: bool,
    fingerprint: String,
) -> ArticleRecord {
    let status = if auto_publish {
        ArticleStatus::Published
    } else {
        ArticleStatus::Draft
    };

    ArticleRecord {
        id: Uuid::new_v4(),
        source_id: source.id,
        title: article.title.clone(),
        content: article.content.clone(),
        summary: enrichment.summary.clone(),
        url: article.url.clone(),
        image_url: article.image_url.clone(),
        author: article.author.clone(),
        category: enrichment.category,
        status,
        tags: enrichment.tags.clone(),
        sentiment: enrichment.sentiment.clamp(-1.0, 1.0),
        bias: enrichment.bias.clone(),
        ai_processed: enrichment.ai_processed,
        fingerprint,
        published_at: article.published_at,
        scraped_at: Utc::now(),
        views: 0,
    }
}
