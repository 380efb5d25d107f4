use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use newswire_common::{ArticleRecord, NewSource, ScrapingLog, Source};

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An article with this fingerprint already exists. The gateway treats
    /// this as a skip, never a failure.
    #[error("Duplicate fingerprint: {0}")]
    DuplicateFingerprint(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Persistence surface consumed by the pipeline. The pipeline never issues
/// queries beyond these operations.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Look up a source by name, creating it from the given identity if
    /// missing. Idempotent.
    async fn get_or_create_source(&self, source: &NewSource) -> Result<Source>;

    async fn list_sources(&self) -> Result<Vec<Source>>;

    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<ArticleRecord>>;

    /// Insert a new article. A fingerprint collision (including one raced by
    /// a concurrent cycle) surfaces as [`StoreError::DuplicateFingerprint`].
    async fn insert_article(&self, article: &ArticleRecord) -> Result<()>;

    async fn insert_scraping_log(&self, log: &ScrapingLog) -> Result<()>;

    async fn touch_source_scraped(&self, source_id: Uuid, at: DateTime<Utc>) -> Result<()>;

    async fn recent_logs(&self, limit: i64) -> Result<Vec<ScrapingLog>>;

    async fn count_articles(&self) -> Result<i64>;
}
