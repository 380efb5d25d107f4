// Postgres persistence for articles, sources, and scraping logs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use newswire_common::{
    ArticleRecord, ArticleStatus, BiasSignal, Category, NewSource, ScrapingLog, Source,
};

use crate::store::{ArticleStore, Result, StoreError};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded SQL migrations. Idempotent.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.into()))?;
        Ok(())
    }
}

#[async_trait]
impl ArticleStore for PgStore {
    async fn get_or_create_source(&self, source: &NewSource) -> Result<Source> {
        // DO UPDATE instead of DO NOTHING so RETURNING always yields the row.
        let row = sqlx::query_as::<_, SourceRow>(
            r#"
            INSERT INTO sources (id, name, feed_url, base_url, language, country, active)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            ON CONFLICT (name) DO UPDATE
                SET feed_url = EXCLUDED.feed_url,
                    base_url = EXCLUDED.base_url
            RETURNING id, name, feed_url, base_url, language, country, active, last_scraped_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&source.name)
        .bind(&source.feed_url)
        .bind(&source.base_url)
        .bind(&source.language)
        .bind(&source.country)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list_sources(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT id, name, feed_url, base_url, language, country, active, last_scraped_at
            FROM sources
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<ArticleRecord>> {
        let row = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT * FROM articles
            WHERE fingerprint = $1
            LIMIT 1
            "#,
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn insert_article(&self, article: &ArticleRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles
                (id, source_id, title, content, summary, url, image_url, author,
                 category, status, tags, sentiment,
                 bias_detected, bias_analysis, bias_confidence,
                 ai_processed, fingerprint, published_at, scraped_at, views)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(article.id)
        .bind(article.source_id)
        .bind(&article.title)
        .bind(&article.content)
        .bind(&article.summary)
        .bind(&article.url)
        .bind(&article.image_url)
        .bind(&article.author)
        .bind(article.category.as_str())
        .bind(article.status.as_str())
        .bind(serde_json::json!(article.tags))
        .bind(article.sentiment)
        .bind(article.bias.detected)
        .bind(&article.bias.analysis)
        .bind(article.bias.confidence)
        .bind(article.ai_processed)
        .bind(&article.fingerprint)
        .bind(article.published_at)
        .bind(article.scraped_at)
        .bind(article.views)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                StoreError::DuplicateFingerprint(article.fingerprint.clone()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_scraping_log(&self, log: &ScrapingLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scraping_logs
                (id, source_name, articles_found, articles_saved, errors,
                 duration_ms, status, scraped_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(log.id)
        .bind(&log.source_name)
        .bind(log.articles_found as i32)
        .bind(log.articles_saved as i32)
        .bind(log.errors as i32)
        .bind(log.duration_ms)
        .bind(&log.status)
        .bind(log.scraped_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn touch_source_scraped(&self, source_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE sources SET last_scraped_at = $2 WHERE id = $1")
            .bind(source_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn recent_logs(&self, limit: i64) -> Result<Vec<ScrapingLog>> {
        let rows = sqlx::query_as::<_, ScrapingLogRow>(
            r#"
            SELECT * FROM scraping_logs
            ORDER BY scraped_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_articles(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// --- Row types ---

#[derive(Debug, sqlx::FromRow)]
struct SourceRow {
    id: Uuid,
    name: String,
    feed_url: String,
    base_url: String,
    language: String,
    country: String,
    active: bool,
    last_scraped_at: Option<DateTime<Utc>>,
}

impl From<SourceRow> for Source {
    fn from(r: SourceRow) -> Self {
        Source {
            id: r.id,
            name: r.name,
            feed_url: r.feed_url,
            base_url: r.base_url,
            language: r.language,
            country: r.country,
            active: r.active,
            last_scraped_at: r.last_scraped_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ArticleRow {
    id: Uuid,
    source_id: Uuid,
    title: String,
    content: String,
    summary: String,
    url: String,
    image_url: Option<String>,
    author: Option<String>,
    category: String,
    status: String,
    tags: serde_json::Value,
    sentiment: f32,
    bias_detected: bool,
    bias_analysis: String,
    bias_confidence: f32,
    ai_processed: bool,
    fingerprint: String,
    published_at: DateTime<Utc>,
    scraped_at: DateTime<Utc>,
    views: i64,
}

impl From<ArticleRow> for ArticleRecord {
    fn from(r: ArticleRow) -> Self {
        let tags = serde_json::from_value(r.tags).unwrap_or_default();
        let status = match r.status.as_str() {
            "published" => ArticleStatus::Published,
            _ => ArticleStatus::Draft,
        };
        ArticleRecord {
            id: r.id,
            source_id: r.source_id,
            title: r.title,
            content: r.content,
            summary: r.summary,
            url: r.url,
            image_url: r.image_url,
            author: r.author,
            category: Category::parse(&r.category),
            status,
            tags,
            sentiment: r.sentiment,
            bias: BiasSignal {
                detected: r.bias_detected,
                analysis: r.bias_analysis,
                confidence: r.bias_confidence,
            },
            ai_processed: r.ai_processed,
            fingerprint: r.fingerprint,
            published_at: r.published_at,
            scraped_at: r.scraped_at,
            views: r.views,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ScrapingLogRow {
    id: Uuid,
    source_name: String,
    articles_found: i32,
    articles_saved: i32,
    errors: i32,
    duration_ms: i64,
    status: String,
    scraped_at: DateTime<Utc>,
}

impl From<ScrapingLogRow> for ScrapingLog {
    fn from(r: ScrapingLogRow) -> Self {
        ScrapingLog {
            id: r.id,
            source_name: r.source_name,
            articles_found: r.articles_found.max(0) as u32,
            articles_saved: r.articles_saved.max(0) as u32,
            errors: r.errors.max(0) as u32,
            duration_ms: r.duration_ms,
            status: r.status,
            scraped_at: r.scraped_at,
        }
    }
}
