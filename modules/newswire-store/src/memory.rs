//! In-memory [`ArticleStore`] for tests and local runs without Postgres.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use newswire_common::{ArticleRecord, NewSource, ScrapingLog, Source};

use crate::store::{ArticleStore, Result, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    sources: Vec<Source>,
    articles: Vec<ArticleRecord>,
    logs: Vec<ScrapingLog>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store lock poisoned")
    }

    /// Articles inserted so far, in insertion order.
    pub fn articles(&self) -> Vec<ArticleRecord> {
        self.lock().articles.clone()
    }

    /// Scraping logs appended so far, in insertion order.
    pub fn logs(&self) -> Vec<ScrapingLog> {
        self.lock().logs.clone()
    }

    /// Admin toggle for a source's active flag.
    pub fn set_active(&self, name: &str, active: bool) {
        let mut inner = self.lock();
        if let Some(source) = inner.sources.iter_mut().find(|s| s.name == name) {
            source.active = active;
        }
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn get_or_create_source(&self, source: &NewSource) -> Result<Source> {
        let mut inner = self.lock();
        if let Some(existing) = inner.sources.iter().find(|s| s.name == source.name) {
            return Ok(existing.clone());
        }
        let created = Source {
            id: Uuid::new_v4(),
            name: source.name.clone(),
            feed_url: source.feed_url.clone(),
            base_url: source.base_url.clone(),
            language: source.language.clone(),
            country: source.country.clone(),
            active: true,
            last_scraped_at: None,
        };
        inner.sources.push(created.clone());
        Ok(created)
    }

    async fn list_sources(&self) -> Result<Vec<Source>> {
        let mut sources = self.lock().sources.clone();
        sources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sources)
    }

    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<ArticleRecord>> {
        Ok(self
            .lock()
            .articles
            .iter()
            .find(|a| a.fingerprint == fingerprint)
            .cloned())
    }

    async fn insert_article(&self, article: &ArticleRecord) -> Result<()> {
        let mut inner = self.lock();
        if inner
            .articles
            .iter()
            .any(|a| a.fingerprint == article.fingerprint)
        {
            return Err(StoreError::DuplicateFingerprint(article.fingerprint.clone()));
        }
        inner.articles.push(article.clone());
        Ok(())
    }

    async fn insert_scraping_log(&self, log: &ScrapingLog) -> Result<()> {
        self.lock().logs.push(log.clone());
        Ok(())
    }

    async fn touch_source_scraped(&self, source_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.lock();
        if let Some(source) = inner.sources.iter_mut().find(|s| s.id == source_id) {
            source.last_scraped_at = Some(at);
        }
        Ok(())
    }

    async fn recent_logs(&self, limit: i64) -> Result<Vec<ScrapingLog>> {
        let mut logs = self.lock().logs.clone();
        logs.sort_by(|a, b| b.scraped_at.cmp(&a.scraped_at));
        logs.truncate(limit.max(0) as usize);
        Ok(logs)
    }

    async fn count_articles(&self) -> Result<i64> {
        Ok(self.lock().articles.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newswire_common::{ArticleStatus, BiasSignal, Category};

    fn sample_source() -> NewSource {
        NewSource {
            name: "Example Wire".into(),
            feed_url: "https://example.com/rss.xml".into(),
            base_url: "https://example.com".into(),
            language: "en".into(),
            country: "us".into(),
        }
    }

    fn sample_article(source_id: Uuid, fingerprint: &str) -> ArticleRecord {
        ArticleRecord {
            id: Uuid::new_v4(),
            source_id,
            title: "Title".into(),
            content: "Content".into(),
            summary: "Summary".into(),
            url: "https://example.com/a".into(),
            image_url: None,
            author: None,
            category: Category::General,
            status: ArticleStatus::Draft,
            tags: vec![],
            sentiment: 0.0,
            bias: BiasSignal::default(),
            ai_processed: false,
            fingerprint: fingerprint.into(),
            published_at: Utc::now(),
            scraped_at: Utc::now(),
            views: 0,
        }
    }

    #[tokio::test]
    async fn get_or_create_source_is_idempotent() {
        let store = MemoryStore::new();
        let a = store.get_or_create_source(&sample_source()).await.unwrap();
        let b = store.get_or_create_source(&sample_source()).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(store.list_sources().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_fingerprint_is_rejected() {
        let store = MemoryStore::new();
        let source = store.get_or_create_source(&sample_source()).await.unwrap();

        store
            .insert_article(&sample_article(source.id, "abc"))
            .await
            .unwrap();

        let err = store
            .insert_article(&sample_article(source.id, "abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateFingerprint(_)));
        assert_eq!(store.count_articles().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn find_by_fingerprint_round_trips() {
        let store = MemoryStore::new();
        let source = store.get_or_create_source(&sample_source()).await.unwrap();
        store
            .insert_article(&sample_article(source.id, "xyz"))
            .await
            .unwrap();

        assert!(store.find_by_fingerprint("xyz").await.unwrap().is_some());
        assert!(store.find_by_fingerprint("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn touch_source_updates_last_scraped() {
        let store = MemoryStore::new();
        let source = store.get_or_create_source(&sample_source()).await.unwrap();
        assert!(source.last_scraped_at.is_none());

        let now = Utc::now();
        store.touch_source_scraped(source.id, now).await.unwrap();

        let sources = store.list_sources().await.unwrap();
        assert_eq!(sources[0].last_scraped_at, Some(now));
    }
}
