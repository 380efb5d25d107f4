//! Shared test doubles and fixtures for the pipeline test suites.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use newswire_common::{
    BiasSignal, CandidateEntry, Category, Enrichment, ExtractedArticle, NewSource, Source,
};
use newswire_store::{ArticleStore, MemoryStore};

use crate::fetch::PageFetcher;
use crate::scheduler::Settings;

/// Serves canned pages by URL. Unregistered URLs fail; hanging URLs never
/// resolve (they run into the caller's deadline).
pub struct StaticFetcher {
    pages: HashMap<String, String>,
    hanging: HashSet<String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            hanging: HashSet::new(),
        }
    }

    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn with_hanging(mut self, url: &str) -> Self {
        self.hanging.insert(url.to_string());
        self
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn get(&self, url: &str) -> Result<String> {
        if self.hanging.contains(url) {
            futures::future::pending::<()>().await;
            unreachable!();
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("connection refused: {url}"))
    }
}

/// Never responds at all.
pub struct SlowFetcher;

#[async_trait]
impl PageFetcher for SlowFetcher {
    async fn get(&self, _url: &str) -> Result<String> {
        futures::future::pending::<()>().await;
        unreachable!();
    }
}

/// Returns a fixed body after a delay, tracking peak in-flight requests.
pub struct TrackingFetcher {
    body: String,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl TrackingFetcher {
    pub fn new(body: &str, delay: Duration) -> Self {
        Self {
            body: body.to_string(),
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for TrackingFetcher {
    async fn get(&self, _url: &str) -> Result<String> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.body.clone())
    }
}

// --- Fixtures ---

pub fn sample_source() -> Source {
    Source {
        id: Uuid::new_v4(),
        name: "Example Wire".into(),
        feed_url: "https://example.com/rss.xml".into(),
        base_url: "https://example.com".into(),
        language: "en".into(),
        country: "us".into(),
        active: true,
        last_scraped_at: None,
    }
}

pub fn sample_entry(link: &str) -> CandidateEntry {
    CandidateEntry {
        title: "Feed headline".into(),
        link: link.to_string(),
        summary: String::new(),
        published_at: None,
        author: None,
    }
}

pub fn sample_extracted(url: &str) -> ExtractedArticle {
    ExtractedArticle {
        title: "Parliament approves budget after marathon session".into(),
        content: "Lawmakers approved the national budget late on Monday after weeks of \
                  negotiation, ending a standoff that had stalled public spending plans."
            .into(),
        summary: String::new(),
        url: url.to_string(),
        image_url: None,
        author: Some("Wire Desk".into()),
        published_at: Utc::now(),
        category: Category::Politics,
    }
}

pub fn sample_enrichment() -> Enrichment {
    Enrichment {
        summary: "Lawmakers approved the budget after weeks of negotiation.".into(),
        category: Category::Politics,
        sentiment: 0.2,
        tags: vec!["budget".into(), "parliament".into()],
        bias: BiasSignal::default(),
        ai_processed: false,
    }
}

pub async fn store_with_source() -> (Arc<MemoryStore>, Source) {
    let store = Arc::new(MemoryStore::new());
    let source = store
        .get_or_create_source(&NewSource {
            name: "Example Wire".into(),
            feed_url: "https://example.com/rss.xml".into(),
            base_url: "https://example.com".into(),
            language: "en".into(),
            country: "us".into(),
        })
        .await
        .expect("memory store source");
    (store, source)
}

/// Settings with zero pacing delays so timing tests only see deliberate
/// timers.
pub fn test_settings() -> Settings {
    Settings {
        article_delay: Duration::ZERO,
        source_delay: Duration::ZERO,
        ..Settings::default()
    }
}

/// Minimal RSS document with one item per link.
pub fn feed_xml(links: &[&str]) -> String {
    let items: String = links
        .iter()
        .enumerate()
        .map(|(i, link)| {
            format!(
                "<item><title>Story {i}</title><link>{link}</link>\
                 <description>Summary {i}</description></item>"
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <rss version=\"2.0\"><channel><title>Example Wire</title>{items}</channel></rss>"
    )
}

/// Article page with enough paragraph text to clear the extraction
/// threshold.
pub fn page_html(headline: &str) -> String {
    format!(
        "<html><head><title>{headline}</title></head><body>\
         <h1>{headline}</h1>\
         <article>\
         <p>The first paragraph carries enough words to clear the minimum \
         content threshold used by the extractor for {headline}.</p>\
         <p>A second paragraph adds further detail so the cleaned text is \
         comfortably past one hundred characters.</p>\
         </article></body></html>"
    )
}
