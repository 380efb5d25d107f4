use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use newswire_common::NewSource;
use newswire_store::ArticleStore;

/// Curated default source registry. Admin tooling can add more or toggle
/// `active` later; the pipeline itself never deletes a source.
pub fn default_sources() -> Vec<NewSource> {
    [
        (
            "BBC World",
            "https://feeds.bbci.co.uk/news/world/rss.xml",
            "https://www.bbc.co.uk",
            "en",
            "gb",
        ),
        (
            "Al Jazeera English",
            "https://www.aljazeera.com/xml/rss/all.xml",
            "https://www.aljazeera.com",
            "en",
            "qa",
        ),
        (
            "The Guardian World",
            "https://www.theguardian.com/world/rss",
            "https://www.theguardian.com",
            "en",
            "gb",
        ),
        (
            "NPR News",
            "https://feeds.npr.org/1001/rss.xml",
            "https://www.npr.org",
            "en",
            "us",
        ),
        (
            "France 24",
            "https://www.france24.com/en/rss",
            "https://www.france24.com",
            "en",
            "fr",
        ),
    ]
    .into_iter()
    .map(|(name, feed_url, base_url, language, country)| NewSource {
        name: name.to_string(),
        feed_url: feed_url.to_string(),
        base_url: base_url.to_string(),
        language: language.to_string(),
        country: country.to_string(),
    })
    .collect()
}

/// Upsert the curated sources into the store. Idempotent; run at startup.
pub async fn sync_sources(store: Arc<dyn ArticleStore>) -> Result<usize> {
    let sources = default_sources();
    for source in &sources {
        store.get_or_create_source(source).await?;
    }
    info!(count = sources.len(), "Source registry synced");
    Ok(sources.len())
}
