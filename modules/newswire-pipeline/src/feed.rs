use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use newswire_common::{CandidateEntry, Source};

use crate::fetch::PageFetcher;

/// Cap on candidate entries per source per cycle. Bounds downstream
/// extraction and enrichment work.
const FEED_MAX_ITEMS: usize = 3;

/// Fetches and parses a source's RSS/Atom feed into candidate entries.
pub struct FeedFetcher {
    fetcher: Arc<dyn PageFetcher>,
}

impl FeedFetcher {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch the feed for a source. Network failure or malformed feed
    /// content yields an empty list: "zero found", never an error past
    /// this boundary. Retry is a cycle-level concern.
    pub async fn fetch(&self, source: &Source) -> Vec<CandidateEntry> {
        match self.fetch_inner(source).await {
            Ok(entries) => {
                info!(
                    source = source.name.as_str(),
                    entries = entries.len(),
                    "Fetched feed"
                );
                entries
            }
            Err(e) => {
                warn!(
                    source = source.name.as_str(),
                    feed_url = source.feed_url.as_str(),
                    error = %e,
                    "Feed fetch failed"
                );
                Vec::new()
            }
        }
    }

    async fn fetch_inner(&self, source: &Source) -> Result<Vec<CandidateEntry>> {
        let body = self
            .fetcher
            .get(&source.feed_url)
            .await
            .context("Feed request failed")?;

        let feed =
            feed_rs::parser::parse(body.as_bytes()).context("Failed to parse RSS/Atom feed")?;

        let entries = feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                // Require a link
                let link = entry
                    .links
                    .first()
                    .map(|l| l.href.clone())
                    .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;

                let published_at = entry
                    .published
                    .or(entry.updated)
                    .map(|dt| dt.with_timezone(&Utc));

                Some(CandidateEntry {
                    title: entry.title.map(|t| t.content).unwrap_or_default(),
                    link,
                    summary: entry.summary.map(|s| s.content).unwrap_or_default(),
                    published_at,
                    author: entry
                        .authors
                        .first()
                        .map(|a| a.name.clone())
                        .filter(|n| !n.is_empty()),
                })
            })
            .take(FEED_MAX_ITEMS)
            .collect();

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_source, StaticFetcher};

    const FEED_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Wire</title>
    <item>
      <title>First story</title>
      <link>https://example.com/articles/1</link>
      <description>Summary one</description>
      <author>Desk One</author>
      <pubDate>Mon, 03 Aug 2026 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Second story</title>
      <link>https://example.com/articles/2</link>
      <description>Summary two</description>
    </item>
    <item>
      <title>Third story</title>
      <link>https://example.com/articles/3</link>
    </item>
    <item>
      <title>Fourth story</title>
      <link>https://example.com/articles/4</link>
    </item>
  </channel>
</rss>"#;

    #[tokio::test]
    async fn parses_feed_and_caps_entries() {
        let source = sample_source();
        let fetcher = StaticFetcher::new().with_page(&source.feed_url, FEED_XML);
        let feed = FeedFetcher::new(Arc::new(fetcher));

        let entries = feed.fetch(&source).await;
        assert_eq!(entries.len(), 3, "entries are capped at {FEED_MAX_ITEMS}");
        assert_eq!(entries[0].title, "First story");
        assert_eq!(entries[0].link, "https://example.com/articles/1");
        assert_eq!(entries[0].summary, "Summary one");
        assert!(entries[0].published_at.is_some());
        assert!(entries[1].published_at.is_none());
    }

    #[tokio::test]
    async fn malformed_feed_yields_empty_list() {
        let source = sample_source();
        let fetcher = StaticFetcher::new().with_page(&source.feed_url, "this is not xml at all");
        let feed = FeedFetcher::new(Arc::new(fetcher));

        assert!(feed.fetch(&source).await.is_empty());
    }

    #[tokio::test]
    async fn network_failure_yields_empty_list() {
        let source = sample_source();
        // No pages registered: every get() errors
        let feed = FeedFetcher::new(Arc::new(StaticFetcher::new()));

        assert!(feed.fetch(&source).await.is_empty());
    }

    #[tokio::test]
    async fn entries_without_links_are_dropped() {
        let source = sample_source();
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>t</title>
  <item><title>No link here</title></item>
  <item><title>Linked</title><link>https://example.com/a</link></item>
</channel></rss>"#;
        let fetcher = StaticFetcher::new().with_page(&source.feed_url, xml);
        let feed = FeedFetcher::new(Arc::new(fetcher));

        let entries = feed.fetch(&source).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Linked");
    }
}
