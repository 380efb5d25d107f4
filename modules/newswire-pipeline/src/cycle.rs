use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use newswire_common::{CycleReport, ScrapingLog, Source, SourceReport};
use newswire_store::ArticleStore;

use crate::enrich::EnrichmentEngine;
use crate::extract::{ContentExtractor, ExtractOutcome};
use crate::feed::FeedFetcher;
use crate::fetch::PageFetcher;
use crate::gateway::{ArticleGateway, SaveOutcome};
use crate::perf::PerformanceMonitor;
use crate::scheduler::Settings;

/// Drives one ingestion cycle: for each active source, fetch the feed, fan
/// out extraction, enrich, and save, with pacing delays between articles and
/// sources. Not serialized against concurrent invocation; that is the
/// scheduler's job.
pub struct CycleRunner {
    store: Arc<dyn ArticleStore>,
    feed: FeedFetcher,
    extractor: ContentExtractor,
    enricher: EnrichmentEngine,
    gateway: ArticleGateway,
    monitor: Arc<PerformanceMonitor>,
}

impl CycleRunner {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        fetcher: Arc<dyn PageFetcher>,
        enricher: EnrichmentEngine,
        monitor: Arc<PerformanceMonitor>,
    ) -> Self {
        Self {
            feed: FeedFetcher::new(fetcher.clone()),
            extractor: ContentExtractor::new(fetcher),
            gateway: ArticleGateway::new(store.clone()),
            store,
            enricher,
            monitor,
        }
    }

    /// One full pass across all active sources in stable registry order.
    /// A source whose pass yields nothing does not halt the rest.
    pub async fn run_cycle(&self, settings: &Settings) -> CycleReport {
        let mut report = CycleReport::new(Utc::now());
        info!("Starting scraping cycle");

        let sources = match self.store.list_sources().await {
            Ok(sources) => sources,
            Err(e) => {
                warn!(error = %e, "Failed to list sources, aborting cycle");
                report.errors += 1;
                report.finished_at = Utc::now();
                return report;
            }
        };

        let active: Vec<Source> = sources.into_iter().filter(|s| s.active).collect();
        for (i, source) in active.iter().enumerate() {
            let source_report = self
                .monitor
                .time("process_source", self.run_source(source, settings))
                .await;
            report.absorb(source_report);

            // Pacing between sources, not after the last one
            if i + 1 < active.len() {
                sleep(settings.source_delay).await;
            }
        }

        report.finished_at = Utc::now();
        info!(
            sources = report.sources_processed,
            found = report.found,
            processed = report.processed,
            saved = report.saved,
            skipped = report.skipped,
            errors = report.errors,
            "Cycle complete"
        );
        report
    }

    /// One source's pass: fetch → parallel extract → enrich → save, then
    /// append the scraping log and touch the source's last-scraped
    /// timestamp. Also serves as the manual per-source trigger.
    ///
    /// `found` counts feed candidates; a candidate whose extraction fails or
    /// times out stays in `found` and increments `errors`.
    pub async fn run_source(&self, source: &Source, settings: &Settings) -> SourceReport {
        let started = Instant::now();
        let mut report = SourceReport {
            source: source.name.clone(),
            ..SourceReport::default()
        };

        let entries = self.feed.fetch(source).await;
        report.found = entries.len() as u32;

        if entries.is_empty() {
            info!(source = source.name.as_str(), "No articles found");
        } else {
            let entries: Vec<_> = entries
                .into_iter()
                .take(settings.max_articles_per_source)
                .collect();
            let outcomes = self.extractor.extract_all(entries, source).await;

            let mut first = true;
            for outcome in outcomes {
                match outcome {
                    ExtractOutcome::Extracted(article) => {
                        if !first {
                            sleep(settings.article_delay).await;
                        }
                        first = false;

                        let article_start = Instant::now();
                        let enrichment = if settings.ai_enabled {
                            self.monitor
                                .time(
                                    "enrich_article",
                                    self.enricher.enrich(&article.title, &article.content),
                                )
                                .await
                        } else {
                            self.enricher.enrich_local(&article.title, &article.content)
                        };
                        report.processed += 1;

                        let saved = self
                            .gateway
                            .save(&article, &enrichment, source, settings.auto_publish)
                            .await;
                        match saved {
                            SaveOutcome::Saved => report.saved += 1,
                            SaveOutcome::Duplicate => report.skipped += 1,
                            SaveOutcome::Failed => report.errors += 1,
                        }
                        self.monitor.record(
                            "process_article",
                            article_start.elapsed(),
                            saved != SaveOutcome::Failed,
                        );
                    }
                    ExtractOutcome::Empty | ExtractOutcome::Failed => report.errors += 1,
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as i64;

        let log = ScrapingLog {
            id: Uuid::new_v4(),
            source_name: source.name.clone(),
            articles_found: report.found,
            articles_saved: report.saved,
            errors: report.errors,
            duration_ms: report.duration_ms,
            status: if report.errors == 0 {
                "completed".to_string()
            } else {
                "partial".to_string()
            },
            scraped_at: Utc::now(),
        };
        if let Err(e) = self.store.insert_scraping_log(&log).await {
            warn!(source = source.name.as_str(), error = %e, "Failed to record scraping log");
        }
        if let Err(e) = self.store.touch_source_scraped(source.id, Utc::now()).await {
            warn!(source = source.name.as_str(), error = %e, "Failed to update source timestamp");
        }

        info!(
            source = source.name.as_str(),
            found = report.found,
            processed = report.processed,
            saved = report.saved,
            skipped = report.skipped,
            errors = report.errors,
            "Source pass complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::EnrichmentEngine;
    use crate::testing::{feed_xml, page_html, test_settings, StaticFetcher};
    use newswire_common::NewSource;
    use newswire_store::MemoryStore;

    fn runner(store: Arc<MemoryStore>, fetcher: StaticFetcher) -> CycleRunner {
        CycleRunner::new(
            store,
            Arc::new(fetcher),
            EnrichmentEngine::local_only(),
            Arc::new(PerformanceMonitor::new()),
        )
    }

    async fn add_source(store: &MemoryStore, name: &str, feed_url: &str) -> Source {
        store
            .get_or_create_source(&NewSource {
                name: name.into(),
                feed_url: feed_url.into(),
                base_url: "https://example.com".into(),
                language: "en".into(),
                country: "us".into(),
            })
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_counts_timeout_as_found_but_errored() {
        let store = Arc::new(MemoryStore::new());
        add_source(&store, "Example Wire", "https://example.com/rss.xml").await;

        // Three feed entries; articles 1 and 2 resolve, article 3 hangs
        // until the per-task deadline.
        let fetcher = StaticFetcher::new()
            .with_page(
                "https://example.com/rss.xml",
                &feed_xml(&[
                    "https://example.com/articles/1",
                    "https://example.com/articles/2",
                    "https://example.com/articles/3",
                ]),
            )
            .with_page("https://example.com/articles/1", &page_html("First headline"))
            .with_page("https://example.com/articles/2", &page_html("Second headline"))
            .with_hanging("https://example.com/articles/3");

        let report = runner(store.clone(), fetcher)
            .run_cycle(&test_settings())
            .await;

        assert_eq!(report.found, 3);
        assert_eq!(report.processed, 2);
        assert_eq!(report.saved, 2);
        assert_eq!(report.errors, 1);
        assert_eq!(store.count_articles().await.unwrap(), 2);

        // Articles were enriched with no provider configured
        let articles = store.articles();
        assert!(articles.iter().all(|a| !a.ai_processed));
        assert!(articles.iter().all(|a| !a.summary.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn rescrape_of_same_articles_saves_nothing() {
        let store = Arc::new(MemoryStore::new());
        add_source(&store, "Example Wire", "https://example.com/rss.xml").await;

        let fetcher = StaticFetcher::new()
            .with_page(
                "https://example.com/rss.xml",
                &feed_xml(&["https://example.com/articles/1"]),
            )
            .with_page("https://example.com/articles/1", &page_html("Same headline"));

        let runner = runner(store.clone(), fetcher);
        let settings = test_settings();

        let first = runner.run_cycle(&settings).await;
        assert_eq!(first.saved, 1);
        assert_eq!(first.skipped, 0);

        let second = runner.run_cycle(&settings).await;
        assert_eq!(second.saved, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(second.errors, 0);

        assert_eq!(store.count_articles().await.unwrap(), 1);
        // One log row per (source, cycle)
        assert_eq!(store.logs().len(), 2);
        assert_eq!(store.logs()[1].articles_saved, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dead_source_does_not_halt_the_cycle() {
        let store = Arc::new(MemoryStore::new());
        add_source(&store, "Dead Wire", "https://dead.example.com/rss.xml").await;
        add_source(&store, "Live Wire", "https://example.com/rss.xml").await;

        let fetcher = StaticFetcher::new()
            .with_page(
                "https://example.com/rss.xml",
                &feed_xml(&["https://example.com/articles/1"]),
            )
            .with_page("https://example.com/articles/1", &page_html("Live headline"));

        let report = runner(store.clone(), fetcher)
            .run_cycle(&test_settings())
            .await;

        assert_eq!(report.sources_processed, 2);
        assert_eq!(report.saved, 1);
        // The dead feed is zero found, not an error
        let dead = report.sources.iter().find(|s| s.source == "Dead Wire").unwrap();
        assert_eq!(dead.found, 0);
        assert_eq!(dead.errors, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn inactive_sources_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        add_source(&store, "Example Wire", "https://example.com/rss.xml").await;
        add_source(&store, "Paused Wire", "https://paused.example.com/rss.xml").await;
        store.set_active("Paused Wire", false);

        let fetcher = StaticFetcher::new()
            .with_page(
                "https://example.com/rss.xml",
                &feed_xml(&["https://example.com/articles/1"]),
            )
            .with_page("https://example.com/articles/1", &page_html("Headline"));

        let report = runner(store.clone(), fetcher)
            .run_cycle(&test_settings())
            .await;
        assert_eq!(report.sources_processed, 1);
        assert_eq!(report.sources[0].source, "Example Wire");

        let sources = store.list_sources().await.unwrap();
        let live = sources.iter().find(|s| s.name == "Example Wire").unwrap();
        let paused = sources.iter().find(|s| s.name == "Paused Wire").unwrap();
        assert!(live.last_scraped_at.is_some(), "active source was touched");
        assert!(paused.last_scraped_at.is_none(), "inactive source untouched");
    }

    #[tokio::test(start_paused = true)]
    async fn scraping_log_records_partial_status_on_errors() {
        let store = Arc::new(MemoryStore::new());
        add_source(&store, "Example Wire", "https://example.com/rss.xml").await;

        let fetcher = StaticFetcher::new()
            .with_page(
                "https://example.com/rss.xml",
                &feed_xml(&["https://example.com/articles/1", "https://example.com/articles/2"]),
            )
            .with_page("https://example.com/articles/1", &page_html("Headline"));
        // Article 2 is unregistered: fetch fails

        runner(store.clone(), fetcher).run_cycle(&test_settings()).await;

        let logs = store.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].articles_found, 2);
        assert_eq!(logs[0].articles_saved, 1);
        assert_eq!(logs[0].errors, 1);
        assert_eq!(logs[0].status, "partial");
    }
}
