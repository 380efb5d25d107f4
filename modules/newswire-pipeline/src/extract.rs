use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use newswire_common::{CandidateEntry, ExtractedArticle, Source};

use crate::enrich::lexicon_category;
use crate::fetch::PageFetcher;

/// Worker pool size for per-source extraction fan-out.
const MAX_CONCURRENT_EXTRACTIONS: usize = 8;
/// Deadline for a single extraction task.
const TASK_TIMEOUT: Duration = Duration::from_secs(3);
/// Deadline for one source's whole extraction batch.
const SOURCE_TIMEOUT: Duration = Duration::from_secs(15);

/// Minimum cleaned text length for a selector match to count as the body.
const MIN_CONTENT_CHARS: usize = 100;
/// Paragraphs shorter than this are boilerplate (bylines, captions).
const MIN_PARAGRAPH_CHARS: usize = 20;

/// Ordered content regions. First region whose paragraph text clears
/// MIN_CONTENT_CHARS wins; `body` is the whole-page fallback.
const CONTENT_SELECTORS: &[&str] = &["article", "main", ".article-content", "body"];
/// Elements whose text never belongs to the article body.
const NOISE_ELEMENTS: &[&str] = &["script", "style", "nav", "header", "footer", "aside", "form"];

/// Typed outcome of one extraction attempt. "No article" is an outcome,
/// not a caught exception.
#[derive(Debug)]
pub enum ExtractOutcome {
    Extracted(ExtractedArticle),
    /// Page fetched but nothing usable was found.
    Empty,
    /// Network failure or timeout.
    Failed,
}

pub struct ContentExtractor {
    fetcher: Arc<dyn PageFetcher>,
    max_concurrent: usize,
    task_timeout: Duration,
    source_timeout: Duration,
}

impl ContentExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            max_concurrent: MAX_CONCURRENT_EXTRACTIONS,
            task_timeout: TASK_TIMEOUT,
            source_timeout: SOURCE_TIMEOUT,
        }
    }

    /// Override pool size and deadlines. Used by tests; production keeps
    /// the defaults.
    pub fn with_limits(
        mut self,
        max_concurrent: usize,
        task_timeout: Duration,
        source_timeout: Duration,
    ) -> Self {
        self.max_concurrent = max_concurrent;
        self.task_timeout = task_timeout;
        self.source_timeout = source_timeout;
        self
    }

    /// Extract all candidates for one source on a bounded worker pool.
    ///
    /// Each task runs under the per-task deadline; the whole batch runs
    /// under the per-source deadline. On batch deadline the results
    /// collected so far are kept and the remainder count as `Failed`, so
    /// one slow site cannot stall the cycle.
    pub async fn extract_all(
        &self,
        entries: Vec<CandidateEntry>,
        source: &Source,
    ) -> Vec<ExtractOutcome> {
        let total = entries.len();
        let results: Mutex<Vec<ExtractOutcome>> = Mutex::new(Vec::with_capacity(total));

        let batch = stream::iter(entries.into_iter().map(|entry| async move {
            match tokio::time::timeout(self.task_timeout, self.extract(&entry, source)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(url = entry.link.as_str(), "Extraction timed out");
                    ExtractOutcome::Failed
                }
            }
        }))
        .buffer_unordered(self.max_concurrent)
        .for_each(|outcome| {
            results
                .lock()
                .expect("extraction results lock poisoned")
                .push(outcome);
            futures::future::ready(())
        });

        if tokio::time::timeout(self.source_timeout, batch).await.is_err() {
            warn!(
                source = source.name.as_str(),
                "Source extraction deadline exceeded"
            );
        }

        let mut outcomes = results.into_inner().expect("extraction results lock poisoned");
        while outcomes.len() < total {
            outcomes.push(ExtractOutcome::Failed);
        }
        outcomes
    }

    /// Extract one candidate. Any network or parse problem for this URL is
    /// contained here and never aborts sibling extractions.
    pub async fn extract(&self, entry: &CandidateEntry, source: &Source) -> ExtractOutcome {
        let html = match self.fetcher.get(&entry.link).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = entry.link.as_str(), error = %e, "Article fetch failed");
                return ExtractOutcome::Failed;
            }
        };

        // Html is parsed and dropped synchronously, never held across an await.
        build_article(&html, entry, source)
    }
}

/// Assemble an article from page HTML, falling back to the feed entry's own
/// title/summary where the page yields nothing usable.
fn build_article(html: &str, entry: &CandidateEntry, source: &Source) -> ExtractOutcome {
    let page = parse_page(html, &source.base_url);

    let title = page
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| entry.title.clone());
    if title.is_empty() {
        return ExtractOutcome::Empty;
    }

    let feed_summary = strip_tags(&entry.summary);
    let content = match page.content {
        Some(content) => content,
        None if !feed_summary.is_empty() => feed_summary.clone(),
        None => {
            debug!(url = entry.link.as_str(), "No usable content on page");
            return ExtractOutcome::Empty;
        }
    };

    let summary = if feed_summary.is_empty() {
        String::new()
    } else {
        feed_summary
    };

    let category = lexicon_category(&format!("{title} {content}"));

    ExtractOutcome::Extracted(ExtractedArticle {
        title,
        content,
        summary,
        url: entry.link.clone(),
        image_url: page.image_url,
        author: entry.author.clone(),
        published_at: entry.published_at.unwrap_or_else(Utc::now),
        category,
    })
}

struct PageParts {
    title: Option<String>,
    content: Option<String>,
    image_url: Option<String>,
}

fn parse_page(html: &str, base_url: &str) -> PageParts {
    let document = Html::parse_document(html);

    let title = first_text(&document, "h1").or_else(|| first_text(&document, "title"));

    let mut content = None;
    for selector in CONTENT_SELECTORS {
        if let Some(text) = region_text(&document, selector) {
            if text.len() >= MIN_CONTENT_CHARS {
                content = Some(text);
                break;
            }
        }
    }

    let image_url = first_image(&document, "article img")
        .or_else(|| first_image(&document, "img"))
        .and_then(|src| resolve_image_url(&src, base_url));

    PageParts {
        title,
        content,
        image_url,
    }
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next().map(|el| {
        el.text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    })
}

/// Paragraph text within a content region, skipping paragraphs nested in
/// noise elements and boilerplate-length fragments.
fn region_text(document: &Html, region: &str) -> Option<String> {
    let region_selector = Selector::parse(region).ok()?;
    let paragraph_selector = Selector::parse("p").ok()?;

    let region_el = document.select(&region_selector).next()?;

    let paragraphs: Vec<String> = region_el
        .select(&paragraph_selector)
        .filter(|p| !in_noise(p))
        .map(|p| p.text().collect::<String>().trim().to_string())
        .filter(|text| text.len() >= MIN_PARAGRAPH_CHARS)
        .collect();

    if paragraphs.is_empty() {
        None
    } else {
        Some(paragraphs.join("\n\n"))
    }
}

fn in_noise(el: &ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| NOISE_ELEMENTS.contains(&a.value().name()))
}

fn first_image(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("src"))
        .map(|src| src.to_string())
        .next()
}

/// Resolve protocol-relative and root-relative image URLs against the
/// source's base URL. Anything else must already be absolute.
fn resolve_image_url(src: &str, base_url: &str) -> Option<String> {
    if src.starts_with("//") {
        return Some(format!("https:{src}"));
    }
    if src.starts_with('/') {
        return Url::parse(base_url)
            .and_then(|base| base.join(src))
            .map(|u| u.to_string())
            .ok();
    }
    if src.starts_with("http://") || src.starts_with("https://") {
        return Some(src.to_string());
    }
    None
}

/// Strip markup from feed-supplied summaries. Feeds routinely embed HTML in
/// description elements.
fn strip_tags(text: &str) -> String {
    let tag_re = regex::Regex::new(r"<[^>]+>").expect("valid regex");
    tag_re
        .replace_all(text, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
