use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Sources ---

/// A configured news source as stored in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub name: String,
    pub feed_url: String,
    pub base_url: String,
    pub language: String,
    pub country: String,
    pub active: bool,
    pub last_scraped_at: Option<DateTime<Utc>>,
}

/// Source identity as configured, before the store has assigned an id.
#[derive(Debug, Clone)]
pub struct NewSource {
    pub name: String,
    pub feed_url: String,
    pub base_url: String,
    pub language: String,
    pub country: String,
}

// --- Transient pipeline types ---

/// One entry read from a source's feed. Lives for a single cycle.
#[derive(Debug, Clone)]
pub struct CandidateEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
}

/// Full-text article produced by the content extractor. Becomes an
/// [`ArticleRecord`] only after enrichment and a successful dedup check.
#[derive(Debug, Clone)]
pub struct ExtractedArticle {
    pub title: String,
    pub content: String,
    pub summary: String,
    pub url: String,
    pub image_url: Option<String>,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    /// Heuristic category hint. The persisted category always comes from
    /// the enrichment result.
    pub category: Category,
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Politics,
    Economy,
    Sports,
    RegionalAffairs,
    International,
    Technology,
    Health,
    Culture,
    General,
}

impl Category {
    /// Parse a category label, tolerating case and separator variations.
    /// Anything unrecognized maps to `General`.
    pub fn parse(s: &str) -> Self {
        Self::parse_strict(s).unwrap_or(Category::General)
    }

    /// Like [`Category::parse`] but returns `None` for unrecognized labels,
    /// so callers can distinguish "general" from "not a valid label".
    pub fn parse_strict(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        match normalized.as_str() {
            "politics" => Some(Category::Politics),
            "economy" => Some(Category::Economy),
            "sports" => Some(Category::Sports),
            "regional_affairs" => Some(Category::RegionalAffairs),
            "international" => Some(Category::International),
            "technology" => Some(Category::Technology),
            "health" => Some(Category::Health),
            "culture" => Some(Category::Culture),
            "general" => Some(Category::General),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Politics => "politics",
            Category::Economy => "economy",
            Category::Sports => "sports",
            Category::RegionalAffairs => "regional_affairs",
            Category::International => "international",
            Category::Technology => "technology",
            Category::Health => "health",
            Category::Culture => "culture",
            Category::General => "general",
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::General
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Draft,
    Published,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Published => "published",
        }
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Enrichment ---

/// Advisory editorial-slant signal. Never blocks publication.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BiasSignal {
    pub detected: bool,
    pub analysis: String,
    /// In [0, 1].
    pub confidence: f32,
}

/// AI-derived (or locally derived) metadata for one article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrichment {
    pub summary: String,
    pub category: Category,
    /// In [-1, 1].
    pub sentiment: f32,
    pub tags: Vec<String>,
    pub bias: BiasSignal,
    /// True iff at least one sub-task was produced by an external provider.
    pub ai_processed: bool,
}

// --- Persisted records ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: Uuid,
    pub source_id: Uuid,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub url: String,
    pub image_url: Option<String>,
    pub author: Option<String>,
    pub category: Category,
    pub status: ArticleStatus,
    pub tags: Vec<String>,
    pub sentiment: f32,
    pub bias: BiasSignal,
    pub ai_processed: bool,
    /// SHA-256 over title + content. Unique across the store.
    pub fingerprint: String,
    pub published_at: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
    /// Mutated by the serving layer, never by the pipeline.
    pub views: i64,
}

/// One row per (source, cycle). Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingLog {
    pub id: Uuid,
    pub source_name: String,
    pub articles_found: u32,
    pub articles_saved: u32,
    pub errors: u32,
    pub duration_ms: i64,
    pub status: String,
    pub scraped_at: DateTime<Utc>,
}

// --- Cycle reporting ---

/// Counters for one source's pass within a cycle.
///
/// `found` counts feed candidates; a candidate whose extraction fails or
/// times out stays in `found` and increments `errors`. `processed` counts
/// articles that made it through enrichment.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub found: u32,
    pub processed: u32,
    pub saved: u32,
    pub skipped: u32,
    pub errors: u32,
    pub duration_ms: i64,
}

/// Aggregated counters for one full pass across all active sources.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources_processed: u32,
    pub found: u32,
    pub processed: u32,
    pub saved: u32,
    pub skipped: u32,
    pub errors: u32,
    pub sources: Vec<SourceReport>,
}

impl CycleReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            sources_processed: 0,
            found: 0,
            processed: 0,
            saved: 0,
            skipped: 0,
            errors: 0,
            sources: Vec::new(),
        }
    }

    /// Fold a source report into the cycle totals.
    pub fn absorb(&mut self, report: SourceReport) {
        self.sources_processed += 1;
        self.found += report.found;
        self.processed += report.processed;
        self.saved += report.saved;
        self.skipped += report.skipped;
        self.errors += report.errors;
        self.sources.push(report);
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Cycle Complete ===")?;
        writeln!(f, "Sources processed: {}", self.sources_processed)?;
        writeln!(f, "Articles found:    {}", self.found)?;
        writeln!(f, "Articles enriched: {}", self.processed)?;
        writeln!(f, "Articles saved:    {}", self.saved)?;
        writeln!(f, "Duplicates:        {}", self.skipped)?;
        writeln!(f, "Errors:            {}", self.errors)?;
        writeln!(f, "Duration:          {}ms", self.duration_ms())?;
        for s in &self.sources {
            writeln!(
                f,
                "  {}: found={} processed={} saved={} skipped={} errors={}",
                s.source, s.found, s.processed, s.saved, s.skipped, s.errors
            )?;
        }
        Ok(())
    }
}

/// Process-wide counters. Owned by the orchestrator, mutated only at cycle
/// boundaries, read everywhere else through a cloned snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStatistics {
    pub total_found: u64,
    pub total_processed: u64,
    pub total_saved: u64,
    pub total_errors: u64,
    pub cycles_completed: u64,
    pub last_run: Option<DateTime<Utc>>,
}

impl RunStatistics {
    pub fn record_cycle(&mut self, report: &CycleReport) {
        self.total_found += report.found as u64;
        self.total_processed += report.processed as u64;
        self.total_saved += report.saved as u64;
        self.total_errors += report.errors as u64;
        self.cycles_completed += 1;
        self.last_run = Some(report.finished_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_known_labels() {
        assert_eq!(Category::parse("politics"), Category::Politics);
        assert_eq!(Category::parse("Economy"), Category::Economy);
        assert_eq!(Category::parse("regional-affairs"), Category::RegionalAffairs);
        assert_eq!(Category::parse("Regional Affairs"), Category::RegionalAffairs);
        assert_eq!(Category::parse("  technology  "), Category::Technology);
    }

    #[test]
    fn category_parse_unknown_maps_to_general() {
        assert_eq!(Category::parse("cryptocurrency"), Category::General);
        assert_eq!(Category::parse(""), Category::General);
        assert_eq!(Category::parse("unknown stuff"), Category::General);
    }

    #[test]
    fn cycle_report_absorbs_source_counts() {
        let mut report = CycleReport::new(Utc::now());
        report.absorb(SourceReport {
            source: "a".into(),
            found: 3,
            processed: 2,
            saved: 2,
            skipped: 0,
            errors: 1,
            duration_ms: 10,
        });
        report.absorb(SourceReport {
            source: "b".into(),
            found: 1,
            processed: 1,
            saved: 0,
            skipped: 1,
            errors: 0,
            duration_ms: 5,
        });
        assert_eq!(report.sources_processed, 2);
        assert_eq!(report.found, 4);
        assert_eq!(report.processed, 3);
        assert_eq!(report.saved, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors, 1);
    }

    #[test]
    fn run_statistics_accumulate_across_cycles() {
        let mut stats = RunStatistics::default();
        let mut report = CycleReport::new(Utc::now());
        report.absorb(SourceReport {
            source: "a".into(),
            found: 5,
            processed: 4,
            saved: 3,
            skipped: 1,
            errors: 1,
            duration_ms: 10,
        });
        report.finished_at = Utc::now();
        stats.record_cycle(&report);
        stats.record_cycle(&report);
        assert_eq!(stats.total_found, 10);
        assert_eq!(stats.total_saved, 6);
        assert_eq!(stats.cycles_completed, 2);
        assert!(stats.last_run.is_some());
    }
}
