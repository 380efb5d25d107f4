pub mod cycle;
pub mod enrich;
pub mod extract;
pub mod feed;
pub mod fetch;
pub mod gateway;
pub mod perf;
pub mod scheduler;
pub mod sources;

#[cfg(test)]
pub(crate) mod testing;

pub use cycle::CycleRunner;
pub use enrich::EnrichmentEngine;
pub use extract::{ContentExtractor, ExtractOutcome};
pub use feed::FeedFetcher;
pub use fetch::{HttpFetcher, PageFetcher};
pub use gateway::{fingerprint, ArticleGateway, SaveOutcome};
pub use perf::{PerformanceMonitor, PerformanceSnapshot, PerformanceStatus};
pub use scheduler::{Scheduler, Settings, SettingsPatch, Status};
