use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use newswire_common::Config;
use newswire_pipeline::{
    sources, CycleRunner, EnrichmentEngine, HttpFetcher, PerformanceMonitor, Scheduler, Settings,
};
use newswire_store::{ArticleStore, PgStore};

#[derive(Parser)]
#[command(name = "newswire", about = "News ingestion and enrichment pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the periodic scraping daemon until interrupted
    Daemon,
    /// Run a single scraping cycle and print the report
    RunCycle,
    /// List configured sources
    ListSources,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("newswire=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let store = Arc::new(PgStore::connect(&config.database_url).await?);
    store.migrate().await?;

    let store: Arc<dyn ArticleStore> = store;
    sources::sync_sources(store.clone()).await?;

    let monitor = Arc::new(PerformanceMonitor::new());
    let runner = CycleRunner::new(
        store.clone(),
        Arc::new(HttpFetcher::new()),
        EnrichmentEngine::from_config(&config),
        monitor.clone(),
    );
    let scheduler = Scheduler::new(runner, store.clone(), monitor, Settings::from_config(&config));

    match cli.command {
        Command::Daemon => {
            scheduler.start().await;
            info!("Daemon running, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            scheduler.stop().await;
        }
        Command::RunCycle => {
            let report = scheduler.run_cycle_now().await;
            println!("{report}");
        }
        Command::ListSources => {
            for source in store.list_sources().await? {
                let last = source
                    .last_scraped_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{} [{}] {} (last scraped: {last})",
                    source.name,
                    if source.active { "active" } else { "inactive" },
                    source.feed_url,
                );
            }
        }
    }

    Ok(())
}
