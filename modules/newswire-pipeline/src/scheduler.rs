use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use newswire_common::{CycleReport, RunStatistics, SourceReport};
use newswire_store::ArticleStore;

use crate::cycle::CycleRunner;
use crate::perf::{PerformanceMonitor, PerformanceSnapshot};

/// How often the background loop checks the stop signal while waiting for
/// the next cycle.
const STOP_POLL_TICK: Duration = Duration::from_secs(1);
/// Bound on how long `stop()` waits for the background task. An in-flight
/// cycle is never interrupted; past this bound the task is left to finish
/// detached.
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime-mutable pipeline settings. Changes take effect on the next cycle.
#[derive(Debug, Clone)]
pub struct Settings {
    pub interval: Duration,
    pub auto_publish: bool,
    pub ai_enabled: bool,
    pub max_articles_per_source: usize,
    pub article_delay: Duration,
    pub source_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            auto_publish: true,
            ai_enabled: true,
            max_articles_per_source: 10,
            article_delay: Duration::from_secs(1),
            source_delay: Duration::from_secs(10),
        }
    }
}

impl Settings {
    pub fn from_config(config: &newswire_common::Config) -> Self {
        Self {
            interval: Duration::from_secs(config.scrape_interval_minutes.max(1) * 60),
            auto_publish: config.auto_publish,
            ai_enabled: config.ai_enabled,
            max_articles_per_source: config.max_articles_per_source.max(1),
            ..Self::default()
        }
    }
}

/// Partial settings update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub interval_minutes: Option<u64>,
    pub auto_publish: Option<bool>,
    pub ai_enabled: Option<bool>,
    pub max_articles_per_source: Option<usize>,
}

/// Read-only status view for serving/administration layers.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub is_running: bool,
    pub interval_minutes: u64,
    pub auto_publish: bool,
    pub ai_enabled: bool,
    pub max_articles_per_source: usize,
    pub stats: RunStatistics,
    pub sources_count: usize,
}

/// Runs the orchestrator on a fixed interval in a background task, with
/// manual triggering and runtime-mutable settings.
///
/// The manual trigger and the background loop share one cycle lock, so two
/// cycles never interleave.
pub struct Scheduler {
    runner: Arc<CycleRunner>,
    store: Arc<dyn ArticleStore>,
    monitor: Arc<PerformanceMonitor>,
    settings: Arc<RwLock<Settings>>,
    stats: Arc<RwLock<RunStatistics>>,
    cycle_lock: Arc<Mutex<()>>,
    state: Mutex<TaskState>,
}

#[derive(Default)]
struct TaskState {
    running: bool,
    stop_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(
        runner: CycleRunner,
        store: Arc<dyn ArticleStore>,
        monitor: Arc<PerformanceMonitor>,
        settings: Settings,
    ) -> Self {
        Self {
            runner: Arc::new(runner),
            store,
            monitor,
            settings: Arc::new(RwLock::new(settings)),
            stats: Arc::new(RwLock::new(RunStatistics::default())),
            cycle_lock: Arc::new(Mutex::new(())),
            state: Mutex::new(TaskState::default()),
        }
    }

    /// Start the background loop: one cycle immediately, then one per
    /// interval. Idempotent: a warning and no-op when already running.
    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        if state.running {
            warn!("Scheduler is already running");
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let runner = self.runner.clone();
        let settings = self.settings.clone();
        let stats = self.stats.clone();
        let cycle_lock = self.cycle_lock.clone();
        let monitor = self.monitor.clone();

        let handle = tokio::spawn(async move {
            run_loop(runner, settings, stats, cycle_lock, monitor, stop_rx).await;
        });

        state.running = true;
        state.stop_tx = Some(stop_tx);
        state.handle = Some(handle);
        info!("Scheduler started");
    }

    /// Signal the background loop to stop and wait for it with a bounded
    /// timeout. Cooperative: an in-flight cycle finishes on its own.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if !state.running {
            warn!("Scheduler is not running");
            return;
        }

        if let Some(stop_tx) = state.stop_tx.take() {
            let _ = stop_tx.send(true);
        }

        if let Some(handle) = state.handle.take() {
            match tokio::time::timeout(STOP_TIMEOUT, handle).await {
                Ok(Ok(())) => info!("Scheduler stopped"),
                Ok(Err(e)) => warn!(error = %e, "Scheduler task failed"),
                Err(_) => warn!(
                    timeout_secs = STOP_TIMEOUT.as_secs(),
                    "Scheduler task still finishing its cycle, left to complete"
                ),
            }
        }

        state.running = false;
    }

    /// Manual one-shot trigger, serialized against the background loop.
    pub async fn run_cycle_now(&self) -> CycleReport {
        execute_cycle(
            &self.runner,
            &self.settings,
            &self.stats,
            &self.cycle_lock,
            &self.monitor,
        )
        .await
    }

    /// Manual single-source trigger. Does not update the process-wide run
    /// statistics, which are owned by full cycles.
    pub async fn run_source_now(&self, name: &str) -> Option<SourceReport> {
        let sources = match self.store.list_sources().await {
            Ok(sources) => sources,
            Err(e) => {
                warn!(error = %e, "Failed to list sources");
                return None;
            }
        };
        let source = sources.into_iter().find(|s| s.name == name)?;
        let settings = self.settings.read().await.clone();

        let _guard = self.cycle_lock.lock().await;
        Some(self.runner.run_source(&source, &settings).await)
    }

    pub async fn get_status(&self) -> Status {
        let settings = self.settings.read().await.clone();
        let stats = self.stats.read().await.clone();
        let sources_count = match self.store.list_sources().await {
            Ok(sources) => sources.len(),
            Err(e) => {
                warn!(error = %e, "Failed to count sources");
                0
            }
        };
        Status {
            is_running: self.state.lock().await.running,
            interval_minutes: settings.interval.as_secs() / 60,
            auto_publish: settings.auto_publish,
            ai_enabled: settings.ai_enabled,
            max_articles_per_source: settings.max_articles_per_source,
            stats,
            sources_count,
        }
    }

    /// Apply a partial settings update, clamped to sane minimums. Takes
    /// effect on the next cycle.
    pub async fn update_settings(&self, patch: SettingsPatch) {
        let mut settings = self.settings.write().await;
        if let Some(minutes) = patch.interval_minutes {
            settings.interval = Duration::from_secs(minutes.max(1) * 60);
        }
        if let Some(auto_publish) = patch.auto_publish {
            settings.auto_publish = auto_publish;
        }
        if let Some(ai_enabled) = patch.ai_enabled {
            settings.ai_enabled = ai_enabled;
        }
        if let Some(max) = patch.max_articles_per_source {
            settings.max_articles_per_source = max.max(1);
        }
        info!("Scheduler settings updated");
    }

    pub fn get_performance_snapshot(&self) -> PerformanceSnapshot {
        self.monitor.snapshot()
    }
}

/// Background loop: immediate first cycle, then interval waits in short
/// ticks so stop requests stay responsive.
async fn run_loop(
    runner: Arc<CycleRunner>,
    settings: Arc<RwLock<Settings>>,
    stats: Arc<RwLock<RunStatistics>>,
    cycle_lock: Arc<Mutex<()>>,
    monitor: Arc<PerformanceMonitor>,
    stop_rx: watch::Receiver<bool>,
) {
    execute_cycle(&runner, &settings, &stats, &cycle_lock, &monitor).await;

    loop {
        let interval = settings.read().await.interval;
        let mut waited = Duration::ZERO;
        while waited < interval {
            if *stop_rx.borrow() {
                info!("Scheduler loop exiting");
                return;
            }
            tokio::time::sleep(STOP_POLL_TICK).await;
            waited += STOP_POLL_TICK;
        }
        if *stop_rx.borrow() {
            info!("Scheduler loop exiting");
            return;
        }

        execute_cycle(&runner, &settings, &stats, &cycle_lock, &monitor).await;
    }
}

async fn execute_cycle(
    runner: &CycleRunner,
    settings: &RwLock<Settings>,
    stats: &RwLock<RunStatistics>,
    cycle_lock: &Mutex<()>,
    monitor: &PerformanceMonitor,
) -> CycleReport {
    let settings_snapshot = settings.read().await.clone();

    let _guard = cycle_lock.lock().await;
    let report = monitor
        .time("scrape_cycle", runner.run_cycle(&settings_snapshot))
        .await;

    // Statistics mutate once, at the cycle boundary
    stats.write().await.record_cycle(&report);
    report
}
