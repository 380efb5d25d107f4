//! Performance monitor: observes timed boundaries, never participates in
//! control flow.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::warn;

/// Rolling window length for cycle/source/article operations.
const ROLLING_WINDOW: usize = 100;
/// Wall-clock budget a cycle-level operation is judged against.
const TIME_BUDGET: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceStatus {
    NoData,
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl std::fmt::Display for PerformanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PerformanceStatus::NoData => "no_data",
            PerformanceStatus::Excellent => "excellent",
            PerformanceStatus::Good => "good",
            PerformanceStatus::Acceptable => "acceptable",
            PerformanceStatus::Poor => "poor",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OperationMetrics {
    pub total_calls: u64,
    pub total_seconds: f64,
    pub avg_seconds: f64,
    pub min_seconds: f64,
    pub max_seconds: f64,
    pub success_count: u64,
    pub failure_count: u64,
}

/// Read-only view for external reporting.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSnapshot {
    pub operations: HashMap<String, OperationMetrics>,
    pub rolling_avg_seconds: f64,
    pub budget_seconds: f64,
    pub status: PerformanceStatus,
}

pub struct PerformanceMonitor {
    inner: Mutex<MonitorInner>,
}

#[derive(Default)]
struct MonitorInner {
    operations: HashMap<String, OperationMetrics>,
    window: VecDeque<f64>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MonitorInner::default()),
        }
    }

    /// Time an infallible operation.
    pub async fn time<F, T>(&self, name: &str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let start = Instant::now();
        let out = fut.await;
        self.record(name, start.elapsed(), true);
        out
    }

    /// Record one invocation. Warns (never fails the operation) when a
    /// single invocation exceeds the budget.
    pub fn record(&self, name: &str, duration: Duration, success: bool) {
        let seconds = duration.as_secs_f64();

        if duration > TIME_BUDGET {
            warn!(
                operation = name,
                seconds,
                budget_seconds = TIME_BUDGET.as_secs_f64(),
                "Operation exceeded time budget"
            );
        }

        let mut inner = self.inner.lock().expect("monitor lock poisoned");

        let metric = inner.operations.entry(name.to_string()).or_default();
        if metric.total_calls == 0 {
            metric.min_seconds = seconds;
            metric.max_seconds = seconds;
        } else {
            metric.min_seconds = metric.min_seconds.min(seconds);
            metric.max_seconds = metric.max_seconds.max(seconds);
        }
        metric.total_calls += 1;
        metric.total_seconds += seconds;
        metric.avg_seconds = metric.total_seconds / metric.total_calls as f64;
        if success {
            metric.success_count += 1;
        } else {
            metric.failure_count += 1;
        }

        if is_tracked(name) {
            inner.window.push_back(seconds);
            while inner.window.len() > ROLLING_WINDOW {
                inner.window.pop_front();
            }
        }
    }

    /// Classify the rolling average against the budget.
    pub fn status(&self) -> PerformanceStatus {
        let inner = self.inner.lock().expect("monitor lock poisoned");
        classify(rolling_avg(&inner.window))
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        let inner = self.inner.lock().expect("monitor lock poisoned");
        let avg = rolling_avg(&inner.window);
        PerformanceSnapshot {
            operations: inner.operations.clone(),
            rolling_avg_seconds: avg,
            budget_seconds: TIME_BUDGET.as_secs_f64(),
            status: classify(avg),
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("monitor lock poisoned");
        inner.operations.clear();
        inner.window.clear();
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Only cycle-level work feeds the rolling window.
fn is_tracked(name: &str) -> bool {
    name.contains("cycle") || name.contains("source") || name.contains("article")
}

fn rolling_avg(window: &VecDeque<f64>) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    window.iter().sum::<f64>() / window.len() as f64
}

fn classify(avg_seconds: f64) -> PerformanceStatus {
    if avg_seconds == 0.0 {
        PerformanceStatus::NoData
    } else if avg_seconds < 30.0 {
        PerformanceStatus::Excellent
    } else if avg_seconds < 45.0 {
        PerformanceStatus::Good
    } else if avg_seconds < 60.0 {
        PerformanceStatus::Acceptable
    } else {
        PerformanceStatus::Poor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_monitor_reports_no_data() {
        let monitor = PerformanceMonitor::new();
        assert_eq!(monitor.status(), PerformanceStatus::NoData);
    }

    #[test]
    fn rolling_average_of_70s_is_poor() {
        let monitor = PerformanceMonitor::new();
        for _ in 0..5 {
            monitor.record("scrape_cycle", Duration::from_secs(70), true);
        }
        assert_eq!(monitor.status(), PerformanceStatus::Poor);
    }

    #[test]
    fn rolling_average_of_20s_is_excellent() {
        let monitor = PerformanceMonitor::new();
        for _ in 0..5 {
            monitor.record("scrape_cycle", Duration::from_secs(20), true);
        }
        assert_eq!(monitor.status(), PerformanceStatus::Excellent);
    }

    #[test]
    fn classification_boundaries() {
        assert_eq!(classify(0.0), PerformanceStatus::NoData);
        assert_eq!(classify(29.9), PerformanceStatus::Excellent);
        assert_eq!(classify(30.0), PerformanceStatus::Good);
        assert_eq!(classify(44.9), PerformanceStatus::Good);
        assert_eq!(classify(45.0), PerformanceStatus::Acceptable);
        assert_eq!(classify(59.9), PerformanceStatus::Acceptable);
        assert_eq!(classify(60.0), PerformanceStatus::Poor);
    }

    #[test]
    fn window_is_bounded_to_last_100() {
        let monitor = PerformanceMonitor::new();
        // 150 slow entries, then 100 fast ones: only the fast ones remain
        for _ in 0..150 {
            monitor.record("scrape_cycle", Duration::from_secs(90), true);
        }
        for _ in 0..100 {
            monitor.record("scrape_cycle", Duration::from_secs(10), true);
        }
        assert_eq!(monitor.status(), PerformanceStatus::Excellent);
        let snapshot = monitor.snapshot();
        assert!((snapshot.rolling_avg_seconds - 10.0).abs() < 1e-9);
    }

    #[test]
    fn per_operation_metrics_accumulate() {
        let monitor = PerformanceMonitor::new();
        monitor.record("enrich_article", Duration::from_secs(2), true);
        monitor.record("enrich_article", Duration::from_secs(4), false);

        let snapshot = monitor.snapshot();
        let metric = &snapshot.operations["enrich_article"];
        assert_eq!(metric.total_calls, 2);
        assert_eq!(metric.success_count, 1);
        assert_eq!(metric.failure_count, 1);
        assert!((metric.avg_seconds - 3.0).abs() < 1e-9);
        assert!((metric.min_seconds - 2.0).abs() < 1e-9);
        assert!((metric.max_seconds - 4.0).abs() < 1e-9);
    }

    #[test]
    fn untracked_operations_stay_out_of_the_window() {
        let monitor = PerformanceMonitor::new();
        monitor.record("store_connect", Duration::from_secs(90), true);
        assert_eq!(monitor.status(), PerformanceStatus::NoData);
        assert!(monitor.snapshot().operations.contains_key("store_connect"));
    }

    #[test]
    fn reset_clears_everything() {
        let monitor = PerformanceMonitor::new();
        monitor.record("scrape_cycle", Duration::from_secs(70), true);
        monitor.reset();
        assert_eq!(monitor.status(), PerformanceStatus::NoData);
        assert!(monitor.snapshot().operations.is_empty());
    }

    #[tokio::test]
    async fn time_wraps_and_returns_the_value() {
        let monitor = PerformanceMonitor::new();
        let value = monitor.time("enrich_article", async { 41 + 1 }).await;
        assert_eq!(value, 42);
        assert_eq!(monitor.snapshot().operations["enrich_article"].total_calls, 1);
    }
}
