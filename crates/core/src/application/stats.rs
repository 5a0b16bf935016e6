// Throughput statistics
// Lock-free counters fed by the observer hook, reported on an interval

use crate::application::worker::ShutdownToken;
use crate::domain::{EndpointId, OperationOutcome, Role};
use crate::port::{IterationReport, OperationObserver};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

/// Counters shared by every worker
#[derive(Debug, Default)]
pub struct ThroughputStats {
    published: AtomicU64,
    bytes_published: AtomicU64,
    received: AtomicU64,
    empty_polls: AtomicU64,
    iterations: AtomicU64,
    overruns: AtomicU64,
}

/// Point-in-time copy of [`ThroughputStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub published: u64,
    pub bytes_published: u64,
    pub received: u64,
    pub empty_polls: u64,
    pub iterations: u64,
    /// Iterations that took a second or more and skipped the cadence sleep
    pub overruns: u64,
}

impl StatsSnapshot {
    /// Counts accumulated since `earlier`
    pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            published: self.published.saturating_sub(earlier.published),
            bytes_published: self.bytes_published.saturating_sub(earlier.bytes_published),
            received: self.received.saturating_sub(earlier.received),
            empty_polls: self.empty_polls.saturating_sub(earlier.empty_polls),
            iterations: self.iterations.saturating_sub(earlier.iterations),
            overruns: self.overruns.saturating_sub(earlier.overruns),
        }
    }
}

impl ThroughputStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            bytes_published: self.bytes_published.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            iterations: self.iterations.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
        }
    }
}

impl OperationObserver for ThroughputStats {
    fn on_operation(&self, _role: Role, _endpoint: &EndpointId, outcome: &OperationOutcome) {
        match outcome {
            OperationOutcome::Published { bytes } => {
                self.published.fetch_add(1, Ordering::Relaxed);
                self.bytes_published.fetch_add(*bytes as u64, Ordering::Relaxed);
            }
            OperationOutcome::MessageReceived { .. } => {
                self.received.fetch_add(1, Ordering::Relaxed);
            }
            OperationOutcome::QueueEmpty => {
                self.empty_polls.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn on_iteration(&self, report: &IterationReport) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
        if report.pause.is_none() {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Periodically logs throughput deltas
pub struct StatsReporter {
    stats: Arc<ThroughputStats>,
    every: Duration,
}

impl StatsReporter {
    pub fn new(stats: Arc<ThroughputStats>, every: Duration) -> Self {
        Self { stats, every }
    }

    /// Run reporting loop until shutdown (background task)
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(interval_secs = self.every.as_secs(), "Stats reporter started");

        let mut tick = interval(self.every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        tick.tick().await;

        let mut last = self.stats.snapshot();
        let secs = self.every.as_secs_f64().max(f64::EPSILON);

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown.wait() => break,
            }

            let now = self.stats.snapshot();
            let delta = now.since(&last);
            info!(
                published = delta.published,
                received = delta.received,
                empty_polls = delta.empty_polls,
                overruns = delta.overruns,
                publish_rate = delta.published as f64 / secs,
                receive_rate = delta.received as f64 / secs,
                mb_per_sec = delta.bytes_published as f64 / 1024.0 / 1024.0 / secs,
                "Throughput"
            );
            last = now;
        }

        let total = self.stats.snapshot();
        info!(
            published = total.published,
            received = total.received,
            empty_polls = total.empty_polls,
            iterations = total.iterations,
            overruns = total.overruns,
            "Final totals"
        );
    }
}
