// Operation Observer Port
// Diagnostic hook for every publish/poll outcome and every loop iteration

use crate::domain::{EndpointId, OperationOutcome, Role};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Summary of one rate loop iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationReport {
    pub worker_id: usize,
    pub role: Role,
    pub endpoints: usize,
    pub operations: u64,
    pub started_at_millis: i64,
    pub finished_at_millis: i64,
    /// How long the loop will sleep before the next iteration; `None` on overrun
    pub pause: Option<Duration>,
}

impl IterationReport {
    pub fn elapsed_millis(&self) -> i64 {
        self.finished_at_millis - self.started_at_millis
    }

    /// Whole seconds the iteration took
    pub fn elapsed_secs(&self) -> i64 {
        self.elapsed_millis().max(0) / 1000
    }
}

/// Receives operation and iteration events from rate loops
///
/// Called from every worker concurrently. Correctness never depends on an
/// observer, so implementations must not block.
pub trait OperationObserver: Send + Sync {
    fn on_operation(&self, role: Role, endpoint: &EndpointId, outcome: &OperationOutcome);

    fn on_iteration(&self, _report: &IterationReport) {}
}

/// Discards every event
pub struct NoopObserver;

impl OperationObserver for NoopObserver {
    fn on_operation(&self, _role: Role, _endpoint: &EndpointId, _outcome: &OperationOutcome) {}
}

/// Emits every event as a debug-level tracing event
pub struct TracingObserver;

impl OperationObserver for TracingObserver {
    fn on_operation(&self, role: Role, endpoint: &EndpointId, outcome: &OperationOutcome) {
        match outcome {
            OperationOutcome::Published { bytes } => {
                debug!(endpoint = %endpoint, role = %role, bytes = bytes, "Sending message ...");
            }
            OperationOutcome::MessageReceived { bytes } => {
                debug!(endpoint = %endpoint, role = %role, bytes = bytes, "Received message!");
            }
            OperationOutcome::QueueEmpty => {
                debug!(endpoint = %endpoint, role = %role, "No messages!");
            }
        }
    }

    fn on_iteration(&self, report: &IterationReport) {
        debug!(
            worker_id = report.worker_id,
            role = %report.role,
            operations = report.operations,
            endpoints = report.endpoints,
            elapsed_ms = report.elapsed_millis(),
            overrun = report.pause.is_none(),
            "{}[{}] Finished @ {} in {} sec",
            report.role.worker_tag(),
            report.worker_id,
            report.finished_at_millis / 1000,
            report.elapsed_secs()
        );
    }
}

/// Fans every event out to several observers
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn OperationObserver>>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn OperationObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl OperationObserver for CompositeObserver {
    fn on_operation(&self, role: Role, endpoint: &EndpointId, outcome: &OperationOutcome) {
        for observer in &self.observers {
            observer.on_operation(role, endpoint, outcome);
        }
    }

    fn on_iteration(&self, report: &IterationReport) {
        for observer in &self.observers {
            observer.on_iteration(report);
        }
    }
}
