// Worker - per-second rate loop over a fixed slice of endpoints

pub mod constants;
mod shutdown;

use constants::CADENCE;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::endpoint::Endpoint;
use crate::domain::{Role, WorkerAssignment};
use crate::error::Result;
use crate::port::{BrokerError, IterationReport, OperationObserver, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Totals of one worker over its lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSummary {
    pub worker_id: usize,
    pub role: Role,
    pub iterations: u64,
    pub operations: u64,
}

/// How long to sleep after an iteration that took `elapsed_millis`
///
/// Elapsed time is measured in whole seconds: under one second the loop pads
/// to the cadence, at one second or more it starts the next iteration at once.
pub fn cadence_pause(elapsed_millis: i64) -> Option<Duration> {
    let elapsed = Duration::from_millis(u64::try_from(elapsed_millis).unwrap_or(0));
    if elapsed.as_secs() < CADENCE.as_secs() {
        Some(CADENCE - elapsed)
    } else {
        None
    }
}

/// Drives one worker assignment for one role until shutdown
pub struct RateLoop {
    assignment: WorkerAssignment,
    role: Role,
    rate: u32,
    endpoints: Vec<Endpoint>,
    observer: Arc<dyn OperationObserver>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RateLoop {
    /// `endpoints` are the endpoints covered by `assignment`, in index order
    pub fn new(
        assignment: WorkerAssignment,
        role: Role,
        rate: u32,
        endpoints: Vec<Endpoint>,
        observer: Arc<dyn OperationObserver>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        debug_assert_eq!(assignment.len(), endpoints.len());
        Self {
            assignment,
            role,
            rate,
            endpoints,
            observer,
            time_provider,
        }
    }

    pub fn worker_id(&self) -> usize {
        self.assignment.worker_id
    }

    /// Operations issued per iteration (`rate * endpoints`)
    pub fn operations_per_iteration(&self) -> u64 {
        u64::from(self.rate) * self.endpoints.len() as u64
    }

    /// Run one iteration: `rate` rounds over every endpoint
    ///
    /// Stops at the first broker failure; nothing is retried.
    pub async fn run_iteration(&self) -> std::result::Result<IterationReport, BrokerError> {
        let started_at_millis = self.time_provider.now_millis();
        let mut operations = 0u64;

        for _ in 0..self.rate {
            for endpoint in &self.endpoints {
                let outcome = endpoint.perform().await?;
                self.observer.on_operation(self.role, endpoint.id(), &outcome);
                operations += 1;
            }
        }

        let finished_at_millis = self.time_provider.now_millis();
        Ok(IterationReport {
            worker_id: self.assignment.worker_id,
            role: self.role,
            endpoints: self.endpoints.len(),
            operations,
            started_at_millis,
            finished_at_millis,
            pause: cadence_pause(finished_at_millis - started_at_millis),
        })
    }

    /// Run until shutdown or the first broker failure
    ///
    /// Endpoints are closed on every exit path.
    pub async fn run(mut self, mut shutdown: ShutdownToken) -> Result<LoopSummary> {
        let mut summary = LoopSummary {
            worker_id: self.assignment.worker_id,
            role: self.role,
            iterations: 0,
            operations: 0,
        };

        info!(
            worker_id = summary.worker_id,
            role = %self.role,
            rate = self.rate,
            "Launching thread {} with {} {}",
            summary.worker_id,
            self.role.endpoint_label().to_lowercase(),
            self.assignment
        );

        loop {
            if shutdown.is_shutdown() {
                break;
            }

            let report = match self.run_iteration().await {
                Ok(report) => report,
                Err(e) => {
                    error!(
                        worker_id = summary.worker_id,
                        role = %self.role,
                        error = %e,
                        "Worker terminated by broker failure"
                    );
                    self.close_endpoints().await;
                    return Err(e.into());
                }
            };

            summary.iterations += 1;
            summary.operations += report.operations;
            self.observer.on_iteration(&report);

            if let Some(pause) = report.pause {
                if shutdown.is_shutdown() || !shutdown.sleep_or_shutdown(pause).await {
                    break;
                }
            }
        }

        self.close_endpoints().await;
        info!(
            worker_id = summary.worker_id,
            role = %self.role,
            iterations = summary.iterations,
            operations = summary.operations,
            "Worker stopped"
        );
        Ok(summary)
    }

    async fn close_endpoints(&mut self) {
        for endpoint in self.endpoints.drain(..) {
            let id = endpoint.id().clone();
            if let Err(e) = endpoint.close().await {
                warn!(endpoint = %id, error = %e, "Failed to close endpoint");
            }
        }
    }
}
