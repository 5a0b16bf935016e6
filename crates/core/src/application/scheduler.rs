//! Scheduler - builds every endpoint of this instance and runs the workers
//!
//! Startup order:
//! - consumer endpoints are opened and their workers launched
//! - publisher endpoints are opened and their workers launched
//!
//! Each role's endpoints are split across that role's workers by the
//! partitioner. The first worker failure stops all others; the error is
//! returned so the process exits non-zero and the platform restarts it.

use crate::application::endpoint::{Endpoint, EndpointSpec};
use crate::application::partitioner;
use crate::application::worker::{LoopSummary, RateLoop, ShutdownSender};
use crate::config::LoadConfig;
use crate::domain::{EndpointId, Payload, QueueShard, Role};
use crate::error::{AppError, Result};
use crate::port::{BrokerConnector, OperationObserver, TimeProvider};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

type WorkerSet = JoinSet<Result<LoopSummary>>;

/// Owns the workload of one deployed instance
pub struct Scheduler {
    config: LoadConfig,
    shard: QueueShard,
    connector: Arc<dyn BrokerConnector>,
    observer: Arc<dyn OperationObserver>,
    time_provider: Arc<dyn TimeProvider>,
    rng: StdRng,
}

impl Scheduler {
    /// Validate `config` and prepare the scheduler
    ///
    /// # Errors
    /// - AppError::Config if the configuration cannot run; nothing is connected
    pub fn new(
        config: LoadConfig,
        connector: Arc<dyn BrokerConnector>,
        observer: Arc<dyn OperationObserver>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let shard = config.shard()?;
        Ok(Self {
            config,
            shard,
            connector,
            observer,
            time_provider,
            rng: StdRng::from_entropy(),
        })
    }

    /// Make broker selection and payloads reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn shard(&self) -> QueueShard {
        self.shard
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Open all endpoints, launch all workers and wait for them
    ///
    /// Returns once every worker has stopped, either because `shutdown` was
    /// signalled or because one of them failed.
    pub async fn run(mut self, shutdown: &ShutdownSender) -> Result<Vec<LoopSummary>> {
        self.log_startup();

        let mut workers = WorkerSet::new();
        for role in [Role::Consume, Role::Publish] {
            if !self.config.role(role).enabled {
                info!(role = %role, "Role disabled, no endpoints created");
                continue;
            }
            if shutdown.is_shutdown() {
                break;
            }

            match self.build_endpoints(role, shutdown).await {
                Ok(endpoints) if shutdown.is_shutdown() => {
                    close_all(endpoints).await;
                    break;
                }
                Ok(endpoints) => self.launch(role, endpoints, shutdown, &mut workers),
                Err(e) => {
                    error!(role = %role, error = %e, "Endpoint setup failed");
                    shutdown.shutdown();
                    let _ = join_workers(workers, shutdown).await;
                    return Err(e);
                }
            }
        }

        info!(workers = workers.len(), "Scheduled {} threads", workers.len());
        join_workers(workers, shutdown).await
    }

    /// Open `endpoints_per_queue` endpoints for every queue in the shard
    ///
    /// Endpoints are ordered by queue offset, then replica. On failure the
    /// endpoints already opened are closed before the error is returned.
    /// A shutdown signalled mid-build closes them too and yields no endpoints.
    pub async fn build_endpoints(&mut self, role: Role, shutdown: &ShutdownSender) -> Result<Vec<Endpoint>> {
        let per_queue = self.config.role(role).endpoints_per_queue;
        let mut endpoints = Vec::new();

        for offset in 0..self.shard.len() {
            let queue = self.shard.queue_name(&self.config.queue_prefix, offset);
            for replica in 0..per_queue {
                if shutdown.is_shutdown() {
                    info!(role = %role, opened = endpoints.len(), "Shutdown during endpoint setup, closing opened endpoints");
                    close_all(endpoints).await;
                    return Ok(Vec::new());
                }
                let spec = match self.endpoint_spec(role, offset, replica, &queue) {
                    Ok(spec) => spec,
                    Err(e) => {
                        close_all(endpoints).await;
                        return Err(e);
                    }
                };
                info!(endpoint = %spec.id, url = %crate::config::redact_url(&spec.url), "Connecting {} ...", spec.id);

                match Endpoint::open(self.connector.as_ref(), spec).await {
                    Ok(endpoint) => endpoints.push(endpoint),
                    Err(e) => {
                        close_all(endpoints).await;
                        return Err(e.into());
                    }
                }
            }
        }

        Ok(endpoints)
    }

    fn endpoint_spec(&mut self, role: Role, offset: u64, replica: usize, queue: &str) -> Result<EndpointSpec> {
        let url = self
            .config
            .broker_urls
            .choose(&mut self.rng)
            .cloned()
            .ok_or_else(|| AppError::Config("no broker URLs configured".to_string()))?;
        let payload = match role {
            Role::Publish => Payload::generate(
                &mut self.rng,
                self.config.payload_size.min_bytes,
                self.config.payload_size.max_bytes,
            )?,
            Role::Consume => Payload::default(),
        };
        Ok(EndpointSpec {
            id: EndpointId::new(role, offset, replica),
            role,
            url,
            queue: queue.to_string(),
            payload,
        })
    }

    /// Partition `endpoints` and spawn one rate loop per non-empty assignment
    fn launch(&self, role: Role, endpoints: Vec<Endpoint>, shutdown: &ShutdownSender, workers: &mut WorkerSet) {
        let role_config = self.config.role(role);
        let assignments = partitioner::assign(endpoints.len(), role_config.workers);
        let mut remaining = endpoints.into_iter();

        for assignment in assignments {
            if assignment.is_empty() {
                info!(
                    worker_id = assignment.worker_id,
                    role = %role,
                    "No endpoints left for worker, skipping"
                );
                continue;
            }
            let slice: Vec<Endpoint> = remaining.by_ref().take(assignment.len()).collect();
            let rate_loop = RateLoop::new(
                assignment,
                role,
                role_config.rate_per_second,
                slice,
                Arc::clone(&self.observer),
                Arc::clone(&self.time_provider),
            );
            workers.spawn(rate_loop.run(shutdown.subscribe()));
        }
    }

    fn log_startup(&self) {
        let queues = self.shard.len();
        info!(
            "Setting up {} queues with {} publishers and {} consumers",
            queues,
            self.role_endpoint_count(Role::Publish),
            self.role_endpoint_count(Role::Consume)
        );
        info!(
            publisher_threads = self.config.publish.workers,
            consumer_threads = self.config.consume.workers,
            publish_rate = self.config.publish.rate_per_second,
            basic_get_rate = self.config.consume.rate_per_second,
            amqp_urls = ?self.config.redacted_urls(),
            shard = %self.shard,
            "Running from queue {} to {}",
            self.shard.start,
            self.shard.end
        );
    }

    fn role_endpoint_count(&self, role: Role) -> u64 {
        let role_config = self.config.role(role);
        if role_config.enabled {
            self.shard.len().saturating_mul(role_config.endpoints_per_queue as u64)
        } else {
            0
        }
    }
}

/// Wait for every worker; the first failure signals shutdown to the rest
async fn join_workers(mut workers: WorkerSet, shutdown: &ShutdownSender) -> Result<Vec<LoopSummary>> {
    let mut summaries = Vec::with_capacity(workers.len());
    let mut first_error: Option<AppError> = None;

    while let Some(joined) = workers.join_next().await {
        let outcome = match joined {
            Ok(result) => result,
            Err(join_error) => Err(AppError::Internal(format!("worker task failed: {}", join_error))),
        };
        match outcome {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                if first_error.is_none() {
                    warn!(error = %e, "Worker failed, stopping remaining workers");
                    shutdown.shutdown();
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            summaries.sort_by_key(|s| (s.role != Role::Consume, s.worker_id));
            Ok(summaries)
        }
    }
}

async fn close_all(endpoints: Vec<Endpoint>) {
    for endpoint in endpoints {
        let id = endpoint.id().clone();
        if let Err(e) = endpoint.close().await {
            warn!(endpoint = %id, error = %e, "Failed to close endpoint");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::worker::shutdown_channel;
    use crate::port::broker::mocks::InMemoryBroker;
    use crate::port::time_provider::mocks::TokioTimeProvider;
    use crate::port::{BrokerConnection, BrokerError, NoopObserver};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn config(publish_workers: usize, consume_workers: usize) -> LoadConfig {
        let mut config = LoadConfig {
            broker_urls: vec!["amqp://a".to_string(), "amqp://b".to_string()],
            queue_prefix: "load".to_string(),
            from_queue_index: 0,
            to_queue_index: 2,
            ..Default::default()
        };
        config.publish.workers = publish_workers;
        config.consume.workers = consume_workers;
        config.payload_size.min_bytes = 8;
        config.payload_size.max_bytes = 16;
        config
    }

    fn scheduler(config: LoadConfig, broker: &InMemoryBroker) -> Result<Scheduler> {
        Scheduler::new(
            config,
            Arc::new(broker.clone()),
            Arc::new(NoopObserver),
            Arc::new(TokioTimeProvider::new()),
        )
        .map(|s| s.with_seed(42))
    }

    #[test]
    fn test_invalid_config_rejected_before_connecting() {
        let broker = InMemoryBroker::new();
        let mut bad = config(1, 1);
        bad.broker_urls.clear();

        let result = scheduler(bad, &broker);
        assert!(matches!(result, Err(AppError::Config(_))));
        assert!(broker.connections().is_empty());
    }

    #[test]
    fn test_oversized_endpoint_count_rejected_before_connecting() {
        let broker = InMemoryBroker::new();
        let mut huge = config(1, 1);
        huge.from_queue_index = 0;
        huge.to_queue_index = u64::MAX - 1;
        huge.consume.enabled = false;
        huge.publish.endpoints_per_queue = 2;

        let result = scheduler(huge, &broker);
        assert!(matches!(result, Err(AppError::Config(_))));
        assert!(broker.connections().is_empty());
    }

    /// Signals shutdown once `stop_after` connections were opened
    struct StoppingConnector {
        broker: InMemoryBroker,
        shutdown: Arc<ShutdownSender>,
        stop_after: usize,
        connects: AtomicUsize,
    }

    #[async_trait]
    impl BrokerConnector for StoppingConnector {
        async fn connect(
            &self,
            url: &str,
            connection_name: &str,
        ) -> std::result::Result<Box<dyn BrokerConnection>, BrokerError> {
            let connection = self.broker.connect(url, connection_name).await?;
            if self.connects.fetch_add(1, Ordering::SeqCst) + 1 == self.stop_after {
                self.shutdown.shutdown();
            }
            Ok(connection)
        }
    }

    #[tokio::test]
    async fn test_shutdown_during_build_closes_opened_endpoints() {
        let broker = InMemoryBroker::new();
        let (tx, _token) = shutdown_channel();
        let tx = Arc::new(tx);
        let connector = StoppingConnector {
            broker: broker.clone(),
            shutdown: Arc::clone(&tx),
            stop_after: 2,
            connects: AtomicUsize::new(0),
        };
        let mut cfg = config(1, 1);
        cfg.publish.endpoints_per_queue = 2;
        let mut scheduler = Scheduler::new(
            cfg,
            Arc::new(connector),
            Arc::new(NoopObserver),
            Arc::new(TokioTimeProvider::new()),
        )
        .unwrap();

        let endpoints = scheduler.build_endpoints(Role::Publish, &tx).await.unwrap();

        assert!(endpoints.is_empty());
        assert_eq!(broker.connections().len(), 2);
        assert_eq!(broker.open_connections(), 0);
        assert_eq!(broker.open_channels(), 0);
    }

    #[tokio::test]
    async fn test_run_after_shutdown_opens_nothing() {
        let broker = InMemoryBroker::new();
        let scheduler = scheduler(config(1, 1), &broker).unwrap();
        let (tx, _token) = shutdown_channel();
        tx.shutdown();

        let summaries = scheduler.run(&tx).await.unwrap();

        assert!(summaries.is_empty());
        assert!(broker.connections().is_empty());
    }

    #[tokio::test]
    async fn test_build_endpoints_covers_shard() {
        let broker = InMemoryBroker::new();
        let mut cfg = config(1, 1);
        cfg.instance_index = 1;
        cfg.publish.endpoints_per_queue = 2;
        let mut scheduler = scheduler(cfg, &broker).unwrap();
        let (tx, _token) = shutdown_channel();

        let endpoints = scheduler.build_endpoints(Role::Publish, &tx).await.unwrap();
        let ids: Vec<&str> = endpoints.iter().map(|e| e.id().as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "Publisher-0-0",
                "Publisher-0-1",
                "Publisher-1-0",
                "Publisher-1-1",
                "Publisher-2-0",
                "Publisher-2-1",
            ]
        );
        assert_eq!(
            broker.declared_queues(),
            vec!["load-3".to_string(), "load-4".to_string(), "load-5".to_string()]
        );
        assert!(endpoints.iter().all(|e| (8..=16).contains(&e.payload_len())));
        assert!(broker
            .connections()
            .iter()
            .all(|(url, _)| url == "amqp://a" || url == "amqp://b"));
    }

    #[tokio::test]
    async fn test_build_failure_closes_opened_endpoints() {
        let broker = InMemoryBroker::new();
        let mut cfg = config(1, 1);
        cfg.broker_urls = vec!["amqp://a".to_string()];
        let mut scheduler = scheduler(cfg, &broker).unwrap();
        let (tx, _token) = shutdown_channel();

        let first = scheduler.build_endpoints(Role::Consume, &tx).await.unwrap();
        assert_eq!(first.len(), 3);
        close_all(first).await;

        broker.mark_unreachable("amqp://a");
        let result = scheduler.build_endpoints(Role::Consume, &tx).await;
        assert!(matches!(result, Err(AppError::BrokerUnavailable(_))));
        assert_eq!(broker.open_connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_shutdown() {
        let broker = InMemoryBroker::new();
        let scheduler = scheduler(config(2, 4), &broker).unwrap();
        let (tx, _token) = shutdown_channel();

        let stopper = async {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            tx.shutdown();
        };
        let (summaries, _) = tokio::join!(scheduler.run(&tx), stopper);
        let summaries = summaries.unwrap();

        // 3 consumer endpoints over 4 workers: the surplus worker is skipped
        let consumers: Vec<_> = summaries.iter().filter(|s| s.role == Role::Consume).collect();
        let publishers: Vec<_> = summaries.iter().filter(|s| s.role == Role::Publish).collect();
        assert_eq!(consumers.len(), 3);
        assert_eq!(publishers.len(), 2);
        assert!(summaries.iter().all(|s| s.iterations == 3));

        let published: u64 = publishers.iter().map(|s| s.operations).sum();
        assert_eq!(published, 9);
        assert_eq!(broker.open_connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_failure_stops_everyone() {
        let broker = InMemoryBroker::new();
        let scheduler = scheduler(config(1, 1), &broker).unwrap();
        broker.fail_after_operations(10);
        let (tx, _token) = shutdown_channel();

        let result = tokio::time::timeout(Duration::from_secs(30), scheduler.run(&tx))
            .await
            .expect("run should end after the failure");

        assert!(matches!(result, Err(AppError::BrokerUnavailable(_))));
        assert!(tx.is_shutdown());
        assert_eq!(broker.open_connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_role_opens_nothing() {
        let broker = InMemoryBroker::new();
        let mut cfg = config(1, 1);
        cfg.publish.enabled = false;
        let scheduler = scheduler(cfg, &broker).unwrap();
        let (tx, _token) = shutdown_channel();

        let stopper = async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            tx.shutdown();
        };
        let (summaries, _) = tokio::join!(scheduler.run(&tx), stopper);
        let summaries = summaries.unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].role, Role::Consume);
        assert_eq!(broker.publish_count(), 0);
        assert_eq!(broker.connections().len(), 3);
        assert!(broker
            .connections()
            .iter()
            .all(|(_, name)| name.starts_with("Consumer-")));
    }
}
