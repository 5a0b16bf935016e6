// Broker Port
// Abstraction over the message broker client (connect, declare, publish, fetch)

use async_trait::async_trait;
use thiserror::Error;

/// Broker errors
///
/// Every variant means the broker is unavailable to the caller; none are retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Connection to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Declaring queue {queue} failed: {reason}")]
    Declare { queue: String, reason: String },

    #[error("Publish to {queue} failed: {reason}")]
    Publish { queue: String, reason: String },

    #[error("Fetch from {queue} failed: {reason}")]
    Fetch { queue: String, reason: String },

    #[error("Close failed: {0}")]
    Close(String),
}

/// Queue declaration properties requested from the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
}

impl Default for QueueOptions {
    /// Shared, transient queue removed by the broker once unused
    fn default() -> Self {
        Self {
            durable: false,
            exclusive: false,
            auto_delete: true,
        }
    }
}

/// Opens broker connections
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Open a connection to `url`, announcing `connection_name` to the broker
    ///
    /// # Errors
    /// - BrokerError::Connect if the broker cannot be reached
    async fn connect(
        &self,
        url: &str,
        connection_name: &str,
    ) -> Result<Box<dyn BrokerConnection>, BrokerError>;
}

/// One open broker connection
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    async fn open_channel(&self) -> Result<Box<dyn BrokerChannel>, BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}

/// One channel on a connection
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Idempotently declare `queue`
    async fn declare_queue(&self, queue: &str, options: QueueOptions) -> Result<(), BrokerError>;

    /// Publish through the default exchange, routed by queue name
    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Fetch at most one message without waiting; `None` when the queue is empty
    async fn fetch_one(&self, queue: &str, manual_ack: bool) -> Result<Option<Vec<u8>>, BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct BrokerState {
        queues: HashMap<String, VecDeque<Vec<u8>>>,
        declared: HashMap<String, QueueOptions>,
        connections: Vec<(String, String)>,
        open_connections: usize,
        open_channels: usize,
        publish_calls: usize,
        fetch_calls: usize,
        unreachable: HashSet<String>,
        refuse_channels: bool,
        failing_declares: HashSet<String>,
        fail_after_operations: Option<usize>,
        operation_delay: Option<Duration>,
    }

    impl BrokerState {
        fn operations(&self) -> usize {
            self.publish_calls + self.fetch_calls
        }

        fn should_fail(&self) -> bool {
            matches!(self.fail_after_operations, Some(limit) if self.operations() >= limit)
        }
    }

    /// In-memory broker shared by every connection it hands out
    #[derive(Clone, Default)]
    pub struct InMemoryBroker {
        state: Arc<Mutex<BrokerState>>,
    }

    impl InMemoryBroker {
        pub fn new() -> Self {
            Self::default()
        }

        /// Refuse connections to `url`
        pub fn mark_unreachable(&self, url: impl Into<String>) {
            self.state.lock().unwrap().unreachable.insert(url.into());
        }

        /// Refuse every channel open on connections from this broker
        pub fn fail_channel_open(&self) {
            self.state.lock().unwrap().refuse_channels = true;
        }

        /// Reject declarations of `queue`
        pub fn fail_declare(&self, queue: impl Into<String>) {
            self.state.lock().unwrap().failing_declares.insert(queue.into());
        }

        /// Fail every publish/fetch once `limit` operations have succeeded
        pub fn fail_after_operations(&self, limit: usize) {
            self.state.lock().unwrap().fail_after_operations = Some(limit);
        }

        /// Delay each publish/fetch on the tokio clock
        pub fn set_operation_delay(&self, delay: Duration) {
            self.state.lock().unwrap().operation_delay = Some(delay);
        }

        pub fn enqueue(&self, queue: &str, payload: Vec<u8>) {
            self.state
                .lock()
                .unwrap()
                .queues
                .entry(queue.to_string())
                .or_default()
                .push_back(payload);
        }

        pub fn publish_count(&self) -> usize {
            self.state.lock().unwrap().publish_calls
        }

        pub fn fetch_count(&self) -> usize {
            self.state.lock().unwrap().fetch_calls
        }

        pub fn queue_depth(&self, queue: &str) -> usize {
            self.state
                .lock()
                .unwrap()
                .queues
                .get(queue)
                .map_or(0, VecDeque::len)
        }

        /// Declared queue names, sorted
        pub fn declared_queues(&self) -> Vec<String> {
            let mut names: Vec<_> = self.state.lock().unwrap().declared.keys().cloned().collect();
            names.sort();
            names
        }

        pub fn queue_options(&self, queue: &str) -> Option<QueueOptions> {
            self.state.lock().unwrap().declared.get(queue).copied()
        }

        /// Every `(url, connection_name)` ever connected
        pub fn connections(&self) -> Vec<(String, String)> {
            self.state.lock().unwrap().connections.clone()
        }

        pub fn open_connections(&self) -> usize {
            self.state.lock().unwrap().open_connections
        }

        pub fn open_channels(&self) -> usize {
            self.state.lock().unwrap().open_channels
        }

        async fn pause(&self) {
            let delay = self.state.lock().unwrap().operation_delay;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }
    }

    #[async_trait]
    impl BrokerConnector for InMemoryBroker {
        async fn connect(
            &self,
            url: &str,
            connection_name: &str,
        ) -> Result<Box<dyn BrokerConnection>, BrokerError> {
            let mut state = self.state.lock().unwrap();
            if state.unreachable.contains(url) {
                return Err(BrokerError::Connect {
                    url: url.to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            state
                .connections
                .push((url.to_string(), connection_name.to_string()));
            state.open_connections += 1;
            Ok(Box::new(InMemoryConnection {
                broker: self.clone(),
            }))
        }
    }

    struct InMemoryConnection {
        broker: InMemoryBroker,
    }

    #[async_trait]
    impl BrokerConnection for InMemoryConnection {
        async fn open_channel(&self) -> Result<Box<dyn BrokerChannel>, BrokerError> {
            let mut state = self.broker.state.lock().unwrap();
            if state.refuse_channels {
                return Err(BrokerError::Channel("channel open refused".to_string()));
            }
            state.open_channels += 1;
            Ok(Box::new(InMemoryChannel {
                broker: self.broker.clone(),
            }))
        }

        async fn close(&self) -> Result<(), BrokerError> {
            let mut state = self.broker.state.lock().unwrap();
            state.open_connections = state.open_connections.saturating_sub(1);
            Ok(())
        }
    }

    struct InMemoryChannel {
        broker: InMemoryBroker,
    }

    #[async_trait]
    impl BrokerChannel for InMemoryChannel {
        async fn declare_queue(&self, queue: &str, options: QueueOptions) -> Result<(), BrokerError> {
            let mut state = self.broker.state.lock().unwrap();
            if state.failing_declares.contains(queue) {
                return Err(BrokerError::Declare {
                    queue: queue.to_string(),
                    reason: "PRECONDITION_FAILED".to_string(),
                });
            }
            state.declared.entry(queue.to_string()).or_insert(options);
            state.queues.entry(queue.to_string()).or_default();
            Ok(())
        }

        async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), BrokerError> {
            self.broker.pause().await;
            let mut state = self.broker.state.lock().unwrap();
            if state.should_fail() {
                return Err(BrokerError::Publish {
                    queue: routing_key.to_string(),
                    reason: "connection reset".to_string(),
                });
            }
            state.publish_calls += 1;
            state
                .queues
                .entry(routing_key.to_string())
                .or_default()
                .push_back(payload.to_vec());
            Ok(())
        }

        async fn fetch_one(&self, queue: &str, _manual_ack: bool) -> Result<Option<Vec<u8>>, BrokerError> {
            self.broker.pause().await;
            let mut state = self.broker.state.lock().unwrap();
            if state.should_fail() {
                return Err(BrokerError::Fetch {
                    queue: queue.to_string(),
                    reason: "connection reset".to_string(),
                });
            }
            state.fetch_calls += 1;
            Ok(state.queues.get_mut(queue).and_then(VecDeque::pop_front))
        }

        async fn close(&self) -> Result<(), BrokerError> {
            let mut state = self.broker.state.lock().unwrap();
            state.open_channels = state.open_channels.saturating_sub(1);
            Ok(())
        }
    }
}
