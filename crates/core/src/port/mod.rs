// Port Layer - Interfaces for external dependencies

pub mod broker;
pub mod observer;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use broker::{BrokerChannel, BrokerConnection, BrokerConnector, BrokerError, QueueOptions};
pub use observer::{CompositeObserver, IterationReport, NoopObserver, OperationObserver, TracingObserver};
pub use time_provider::TimeProvider;
