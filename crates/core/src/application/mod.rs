// Application Layer - Endpoints, partitioning and the rate loops

pub mod endpoint;
pub mod partitioner;
pub mod scheduler;
pub mod stats;
pub mod worker;

// Re-exports
pub use endpoint::{Endpoint, EndpointSpec};
pub use scheduler::Scheduler;
pub use stats::{StatsReporter, StatsSnapshot, ThroughputStats};
pub use worker::{shutdown_channel, LoopSummary, RateLoop, ShutdownSender, ShutdownToken};
