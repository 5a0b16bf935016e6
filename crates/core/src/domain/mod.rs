// Domain Layer - Pure workload model

pub mod assignment;
pub mod error;
pub mod operation;
pub mod payload;
pub mod role;
pub mod shard;

// Re-exports
pub use assignment::WorkerAssignment;
pub use error::DomainError;
pub use operation::{EndpointId, OperationOutcome};
pub use payload::Payload;
pub use role::Role;
pub use shard::QueueShard;
