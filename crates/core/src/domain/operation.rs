// Endpoint identity and operation outcomes

use super::Role;
use std::fmt;

/// Stable identity of one endpoint, e.g. `Publisher-3-0`
///
/// The first number is the queue offset inside this instance's shard, the
/// second is the replica index for that queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn new(role: Role, queue_offset: u64, replica: usize) -> Self {
        Self(format!(
            "{}-{}-{}",
            role.endpoint_label(),
            queue_offset,
            replica
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a single publish or poll
///
/// `QueueEmpty` is a normal poll outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    Published { bytes: usize },
    MessageReceived { bytes: usize },
    QueueEmpty,
}

impl OperationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationOutcome::Published { .. } => "published",
            OperationOutcome::MessageReceived { .. } => "received",
            OperationOutcome::QueueEmpty => "queue_empty",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_id_format() {
        assert_eq!(EndpointId::new(Role::Publish, 3, 0).as_str(), "Publisher-3-0");
        assert_eq!(EndpointId::new(Role::Consume, 0, 2).to_string(), "Consumer-0-2");
    }
}
