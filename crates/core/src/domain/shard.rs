// Queue Shard - the slice of global queue indices one deployed instance owns

use super::error::{DomainError, Result};
use std::fmt;
use std::ops::Range;

/// Half-open range `[start, end)` of global queue indices
///
/// Every instance covers `to - from + 1` queues and continues the sequence
/// where the previous instance index stopped, so shards of instances
/// `0..k` are disjoint and contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueShard {
    pub start: u64,
    pub end: u64,
}

impl QueueShard {
    /// Compute the shard of `instance_index` for the configured `[from, to]` queue range
    pub fn for_instance(instance_index: u32, from: u64, to: u64) -> Result<Self> {
        if to < from {
            return Err(DomainError::InvalidQueueRange(format!(
                "to index {} is below from index {}",
                to, from
            )));
        }
        let per_instance = to - from + 1;
        let start = per_instance
            .checked_mul(u64::from(instance_index))
            .and_then(|offset| offset.checked_add(from))
            .ok_or_else(|| overflow(instance_index, from, to))?;
        let end = start
            .checked_add(per_instance)
            .ok_or_else(|| overflow(instance_index, from, to))?;
        Ok(Self { start, end })
    }

    /// Number of queues in the shard
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn indices(&self) -> Range<u64> {
        self.start..self.end
    }

    /// Global index of the queue at `offset` within this shard
    pub fn global_index(&self, offset: u64) -> u64 {
        self.start + offset
    }

    /// Broker queue name for the queue at `offset` within this shard
    pub fn queue_name(&self, prefix: &str, offset: u64) -> String {
        format!("{}-{}", prefix, self.global_index(offset))
    }
}

fn overflow(instance_index: u32, from: u64, to: u64) -> DomainError {
    DomainError::InvalidQueueRange(format!(
        "instance {} with range [{}, {}] overflows the queue index space",
        instance_index, from, to
    ))
}

impl fmt::Display for QueueShard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
