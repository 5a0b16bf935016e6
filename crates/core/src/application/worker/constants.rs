// Worker constants (no magic values)
use std::time::Duration;

/// Target length of one rate loop iteration
pub const CADENCE: Duration = Duration::from_secs(1);

/// How long shutdown waits for workers to close their endpoints (5s)
pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default interval between throughput reports (10s)
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(10);

/// Fetches never use manual acknowledgement
pub const POLL_MANUAL_ACK: bool = false;
