// Time Provider Port (for testability)

/// Time provider interface (allows mocking in tests)
pub trait TimeProvider: Send + Sync {
    /// Get current wall-clock time in milliseconds since epoch
    fn now_millis(&self) -> i64;
}

/// System time provider (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns scripted timestamps in order, then repeats the last one
    pub struct ScriptedTimeProvider {
        script: Mutex<VecDeque<i64>>,
        last: Mutex<i64>,
    }

    impl ScriptedTimeProvider {
        pub fn new(script: impl IntoIterator<Item = i64>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                last: Mutex::new(0),
            }
        }
    }

    impl TimeProvider for ScriptedTimeProvider {
        fn now_millis(&self) -> i64 {
            let mut last = self.last.lock().unwrap();
            if let Some(next) = self.script.lock().unwrap().pop_front() {
                *last = next;
            }
            *last
        }
    }

    /// Milliseconds since creation on the tokio clock, so paused-time tests
    /// see the same elapsed time as `tokio::time::sleep`
    pub struct TokioTimeProvider {
        origin: tokio::time::Instant,
    }

    impl TokioTimeProvider {
        pub fn new() -> Self {
            Self {
                origin: tokio::time::Instant::now(),
            }
        }
    }

    impl Default for TokioTimeProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TimeProvider for TokioTimeProvider {
        fn now_millis(&self) -> i64 {
            i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX)
        }
    }
}
