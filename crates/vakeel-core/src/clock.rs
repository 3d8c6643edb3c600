//! Time source abstraction for the TTL cache.
//!
//! Production code uses [`TokioClock`], which reads tokio's monotonic
//! clock and therefore honours `tokio::time::pause` in tests. A custom
//! implementation can be injected through
//! [`Cache::with_clock`](crate::Cache::with_clock).

use tokio::time::Instant;

/// Provides the current instant for deadline arithmetic.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Clock backed by the tokio runtime.
///
/// Under a paused runtime (`#[tokio::test(start_paused = true)]`) this
/// clock advances with virtual time, which makes expiry deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
