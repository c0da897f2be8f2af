//! Start latency metrics.
//!
//! Workers report the time from dequeuing a task to resolving it. The
//! in-memory [`StartLatency`] collector keeps a count, a running total and
//! the maximum; exporting them is left to the embedding application.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Receives start latency samples.
pub trait MetricsSink: Send + Sync {
    /// Records how long one start task took.
    fn record_start_latency(&self, elapsed: Duration);
}

/// Lock-free aggregate of start latencies.
#[derive(Debug, Default)]
pub struct StartLatency {
    count: AtomicU64,
    total_micros: AtomicU64,
    max_micros: AtomicU64,
}

/// Point-in-time copy of a [`StartLatency`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatencySnapshot {
    /// Number of samples.
    pub count: u64,
    /// Sum of all samples.
    pub total: Duration,
    /// Largest sample.
    pub max: Duration,
}

impl LatencySnapshot {
    /// Average sample, or zero without samples.
    #[must_use]
    pub fn mean(&self) -> Duration {
        match u32::try_from(self.count) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total / n,
            Err(_) => Duration::from_micros(
                u64::try_from(self.total.as_micros() / u128::from(self.count)).unwrap_or(u64::MAX),
            ),
        }
    }
}

impl StartLatency {
    /// Returns the current aggregate.
    #[must_use]
    pub fn snapshot(&self) -> LatencySnapshot {
        LatencySnapshot {
            count: self.count.load(Ordering::Relaxed),
            total: Duration::from_micros(self.total_micros.load(Ordering::Relaxed)),
            max: Duration::from_micros(self.max_micros.load(Ordering::Relaxed)),
        }
    }
}

impl MetricsSink for StartLatency {
    fn record_start_latency(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        let _ = self.count.fetch_add(1, Ordering::Relaxed);
        let _ = self.total_micros.fetch_add(micros, Ordering::Relaxed);
        let _ = self.max_micros.fetch_max(micros, Ordering::Relaxed);
    }
}
