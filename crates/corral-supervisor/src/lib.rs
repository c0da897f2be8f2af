//! # corral-supervisor
//!
//! Drives container starts through a bounded pool of workers.
//!
//! - [`StartTask`](task::StartTask): one start request and its one-shot result.
//! - [`WorkerPool`](pool::WorkerPool): fixed set of workers draining a shared queue.
//! - [`Supervisor`](supervisor::Supervisor): owns containers, the pool, and the
//!   event channel that drives cleanup after failed starts.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod event;
pub mod metrics;
pub mod pool;
pub mod supervisor;
pub mod task;
pub mod worker;

pub use event::{Event, EventSink, EventType};
pub use metrics::{LatencySnapshot, MetricsSink, StartLatency};
pub use pool::WorkerPool;
pub use supervisor::Supervisor;
pub use task::{StartHandle, StartMode, StartResponse, StartTask};
