//! Start workers.
//!
//! A worker runs one task to completion before taking the next one from the
//! shared queue. A failed start emits a delete event before the failure is
//! reported, so reconciliation can remove what the start left on disk.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use corral_common::error::{CorralError, Result};
use corral_runtime::{Container, Stdio};
use crossbeam_channel::Receiver;

use crate::event::{Event, EventSink, EventType};
use crate::metrics::MetricsSink;
use crate::task::{StartMode, StartResponse, StartTask};

/// One member of a [`WorkerPool`](crate::pool::WorkerPool).
pub struct Worker {
    index: usize,
    tasks: Receiver<StartTask>,
    events: Arc<dyn EventSink>,
    metrics: Arc<dyn MetricsSink>,
    active: Arc<AtomicUsize>,
}

impl Worker {
    /// Creates a worker draining `tasks`.
    ///
    /// `active` is decremented once the queue is closed and drained.
    #[must_use]
    pub fn new(
        index: usize,
        tasks: Receiver<StartTask>,
        events: Arc<dyn EventSink>,
        metrics: Arc<dyn MetricsSink>,
        active: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            index,
            tasks,
            events,
            metrics,
            active,
        }
    }

    /// Processes tasks until the queue is closed and empty.
    pub fn run(self) {
        tracing::debug!(worker = self.index, "worker started");
        for task in &self.tasks {
            self.process(task);
        }
        let _ = self.active.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!(worker = self.index, "worker drained queue and exited");
    }

    /// Resolves a single task.
    pub fn process(&self, task: StartTask) {
        let received = Instant::now();
        let StartTask {
            container,
            mode,
            stdio,
            deadline,
            reply,
        } = task;
        let id = container.id().clone();

        let result = if deadline.is_some_and(|deadline| received >= deadline) {
            Err(CorralError::DeadlineExceeded { id: id.to_string() })
        } else {
            panic::catch_unwind(AssertUnwindSafe(|| execute(&container, &mode, &stdio)))
                .unwrap_or_else(|payload| {
                    Err(CorralError::WorkerPanicked {
                        id: id.to_string(),
                        message: panic_message(payload.as_ref()),
                    })
                })
        };

        if let Err(e) = &result {
            tracing::error!(worker = self.index, %id, error = %e, "container start failed");
            self.events.emit(Event::new(EventType::Delete, id.clone()));
        }

        let elapsed = received.elapsed();
        self.metrics.record_start_latency(elapsed);
        tracing::debug!(worker = self.index, %id, ?elapsed, ok = result.is_ok(), "start task resolved");

        if reply.send(result).is_err() {
            tracing::debug!(%id, "start result dropped: submitter went away");
        }
    }
}

fn execute(container: &Container, mode: &StartMode, stdio: &Stdio) -> Result<StartResponse> {
    let process = match mode {
        StartMode::Fresh => container.start_with(stdio)?,
        StartMode::Restore { checkpoint } => container.restore(checkpoint)?,
    };
    Ok(StartResponse::from_process(&process))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
