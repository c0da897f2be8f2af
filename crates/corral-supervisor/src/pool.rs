//! Fixed-size worker pool over a shared start queue.
//!
//! The queue is unbounded and owned by the pool; tasks are taken in
//! submission order by whichever worker is free, so no ordering holds across
//! tasks. Dropping or shutting down the pool closes the queue, lets every
//! worker drain what is left, and joins them.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use corral_common::error::{CorralError, Result};
use crossbeam_channel::Sender;

use crate::event::EventSink;
use crate::metrics::MetricsSink;
use crate::task::StartTask;
use crate::worker::Worker;

/// Owns the start queue and the workers draining it.
#[derive(Debug)]
pub struct WorkerPool {
    queue: Option<Sender<StartTask>>,
    workers: Vec<JoinHandle<()>>,
    active: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawns `workers` threads (at least one) draining a fresh queue.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a worker thread cannot be spawned. Workers
    /// spawned before the failure are shut down.
    pub fn spawn(
        workers: usize,
        events: &Arc<dyn EventSink>,
        metrics: &Arc<dyn MetricsSink>,
    ) -> Result<Self> {
        let count = workers.max(1);
        let (queue, tasks) = crossbeam_channel::unbounded();
        let active = Arc::new(AtomicUsize::new(0));
        let mut pool = Self {
            queue: Some(queue),
            workers: Vec::with_capacity(count),
            active: Arc::clone(&active),
        };

        for index in 0..count {
            let worker = Worker::new(
                index,
                tasks.clone(),
                Arc::clone(events),
                Arc::clone(metrics),
                Arc::clone(&active),
            );
            let _ = active.fetch_add(1, Ordering::SeqCst);
            let handle = std::thread::Builder::new()
                .name(format!("corral-worker-{index}"))
                .spawn(move || worker.run())
                .map_err(|e| {
                    let _ = active.fetch_sub(1, Ordering::SeqCst);
                    CorralError::io(format!("worker thread {index}"), e)
                })?;
            pool.workers.push(handle);
        }

        tracing::info!(workers = count, "worker pool started");
        Ok(pool)
    }

    /// Queues a task for the next free worker.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::QueueClosed`] if the pool is shutting down.
    pub fn submit(&self, task: StartTask) -> Result<()> {
        let queue = self.queue.as_ref().ok_or(CorralError::QueueClosed)?;
        let id = task.container().id().clone();
        queue.send(task).map_err(|_| CorralError::QueueClosed)?;
        tracing::debug!(%id, queued = queue.len(), "start task submitted");
        Ok(())
    }

    /// Number of workers that have not yet exited.
    #[must_use]
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Number of tasks waiting for a worker.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.as_ref().map_or(0, Sender::len)
    }

    /// Closes the queue and waits for every worker to drain it.
    pub fn shutdown(mut self) {
        self.close_and_join();
    }

    fn close_and_join(&mut self) {
        if self.queue.take().is_none() {
            return;
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked outside a task");
            }
        }
        tracing::info!("worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close_and_join();
    }
}
