//! Supervisor control plane.
//!
//! Owns the containers under one root, the start worker pool, and the
//! receiving end of the event channel. Failed starts come back as delete
//! events that [`Supervisor::reconcile`] applies.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use corral_common::config::SupervisorConfig;
use corral_common::error::{CorralError, Result};
use corral_common::types::ContainerId;
use corral_runtime::{Container, ExecShimLauncher, ShimLauncher, Stdio, load_all};
use crossbeam_channel::Receiver;

use crate::event::{Event, EventSink, EventType};
use crate::metrics::{LatencySnapshot, MetricsSink, StartLatency};
use crate::pool::WorkerPool;
use crate::task::{StartHandle, StartTask};

/// Container supervisor for one state root.
#[derive(Debug)]
pub struct Supervisor {
    config: SupervisorConfig,
    launcher: Arc<dyn ShimLauncher>,
    containers: Mutex<BTreeMap<ContainerId, Container>>,
    events: Receiver<Event>,
    latency: Arc<StartLatency>,
    pool: WorkerPool,
}

impl Supervisor {
    /// Creates a supervisor that launches `config.shim_binary` as monitor.
    ///
    /// # Errors
    ///
    /// See [`Self::with_launcher`].
    pub fn new(config: SupervisorConfig) -> Result<Self> {
        let launcher = Arc::new(ExecShimLauncher::new(config.shim_binary.clone()));
        Self::with_launcher(config, launcher)
    }

    /// Creates a supervisor with a custom monitor launcher.
    ///
    /// The state root is created if needed and every container already in
    /// it is adopted.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid config, or an I/O error
    /// if the root cannot be created or listed or workers cannot spawn.
    pub fn with_launcher(config: SupervisorConfig, launcher: Arc<dyn ShimLauncher>) -> Result<Self> {
        config.validate().map_err(|message| CorralError::Config {
            path: config.root.clone(),
            message,
        })?;
        std::fs::create_dir_all(&config.root).map_err(|e| CorralError::io(&config.root, e))?;

        let adopted: BTreeMap<_, _> = load_all(&config.root, &launcher)?
            .into_iter()
            .map(|c| (c.id().clone(), c))
            .collect();
        tracing::info!(
            root = %config.root.display(),
            containers = adopted.len(),
            "adopted existing containers"
        );

        let (event_tx, events) = crossbeam_channel::unbounded();
        let sink: Arc<dyn EventSink> = Arc::new(event_tx);
        let latency = Arc::new(StartLatency::default());
        let metrics: Arc<dyn MetricsSink> = latency.clone();
        let pool = WorkerPool::spawn(config.workers, &sink, &metrics)?;

        Ok(Self {
            config,
            launcher,
            containers: Mutex::new(adopted),
            events,
            latency,
            pool,
        })
    }

    fn containers(&self) -> MutexGuard<'_, BTreeMap<ContainerId, Container>> {
        self.containers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Creates and tracks a new container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be created on disk.
    pub fn create(&self, id: ContainerId, bundle: impl Into<PathBuf>) -> Result<Container> {
        let container =
            Container::new_with_launcher(&self.config.root, id, bundle, Arc::clone(&self.launcher))?;
        let _ = self
            .containers()
            .insert(container.id().clone(), container.clone());
        Ok(container)
    }

    /// Looks up a tracked container.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::NotFound`] if the id is unknown.
    pub fn get(&self, id: &ContainerId) -> Result<Container> {
        self.containers()
            .get(id)
            .cloned()
            .ok_or_else(|| CorralError::NotFound {
                kind: "container",
                id: id.to_string(),
            })
    }

    /// Tracked containers, ordered by id.
    #[must_use]
    pub fn list(&self) -> Vec<Container> {
        self.containers().values().cloned().collect()
    }

    /// Queues a fresh start of a tracked container.
    ///
    /// Callers must not queue a second start for the same container before
    /// the first resolves; if they do, the second fails with
    /// [`CorralError::InvalidState`].
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::NotFound`] for an unknown id or
    /// [`CorralError::QueueClosed`] if the pool is shutting down.
    pub fn start(&self, id: &ContainerId, stdio: Stdio) -> Result<StartHandle> {
        let (task, handle) = StartTask::new(self.get(id)?);
        self.submit(task.with_stdio(stdio))?;
        Ok(handle)
    }

    /// Queues a restore of a tracked container from a checkpoint.
    ///
    /// # Errors
    ///
    /// Same as [`Self::start`].
    pub fn restore(&self, id: &ContainerId, checkpoint: &str) -> Result<StartHandle> {
        let (task, handle) = StartTask::restore(self.get(id)?, checkpoint);
        self.submit(task)?;
        Ok(handle)
    }

    /// Queues a prepared task.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::QueueClosed`] if the pool is shutting down.
    pub fn submit(&self, task: StartTask) -> Result<()> {
        self.pool.submit(task)
    }

    /// Deletes a tracked container and forgets it.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::NotFound`] for an unknown id, or the error
    /// from [`Container::delete`], in which case it stays tracked.
    pub fn delete(&self, id: &ContainerId) -> Result<()> {
        let container = self.get(id)?;
        container.delete()?;
        let _ = self.forget(&container);
        Ok(())
    }

    /// Stops tracking `container`, unless its id has since been taken by
    /// another instance.
    fn forget(&self, container: &Container) -> bool {
        let mut containers = self.containers();
        if containers
            .get(container.id())
            .is_some_and(|tracked| tracked.ptr_eq(container))
        {
            containers.remove(container.id()).is_some()
        } else {
            false
        }
    }

    /// Events emitted by workers.
    #[must_use]
    pub const fn events(&self) -> &Receiver<Event> {
        &self.events
    }

    /// Applies one event to the tracked containers.
    ///
    /// # Errors
    ///
    /// Returns the error of the deletion a delete event triggered.
    pub fn reconcile(&self, event: &Event) -> Result<()> {
        match event.kind {
            EventType::Delete => match self.delete(&event.id) {
                Ok(()) => {
                    tracing::info!(id = %event.id, "reconciled delete event");
                    Ok(())
                }
                Err(CorralError::NotFound { .. }) => {
                    tracing::debug!(id = %event.id, "delete event for untracked container");
                    Ok(())
                }
                Err(e) => Err(e),
            },
        }
    }

    /// Applies every event already queued, returning how many were applied.
    ///
    /// # Errors
    ///
    /// Stops at the first event whose reconciliation fails.
    pub fn reconcile_pending(&self) -> Result<usize> {
        let mut applied = 0;
        for event in self.events.try_iter() {
            self.reconcile(&event)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Aggregate start latency so far.
    #[must_use]
    pub fn start_latency(&self) -> LatencySnapshot {
        self.latency.snapshot()
    }

    /// Number of workers still running.
    #[must_use]
    pub fn active_workers(&self) -> usize {
        self.pool.active_workers()
    }

    /// Drains the queue and stops all workers.
    pub fn shutdown(self) {
        self.pool.shutdown();
    }
}
