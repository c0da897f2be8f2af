//! Container entity and lifecycle operations.
//!
//! A [`Container`] owns `<root>/<id>/`, knows the bundle it was created
//! from, and tracks its processes. Handles are cheap to clone and every
//! lifecycle operation takes the container's lock, so concurrent callers on
//! the same container are serialised rather than racing on the process map.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use corral_common::constants::{INIT_PROCESS_ID, PROC_DIR};
use corral_common::error::{CorralError, Result};
use corral_common::types::{ContainerId, Status};
use nix::sys::signal::Signal;
use serde::Serialize;

use crate::process::{Process, Stdio};
use crate::shim::{DetachedShim, ExecShimLauncher, ShimHandle, ShimLauncher, ShimRequest};
use crate::spec::ProcessSpec;
use crate::state::{
    PersistedState, is_started, load_shim_pid, load_state, mark_started, save_shim_pid, save_state,
};

/// Point-in-time view of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct State {
    /// Container identifier.
    pub id: ContainerId,
    /// Current lifecycle status.
    pub status: Status,
    /// Bundle the container was created from.
    pub bundle: PathBuf,
    /// PID of the monitor, whether attached or recorded by an earlier
    /// supervisor process.
    pub shim_pid: Option<u32>,
}

#[derive(Debug)]
pub(crate) struct Inner {
    root: PathBuf,
    id: ContainerId,
    bundle: PathBuf,
    launcher: Arc<dyn ShimLauncher>,
    lifecycle: Mutex<Lifecycle>,
}

#[derive(Debug)]
struct Lifecycle {
    status: Status,
    processes: BTreeMap<String, Process>,
    shim: Option<ShimHandle>,
    detached: Option<DetachedShim>,
}

impl Lifecycle {
    const fn new(status: Status) -> Self {
        Self {
            status,
            processes: BTreeMap::new(),
            shim: None,
            detached: None,
        }
    }

    fn shim_pid(&self) -> Option<u32> {
        self.shim
            .as_ref()
            .map(ShimHandle::pid)
            .or_else(|| self.detached.map(|d| d.pid()))
    }

    /// Moves a running or paused container to `Stopped` once its init
    /// process has exited.
    fn refresh(&mut self, id: &ContainerId) {
        if !matches!(self.status, Status::Running | Status::Paused) {
            return;
        }
        if self
            .processes
            .get(INIT_PROCESS_ID)
            .is_some_and(Process::has_exited)
        {
            self.status = Status::Stopped;
            tracing::info!(%id, "init process exited, container stopped");
        }
    }
}

/// A container managed by this supervisor.
#[derive(Debug, Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

impl Container {
    /// Creates a container, launching monitors with the default binary.
    ///
    /// # Errors
    ///
    /// See [`Self::new_with_launcher`].
    pub fn new(root: impl Into<PathBuf>, id: ContainerId, bundle: impl Into<PathBuf>) -> Result<Self> {
        Self::new_with_launcher(root, id, bundle, Arc::new(ExecShimLauncher::default()))
    }

    /// Creates `<root>/<id>/` and writes its state document.
    ///
    /// Either both the directory and the document exist afterwards, or
    /// neither does.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory already exists, cannot be
    /// created, or the state document cannot be written.
    pub fn new_with_launcher(
        root: impl Into<PathBuf>,
        id: ContainerId,
        bundle: impl Into<PathBuf>,
        launcher: Arc<dyn ShimLauncher>,
    ) -> Result<Self> {
        let container = Self::assemble(root.into(), id, bundle.into(), launcher, Status::Created);
        let dir = container.state_dir();
        std::fs::create_dir(&dir).map_err(|e| CorralError::io(&dir, e))?;

        let state = PersistedState {
            bundle: container.inner.bundle.clone(),
        };
        if let Err(e) = save_state(&dir, &state) {
            if let Err(cleanup) = std::fs::remove_dir_all(&dir) {
                tracing::warn!(path = %dir.display(), error = %cleanup, "failed to remove partial container");
            }
            return Err(e);
        }

        tracing::info!(id = %container.inner.id, bundle = %state.bundle.display(), "container created");
        Ok(container)
    }

    /// Reconstructs a container from its state directory with the default
    /// monitor binary.
    ///
    /// # Errors
    ///
    /// See [`Self::load_with_launcher`].
    pub fn load(root: impl Into<PathBuf>, id: ContainerId) -> Result<Self> {
        Self::load_with_launcher(root, id, Arc::new(ExecShimLauncher::default()))
    }

    /// Reconstructs a container from `<root>/<id>/state.json`.
    ///
    /// A container whose start completed has its init process re-registered
    /// and reports `Running`, or `Stopped` once the exit marker is present.
    /// Anything else reports `Created`. A recorded monitor PID is kept so
    /// that [`Self::delete`] can kill the monitor's group, but the monitor is
    /// not attached: the container cannot be paused or signalled, and a
    /// `Created` container with a recorded monitor cannot be started again.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::NotFound`] if there is no state document, or
    /// an error if the document cannot be read or decoded.
    pub fn load_with_launcher(
        root: impl Into<PathBuf>,
        id: ContainerId,
        launcher: Arc<dyn ShimLauncher>,
    ) -> Result<Self> {
        let root = root.into();
        let dir = root.join(id.as_str());
        let state = load_state(&dir, id.as_str())?;
        let container = Self::assemble(root, id, state.bundle, launcher, Status::Created);

        let process_dir = container.process_dir();
        let detached = match load_shim_pid(&process_dir) {
            Ok(pid) => pid.and_then(DetachedShim::from_pid),
            Err(e) => {
                tracing::warn!(id = %container.inner.id, error = %e, "ignoring unreadable shim pid");
                None
            }
        };

        let status = {
            let mut lifecycle = container.lifecycle();
            lifecycle.detached = detached;
            if is_started(&process_dir) {
                let spec = match crate::spec::read_spec(&container.inner.bundle) {
                    Ok(spec) => spec.process,
                    Err(e) => {
                        tracing::warn!(
                            id = %container.inner.id,
                            error = %e,
                            "bundle configuration unreadable; init process loaded without it"
                        );
                        ProcessSpec::default()
                    }
                };
                let process = Process::new(
                    INIT_PROCESS_ID,
                    &process_dir,
                    spec,
                    &Stdio::default(),
                    Arc::downgrade(&container.inner),
                );
                lifecycle.status = if process.has_exited() {
                    Status::Stopped
                } else {
                    Status::Running
                };
                let _ = lifecycle.processes.insert(INIT_PROCESS_ID.to_owned(), process);
            }
            lifecycle.status
        };

        tracing::debug!(id = %container.inner.id, %status, shim_pid = ?detached.map(|d| d.pid()), "container loaded");
        Ok(container)
    }

    fn assemble(
        root: PathBuf,
        id: ContainerId,
        bundle: PathBuf,
        launcher: Arc<dyn ShimLauncher>,
        status: Status,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                root,
                id,
                bundle,
                launcher,
                lifecycle: Mutex::new(Lifecycle::new(status)),
            }),
        }
    }

    pub(crate) const fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Container identifier.
    #[must_use]
    pub fn id(&self) -> &ContainerId {
        &self.inner.id
    }

    /// Bundle path the container was created from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.bundle
    }

    /// The container's private state directory, `<root>/<id>`.
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.inner.root.join(self.inner.id.as_str())
    }

    /// The init process's state directory, `<root>/<id>/proc`.
    #[must_use]
    pub fn process_dir(&self) -> PathBuf {
        self.state_dir().join(PROC_DIR)
    }

    /// Starts the container with default stream locations.
    ///
    /// # Errors
    ///
    /// See [`Self::start_with`].
    pub fn start(&self) -> Result<Process> {
        self.start_with(&Stdio::default())
    }

    /// Launches the monitor and registers the init process.
    ///
    /// The monitor's PID is recorded as soon as it is launched and the
    /// `started` marker only once the init process can be registered, so a
    /// later [`Self::load`] sees exactly the starts that succeeded. If the
    /// monitor cannot be launched or recorded, the process-state directory
    /// is removed again. If the bundle configuration cannot be decoded after
    /// the monitor was launched, no process is registered and the monitor is
    /// kept so that [`Self::delete`] can reap it.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::InvalidState`] unless the container is
    /// `Created` without a leftover monitor, an I/O error if the
    /// process-state records cannot be written, a spawn error if the monitor
    /// cannot be launched, or a configuration error if the bundle
    /// configuration is unusable.
    pub fn start_with(&self, stdio: &Stdio) -> Result<Process> {
        let mut lifecycle = self.lifecycle();
        if lifecycle.status != Status::Created {
            return Err(self.invalid_state(lifecycle.status, "start"));
        }
        if lifecycle.shim_pid().is_some() {
            return Err(self.invalid_state(lifecycle.status, "restart after a failed start of"));
        }

        let process_dir = self.process_dir();
        std::fs::create_dir_all(&process_dir).map_err(|e| CorralError::io(&process_dir, e))?;

        let launched = self.inner.launcher.launch(&ShimRequest {
            id: &self.inner.id,
            process_dir: &process_dir,
            bundle: &self.inner.bundle,
        });
        let shim = match launched {
            Ok(shim) => shim,
            Err(e) => {
                self.discard_process_dir(&process_dir);
                return Err(e);
            }
        };
        if let Err(e) = save_shim_pid(&process_dir, shim.pid()) {
            if let Err(kill) = shim.terminate() {
                tracing::warn!(id = %self.inner.id, error = %kill, "failed to terminate unrecorded shim");
            }
            self.discard_process_dir(&process_dir);
            return Err(e);
        }

        let spec = match crate::spec::read_spec(&self.inner.bundle).and_then(|spec| {
            mark_started(&process_dir)?;
            Ok(spec)
        }) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::warn!(
                    id = %self.inner.id,
                    shim_pid = shim.pid(),
                    error = %e,
                    "start failed after shim launch; shim kept until delete"
                );
                lifecycle.shim = Some(shim);
                return Err(e);
            }
        };

        let process = Process::new(
            INIT_PROCESS_ID,
            &process_dir,
            spec.process,
            stdio,
            Arc::downgrade(&self.inner),
        );
        let _ = lifecycle
            .processes
            .insert(INIT_PROCESS_ID.to_owned(), process.clone());
        lifecycle.shim = Some(shim);
        lifecycle.status = Status::Running;
        tracing::info!(id = %self.inner.id, "container started");
        Ok(process)
    }

    fn discard_process_dir(&self, process_dir: &Path) {
        if let Err(e) = std::fs::remove_dir_all(process_dir) {
            tracing::warn!(
                id = %self.inner.id,
                path = %process_dir.display(),
                error = %e,
                "failed to remove process-state directory"
            );
        }
    }

    /// Restores the container from a checkpoint.
    ///
    /// # Errors
    ///
    /// Always returns [`CorralError::NotSupported`]; checkpoint restore is
    /// not available.
    pub fn restore(&self, checkpoint: &str) -> Result<Process> {
        tracing::warn!(id = %self.inner.id, checkpoint, "restore requested but not supported");
        Err(CorralError::not_supported(format!(
            "restore of container {} from checkpoint {checkpoint}",
            self.inner.id
        )))
    }

    /// Freezes the monitor's process group.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::InvalidState`] unless the container is
    /// `Running`, [`CorralError::NotSupported`] if its monitor is not
    /// attached, or an I/O error if the group cannot be signalled.
    pub fn pause(&self) -> Result<()> {
        self.transition(Status::Running, Status::Paused, Signal::SIGSTOP, "pause")
    }

    /// Thaws a paused container.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::InvalidState`] unless the container is
    /// `Paused`, or an I/O error if the group cannot be signalled.
    pub fn resume(&self) -> Result<()> {
        self.transition(Status::Paused, Status::Running, Signal::SIGCONT, "resume")
    }

    fn transition(&self, from: Status, to: Status, signal: Signal, operation: &'static str) -> Result<()> {
        let mut lifecycle = self.lifecycle();
        lifecycle.refresh(&self.inner.id);
        if lifecycle.status != from {
            return Err(self.invalid_state(lifecycle.status, operation));
        }
        let shim = lifecycle.shim.as_ref().ok_or_else(|| {
            CorralError::not_supported(format!(
                "{operation} of container {} whose shim is not attached",
                self.inner.id
            ))
        })?;
        shim.signal_group(signal)?;
        lifecycle.status = to;
        tracing::info!(id = %self.inner.id, %from, %to, "container {operation}d");
        Ok(())
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> State {
        let mut lifecycle = self.lifecycle();
        lifecycle.refresh(&self.inner.id);
        State {
            id: self.inner.id.clone(),
            status: lifecycle.status,
            bundle: self.inner.bundle.clone(),
            shim_pid: lifecycle.shim_pid(),
        }
    }

    /// Tears the container down from any state.
    ///
    /// Kills and reaps an attached monitor, or kills the group of a monitor
    /// recorded by an earlier supervisor process, then removes `<root>/<id>`.
    /// Deleting an already deleted container, or one whose directory is
    /// missing, succeeds.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the state directory cannot be removed.
    pub fn delete(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle();
        if lifecycle.status == Status::Deleted {
            return Ok(());
        }
        if let Some(shim) = lifecycle.shim.take() {
            if let Err(e) = shim.terminate() {
                tracing::warn!(id = %self.inner.id, error = %e, "failed to terminate shim");
            }
        }
        if let Some(detached) = lifecycle.detached.take() {
            if let Err(e) = detached.terminate() {
                tracing::warn!(id = %self.inner.id, error = %e, "failed to kill detached shim group");
            }
        }

        let dir = self.state_dir();
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %dir.display(), "state directory already absent");
            }
            Err(e) => return Err(CorralError::io(dir, e)),
        }

        lifecycle.processes.clear();
        lifecycle.status = Status::Deleted;
        tracing::info!(id = %self.inner.id, "container deleted");
        Ok(())
    }

    /// Registered processes, ordered by name.
    #[must_use]
    pub fn processes(&self) -> Vec<Process> {
        self.lifecycle().processes.values().cloned().collect()
    }

    /// Whether both handles refer to the same container instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn signal_shim(&self, signal: Signal) -> Result<()> {
        let lifecycle = self.lifecycle();
        let shim = lifecycle.shim.as_ref().ok_or_else(|| {
            CorralError::not_supported(format!(
                "signal to container {} whose shim is not attached",
                self.inner.id
            ))
        })?;
        shim.signal_group(signal)
    }

    fn invalid_state(&self, status: Status, operation: &'static str) -> CorralError {
        CorralError::InvalidState {
            id: self.inner.id.to_string(),
            status,
            operation,
        }
    }
}

/// Loads every container under `root`, ordered by id.
///
/// Entries that are not valid container directories are skipped with a
/// warning. A missing root yields no containers.
///
/// # Errors
///
/// Returns an I/O error if `root` exists but cannot be listed.
pub fn load_all(root: &Path, launcher: &Arc<dyn ShimLauncher>) -> Result<Vec<Container>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CorralError::io(root, e)),
    };

    let mut containers = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CorralError::io(root, e))?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let loaded = ContainerId::parse(name.clone())
            .and_then(|id| Container::load_with_launcher(root, id, Arc::clone(launcher)));
        match loaded {
            Ok(container) => containers.push(container),
            Err(e) => tracing::warn!(entry = %name, error = %e, "skipping container directory"),
        }
    }
    containers.sort_by(|a, b| a.id().cmp(b.id()));
    Ok(containers)
}
