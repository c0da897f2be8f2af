//! Monitor ("shim") process launching.
//!
//! Every started container gets one detached monitor process. The monitor
//! runs in its own process group with the bundle as its working directory,
//! so signals aimed at the supervisor never reach the container and relative
//! paths in the bundle configuration resolve correctly.

use std::fmt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use corral_common::error::{CorralError, Result};
use corral_common::types::ContainerId;
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;

/// Everything a launcher needs to start a monitor for one container.
#[derive(Debug, Clone, Copy)]
pub struct ShimRequest<'a> {
    /// Container the monitor supervises.
    pub id: &'a ContainerId,
    /// Process-state directory handed to the monitor. Must already exist.
    pub process_dir: &'a Path,
    /// Bundle used as the monitor's working directory.
    pub bundle: &'a Path,
}

/// Starts monitor processes.
///
/// Launch failures are terminal for the start that requested them; no
/// retries happen at this layer.
pub trait ShimLauncher: Send + Sync + fmt::Debug {
    /// Spawns a monitor for the given container.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::Spawn`] if the process cannot be started.
    fn launch(&self, request: &ShimRequest<'_>) -> Result<ShimHandle>;
}

/// Launches an external monitor binary as `<binary> <process-dir> <id>`.
#[derive(Debug, Clone)]
pub struct ExecShimLauncher {
    binary: PathBuf,
}

impl ExecShimLauncher {
    /// Creates a launcher for the given monitor binary.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Returns the monitor binary this launcher runs.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl Default for ExecShimLauncher {
    fn default() -> Self {
        Self::new(corral_common::constants::DEFAULT_SHIM_BINARY)
    }
}

impl ShimLauncher for ExecShimLauncher {
    fn launch(&self, request: &ShimRequest<'_>) -> Result<ShimHandle> {
        let child = Command::new(&self.binary)
            .arg(request.process_dir)
            .arg(request.id.as_str())
            .current_dir(request.bundle)
            .process_group(0)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CorralError::Spawn {
                binary: self.binary.clone(),
                source: e,
            })?;
        tracing::info!(
            id = %request.id,
            pid = child.id(),
            binary = %self.binary.display(),
            "shim launched"
        );
        Ok(ShimHandle::from_child(child))
    }
}

/// A launched monitor process that leads its own process group.
#[derive(Debug)]
pub struct ShimHandle {
    child: Child,
}

impl ShimHandle {
    /// Wraps a child that was spawned as the leader of a new process group.
    #[must_use]
    pub const fn from_child(child: Child) -> Self {
        Self { child }
    }

    /// Returns the monitor's PID, which is also its process group ID.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    #[allow(clippy::cast_possible_wrap)]
    fn pgid(&self) -> Pid {
        Pid::from_raw(self.child.id() as i32)
    }

    /// Sends a signal to the monitor's whole process group.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the signal cannot be delivered.
    pub fn signal_group(&self, signal: Signal) -> Result<()> {
        killpg(self.pgid(), signal).map_err(|errno| {
            CorralError::io(format!("pgid {}", self.pgid()), std::io::Error::from(errno))
        })?;
        tracing::debug!(pgid = %self.pgid(), ?signal, "signalled shim process group");
        Ok(())
    }

    /// Kills the monitor's process group and reaps the monitor.
    ///
    /// A group that has already exited is not an error.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the group cannot be signalled or the monitor
    /// cannot be reaped.
    pub fn terminate(mut self) -> Result<()> {
        let pgid = self.pgid();
        kill_group(pgid)?;
        let status = self
            .child
            .wait()
            .map_err(|e| CorralError::io(format!("pid {pgid}"), e))?;
        tracing::info!(pid = %pgid, %status, "shim terminated");
        Ok(())
    }
}

/// A monitor launched by an earlier supervisor process, known only by the
/// PID recorded at launch.
///
/// It cannot be reaped from here; its process group can only be killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetachedShim {
    pid: u32,
}

impl DetachedShim {
    /// Wraps a recorded monitor PID.
    ///
    /// Returns `None` for values that cannot name a monitor's own process
    /// group (0, 1, or beyond the PID range), since signalling those would
    /// reach unrelated processes.
    #[must_use]
    pub fn from_pid(pid: u32) -> Option<Self> {
        i32::try_from(pid)
            .is_ok_and(|raw| raw > 1)
            .then_some(Self { pid })
    }

    /// The recorded monitor PID.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    #[allow(clippy::cast_possible_wrap)]
    fn pgid(self) -> Pid {
        Pid::from_raw(self.pid as i32)
    }

    /// Kills the monitor's process group.
    ///
    /// A group that has already exited is not an error.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the group cannot be signalled.
    pub fn terminate(self) -> Result<()> {
        kill_group(self.pgid())?;
        tracing::info!(pgid = self.pid, "detached shim group killed");
        Ok(())
    }
}

fn kill_group(pgid: Pid) -> Result<()> {
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(CorralError::io(
            format!("pgid {pgid}"),
            std::io::Error::from(errno),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(id: &'a ContainerId, dir: &'a Path) -> ShimRequest<'a> {
        ShimRequest {
            id,
            process_dir: dir,
            bundle: dir,
        }
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let id = ContainerId::parse("c1").unwrap();
        let launcher = ExecShimLauncher::new("/nonexistent/corral-shim");

        let err = launcher.launch(&request(&id, dir.path())).unwrap_err();
        assert!(matches!(err, CorralError::Spawn { .. }));
    }

    #[test]
    fn launched_shim_can_be_terminated() {
        let dir = tempfile::tempdir().unwrap();
        let id = ContainerId::parse("c2").unwrap();
        let launcher = ExecShimLauncher::new("true");

        let handle = launcher.launch(&request(&id, dir.path())).unwrap();
        assert!(handle.pid() > 0);
        handle.terminate().unwrap();
    }

    #[test]
    fn default_launcher_uses_default_binary() {
        let launcher = ExecShimLauncher::default();
        assert_eq!(
            launcher.binary(),
            Path::new(corral_common::constants::DEFAULT_SHIM_BINARY)
        );
    }

    #[test]
    fn detached_shim_rejects_unsafe_pids() {
        assert_eq!(DetachedShim::from_pid(0), None);
        assert_eq!(DetachedShim::from_pid(1), None);
        assert_eq!(DetachedShim::from_pid(u32::MAX), None);
        assert_eq!(DetachedShim::from_pid(4242).map(|d| d.pid()), Some(4242));
    }

    #[test]
    fn detached_shim_group_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let mut child = Command::new("sleep")
            .arg("30")
            .current_dir(dir.path())
            .process_group(0)
            .spawn()
            .unwrap();

        let detached = DetachedShim::from_pid(child.id()).unwrap();
        detached.terminate().unwrap();

        let status = child.wait().unwrap();
        assert_eq!(std::os::unix::process::ExitStatusExt::signal(&status), Some(9));
    }
}
