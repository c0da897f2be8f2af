//! Processes belonging to a container.
//!
//! A [`Process`] is created by its container when the container starts. It
//! names the process's standard streams and watches the process-state
//! directory for the artifacts the monitor writes when the process exits.

use std::path::{Path, PathBuf};
use std::sync::Weak;
use std::time::{Duration, Instant};

use corral_common::constants::{EXIT_FILE, EXIT_STATUS_FILE, STDERR_FILE, STDIN_FILE, STDOUT_FILE};
use corral_common::error::{CorralError, Result};
use nix::sys::signal::Signal;

use crate::container::{Container, Inner};
use crate::spec::ProcessSpec;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Caller-requested stream locations. Unset streams fall back to files in
/// the process-state directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stdio {
    /// Where the process reads input from.
    pub stdin: Option<PathBuf>,
    /// Where the process writes output to.
    pub stdout: Option<PathBuf>,
    /// Where the process writes errors to.
    pub stderr: Option<PathBuf>,
}

/// A named handle to one standard stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    path: PathBuf,
    name: String,
}

impl Stream {
    fn new(path: PathBuf) -> Self {
        let name = path.to_string_lossy().into_owned();
        Self { path, name }
    }

    /// Name a control plane uses to attach to the stream.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filesystem location of the stream.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One OS process of a container.
#[derive(Debug, Clone)]
pub struct Process {
    name: String,
    state_dir: PathBuf,
    spec: ProcessSpec,
    stdin: Stream,
    stdout: Stream,
    stderr: Stream,
    container: Weak<Inner>,
}

impl Process {
    pub(crate) fn new(
        name: &str,
        state_dir: &Path,
        spec: ProcessSpec,
        stdio: &Stdio,
        container: Weak<Inner>,
    ) -> Self {
        let stream = |requested: &Option<PathBuf>, default: &str| {
            Stream::new(
                requested
                    .clone()
                    .unwrap_or_else(|| state_dir.join(default)),
            )
        };
        Self {
            name: name.to_owned(),
            state_dir: state_dir.to_path_buf(),
            stdin: stream(&stdio.stdin, STDIN_FILE),
            stdout: stream(&stdio.stdout, STDOUT_FILE),
            stderr: stream(&stdio.stderr, STDERR_FILE),
            spec,
            container,
        }
    }

    /// Process name, unique within its container.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory where the monitor records this process's state.
    #[must_use]
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Process definition taken from the bundle configuration.
    #[must_use]
    pub const fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    /// Standard input handle.
    #[must_use]
    pub const fn stdin(&self) -> &Stream {
        &self.stdin
    }

    /// Standard output handle.
    #[must_use]
    pub const fn stdout(&self) -> &Stream {
        &self.stdout
    }

    /// Standard error handle.
    #[must_use]
    pub const fn stderr(&self) -> &Stream {
        &self.stderr
    }

    /// Owning container, if it is still alive in this supervisor.
    #[must_use]
    pub fn container(&self) -> Option<Container> {
        self.container.upgrade().map(Container::from_inner)
    }

    /// Whether the monitor has written the exit marker.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.state_dir.join(EXIT_FILE).exists()
    }

    /// Reads the recorded exit code without blocking.
    ///
    /// Returns `None` while the exit-status file is absent or still empty.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read or does not hold an
    /// integer.
    pub fn exit_status(&self) -> Result<Option<i32>> {
        let path = self.state_dir.join(EXIT_STATUS_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CorralError::io(path, e)),
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse().map(Some).map_err(|e| {
            CorralError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, format!("exit status: {e}")),
            )
        })
    }

    /// Blocks until the exit code is recorded and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the exit-status file cannot be read or parsed.
    pub fn wait(&self) -> Result<i32> {
        loop {
            if let Some(code) = self.exit_status()? {
                return Ok(code);
            }
            std::thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    /// Like [`Self::wait`], giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the exit-status file cannot be read or parsed.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Option<i32>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(code) = self.exit_status()? {
                return Ok(Some(code));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            std::thread::sleep(EXIT_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Delivers a signal through the container's monitor process group.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::NotFound`] if the container is gone,
    /// [`CorralError::NotSupported`] if its monitor is not attached to this
    /// supervisor, or an I/O error if delivery fails.
    pub fn signal(&self, signal: Signal) -> Result<()> {
        let container = self.container().ok_or_else(|| CorralError::NotFound {
            kind: "container",
            id: format!("owner of process {}", self.name),
        })?;
        container.signal_shim(signal)
    }
}
