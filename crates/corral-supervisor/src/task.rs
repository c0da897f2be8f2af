//! Start tasks and their results.
//!
//! A [`StartTask`] is consumed by exactly one worker and resolved exactly
//! once: the submitter's [`StartHandle`] yields either the error that made
//! the start fail or a [`StartResponse`] naming the init process's streams.
//! Combining both outcomes in one `Result` means a caller can never observe
//! a response without the start having succeeded.

use std::time::{Duration, Instant};

use corral_common::error::{CorralError, Result};
use corral_common::types::ContainerId;
use corral_runtime::{Container, Process, Stdio};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

/// How a task brings its container up.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StartMode {
    /// Launch the container's init process from its bundle.
    #[default]
    Fresh,
    /// Restore the container from a checkpoint.
    Restore {
        /// Checkpoint identifier.
        checkpoint: String,
    },
}

/// Stream names of a successfully started init process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartResponse {
    /// Standard input name.
    pub stdin: String,
    /// Standard output name.
    pub stdout: String,
    /// Standard error name.
    pub stderr: String,
}

impl StartResponse {
    /// Collects the stream names of `process`.
    #[must_use]
    pub fn from_process(process: &Process) -> Self {
        Self {
            stdin: process.stdin().name().to_owned(),
            stdout: process.stdout().name().to_owned(),
            stderr: process.stderr().name().to_owned(),
        }
    }
}

/// A request to start one container.
#[derive(Debug)]
pub struct StartTask {
    pub(crate) container: Container,
    pub(crate) mode: StartMode,
    pub(crate) stdio: Stdio,
    pub(crate) deadline: Option<Instant>,
    pub(crate) reply: Sender<Result<StartResponse>>,
}

impl StartTask {
    /// Creates a fresh-start task and the handle that observes its result.
    #[must_use]
    pub fn new(container: Container) -> (Self, StartHandle) {
        Self::with_mode(container, StartMode::Fresh)
    }

    /// Creates a restore task for the given checkpoint.
    #[must_use]
    pub fn restore(container: Container, checkpoint: impl Into<String>) -> (Self, StartHandle) {
        Self::with_mode(
            container,
            StartMode::Restore {
                checkpoint: checkpoint.into(),
            },
        )
    }

    fn with_mode(container: Container, mode: StartMode) -> (Self, StartHandle) {
        let (reply, result) = crossbeam_channel::bounded(1);
        let handle = StartHandle {
            id: container.id().clone(),
            result,
        };
        let task = Self {
            container,
            mode,
            stdio: Stdio::default(),
            deadline: None,
            reply,
        };
        (task, handle)
    }

    /// Requests specific stream locations for the init process.
    #[must_use]
    pub fn with_stdio(mut self, stdio: Stdio) -> Self {
        self.stdio = stdio;
        self
    }

    /// Gives up on the task if no worker picks it up before `deadline`.
    ///
    /// The deadline only bounds time spent queued; a start already in
    /// progress is never interrupted.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Target container.
    #[must_use]
    pub const fn container(&self) -> &Container {
        &self.container
    }

    /// Requested start mode.
    #[must_use]
    pub const fn mode(&self) -> &StartMode {
        &self.mode
    }
}

/// Observes the single result of a [`StartTask`].
#[derive(Debug)]
pub struct StartHandle {
    id: ContainerId,
    result: Receiver<Result<StartResponse>>,
}

impl StartHandle {
    /// Container the task targets.
    #[must_use]
    pub const fn id(&self) -> &ContainerId {
        &self.id
    }

    /// Blocks until the task is resolved.
    ///
    /// # Errors
    ///
    /// Returns the start failure, or [`CorralError::QueueClosed`] if the
    /// task was dropped without being processed.
    pub fn wait(self) -> Result<StartResponse> {
        self.result.recv().map_err(|_| CorralError::QueueClosed)?
    }

    /// Waits up to `timeout`; `None` means the task is still pending.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<StartResponse>> {
        match self.result.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(CorralError::QueueClosed)),
        }
    }
}
