//! Unified error type for the corral workspace.
//!
//! Every fallible operation in the runtime and supervisor crates returns
//! [`CorralError`]. Lower-level failures are wrapped with the path or binary
//! they concern and are never retried here.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Status;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum CorralError {
    /// An I/O operation on supervisor-owned state failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration document is missing or malformed.
    #[error("invalid configuration at {path}: {message}")]
    Config {
        /// Document that failed to load.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// The monitor process could not be launched.
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        /// Binary that failed to start.
        binary: PathBuf,
        /// Underlying spawn error.
        source: std::io::Error,
    },

    /// The operation is recognised but not available.
    #[error("operation not supported: {operation}")]
    NotSupported {
        /// Name of the unsupported operation.
        operation: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A lifecycle operation was requested from a state that does not allow it.
    #[error("cannot {operation} container {id} in state {status}")]
    InvalidState {
        /// Container the operation targeted.
        id: String,
        /// Status at the time of the request.
        status: Status,
        /// Rejected operation.
        operation: &'static str,
    },

    /// A container identifier cannot be used as a directory name.
    #[error("invalid container id {id:?}: {reason}")]
    InvalidId {
        /// Rejected identifier.
        id: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A task's deadline passed before a worker picked it up.
    #[error("start of container {id} not attempted: deadline exceeded")]
    DeadlineExceeded {
        /// Container whose task expired.
        id: String,
    },

    /// A worker panicked while processing a task.
    #[error("worker panicked while starting container {id}: {message}")]
    WorkerPanicked {
        /// Container whose task was being processed.
        id: String,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// The task queue is closed or a task was dropped unresolved.
    #[error("task queue closed")]
    QueueClosed,

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl CorralError {
    /// Shorthand for wrapping an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Shorthand for a [`CorralError::NotSupported`] error.
    pub fn not_supported(operation: impl Into<String>) -> Self {
        Self::NotSupported {
            operation: operation.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CorralError>;
