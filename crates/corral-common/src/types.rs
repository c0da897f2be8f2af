//! Domain primitive types used across the corral workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CorralError, Result};

/// Unique identifier for a container.
///
/// The identifier doubles as the container's directory name under the
/// supervisor root, so it must be a single, non-special path component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Validates and wraps a caller-supplied identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::InvalidId`] if the id is empty, `.` or `..`,
    /// or contains a path separator or NUL byte.
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let reason = if id.is_empty() {
            Some("must not be empty")
        } else if id == "." || id == ".." {
            Some("must not be a relative path component")
        } else if id.contains(['/', '\\']) {
            Some("must not contain a path separator")
        } else if id.contains('\0') {
            Some("must not contain NUL")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(CorralError::InvalidId { id, reason }),
            None => Ok(Self(id)),
        }
    }

    /// Generates a random container ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a container.
///
/// ```text
/// Created -> Running -> { Paused <-> Running } -> Stopped -> Deleted
/// ```
///
/// `Deleted` is reachable from every other status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// State directory exists, no monitor launched yet.
    Created,
    /// The monitor was launched and the init process is registered.
    Running,
    /// The monitor's process group is frozen.
    Paused,
    /// The init process has exited.
    Stopped,
    /// The state directory has been removed.
    Deleted,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Deleted => "deleted",
        };
        f.write_str(s)
    }
}
