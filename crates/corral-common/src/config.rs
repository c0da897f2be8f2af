//! Supervisor configuration model.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CorralError, Result};

/// Root configuration for a supervisor instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Directory holding one state directory per container.
    pub root: PathBuf,
    /// Monitor binary launched for every started container.
    pub shim_binary: PathBuf,
    /// Number of workers draining the start queue.
    pub workers: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(crate::constants::DEFAULT_ROOT),
            shim_binary: PathBuf::from(crate::constants::DEFAULT_SHIM_BINARY),
            workers: crate::constants::DEFAULT_WORKERS,
        }
    }
}

impl SupervisorConfig {
    /// Loads a configuration from a JSON file. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a configuration
    /// error if it is not valid JSON or fails [`Self::validate`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| CorralError::io(path, e))?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| CorralError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate().map_err(|message| CorralError::Config {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(config)
    }

    /// Checks invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be at least 1".into());
        }
        if self.root.as_os_str().is_empty() {
            return Err("root must not be empty".into());
        }
        Ok(())
    }
}
