//! Bundle configuration decoding.
//!
//! Only the fields the supervisor needs are decoded; everything else in the
//! document (mounts, namespaces, cgroups) belongs to the monitor and is
//! ignored here. No semantic validation is done beyond structure.

use std::path::Path;

use corral_common::constants::BUNDLE_CONFIG_FILE;
use corral_common::error::{CorralError, Result};
use serde::{Deserialize, Serialize};

/// The subset of a bundle's `config.json` the supervisor reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleSpec {
    /// Spec version declared by the document.
    #[serde(default)]
    pub oci_version: String,
    /// Init process definition.
    pub process: ProcessSpec,
    /// Root filesystem reference.
    #[serde(default)]
    pub root: Option<RootSpec>,
    /// Container hostname.
    #[serde(default)]
    pub hostname: Option<String>,
}

/// How to run a container process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    /// Whether a terminal is attached.
    #[serde(default)]
    pub terminal: bool,
    /// Executable followed by its arguments.
    pub args: Vec<String>,
    /// `KEY=value` environment entries.
    #[serde(default)]
    pub env: Vec<String>,
    /// Working directory inside the container.
    #[serde(default = "default_cwd")]
    pub cwd: String,
}

impl Default for ProcessSpec {
    fn default() -> Self {
        Self {
            terminal: false,
            args: Vec::new(),
            env: Vec::new(),
            cwd: default_cwd(),
        }
    }
}

impl ProcessSpec {
    /// Returns the executable, if any arguments are present.
    #[must_use]
    pub fn executable(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Root filesystem reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootSpec {
    /// Path to the root filesystem, relative to the bundle or absolute.
    pub path: String,
    /// Whether the root filesystem is mounted read-only.
    #[serde(default)]
    pub readonly: bool,
}

fn default_cwd() -> String {
    "/".to_owned()
}

/// Reads and decodes `<bundle>/config.json`.
///
/// # Errors
///
/// Returns [`CorralError::Config`] if the document is missing, unreadable,
/// or structurally invalid.
pub fn read_spec(bundle: &Path) -> Result<BundleSpec> {
    let path = bundle.join(BUNDLE_CONFIG_FILE);
    let raw = std::fs::read(&path).map_err(|e| CorralError::Config {
        path: path.clone(),
        message: e.to_string(),
    })?;
    serde_json::from_slice(&raw).map_err(|e| CorralError::Config {
        path,
        message: e.to_string(),
    })
}
