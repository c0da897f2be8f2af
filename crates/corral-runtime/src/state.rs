//! Persistent per-container state.
//!
//! Each container directory holds exactly one `state.json` recording the
//! bundle path the container was created from. The document is written once
//! at creation and read back whenever a container is reconstructed.
//!
//! A start additionally leaves two records in the process-state directory:
//! the monitor's PID, written as soon as it is launched, and a `started`
//! marker written only once the init process is registered.

use std::io::Write;
use std::path::{Path, PathBuf};

use corral_common::constants::{SHIM_PID_FILE, STARTED_FILE, STATE_FILE};
use corral_common::error::{CorralError, Result};
use serde::{Deserialize, Serialize};

/// Durable record of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Bundle the container was created from.
    pub bundle: PathBuf,
}

/// Returns the state document path inside a container directory.
#[must_use]
pub fn state_path(container_dir: &Path) -> PathBuf {
    container_dir.join(STATE_FILE)
}

/// Loads the state document of the container rooted at `container_dir`.
///
/// # Errors
///
/// Returns [`CorralError::NotFound`] if no state document exists, an I/O
/// error if it cannot be read, or a serialization error if it is malformed.
pub fn load_state(container_dir: &Path, id: &str) -> Result<PersistedState> {
    let path = state_path(container_dir);
    tracing::debug!(path = %path.display(), "loading container state");
    let raw = match std::fs::read(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CorralError::NotFound {
                kind: "container",
                id: id.to_owned(),
            });
        }
        Err(e) => return Err(CorralError::io(path, e)),
    };
    Ok(serde_json::from_slice(&raw)?)
}

/// Persists the state document atomically.
///
/// The document is written to a sibling temporary file, synced, and renamed
/// over `state.json`, so readers never observe a partial document.
///
/// # Errors
///
/// Returns an error if the file cannot be written or renamed.
pub fn save_state(container_dir: &Path, state: &PersistedState) -> Result<()> {
    tracing::debug!(path = %state_path(container_dir).display(), "saving container state");
    let mut body = serde_json::to_vec(state)?;
    body.push(b'\n');
    write_atomic(container_dir, STATE_FILE, &body)
}

/// Records the PID of the monitor serving the process-state directory.
///
/// # Errors
///
/// Returns an I/O error if the record cannot be written.
pub fn save_shim_pid(process_dir: &Path, pid: u32) -> Result<()> {
    write_atomic(process_dir, SHIM_PID_FILE, format!("{pid}\n").as_bytes())
}

/// Reads the recorded monitor PID, if any.
///
/// # Errors
///
/// Returns an I/O error if the record exists but cannot be read, or a
/// configuration error if it does not hold a PID.
pub fn load_shim_pid(process_dir: &Path) -> Result<Option<u32>> {
    let path = process_dir.join(SHIM_PID_FILE);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CorralError::io(path, e)),
    };
    raw.trim()
        .parse::<u32>()
        .map(Some)
        .map_err(|e| CorralError::Config {
            path,
            message: format!("invalid shim pid: {e}"),
        })
}

/// Marks the process-state directory as belonging to a completed start.
///
/// # Errors
///
/// Returns an I/O error if the marker cannot be written.
pub fn mark_started(process_dir: &Path) -> Result<()> {
    write_atomic(process_dir, STARTED_FILE, b"")
}

/// Whether a start completed for this process-state directory.
#[must_use]
pub fn is_started(process_dir: &Path) -> bool {
    process_dir.join(STARTED_FILE).is_file()
}

/// Writes `body` to `dir/name` through a synced sibling temporary file, so
/// readers never observe a partial document.
fn write_atomic(dir: &Path, name: &str, body: &[u8]) -> Result<()> {
    let path = dir.join(name);
    let tmp = dir.join(format!("{name}.tmp"));

    let mut file = std::fs::File::create(&tmp).map_err(|e| CorralError::io(&tmp, e))?;
    file.write_all(body).map_err(|e| CorralError::io(&tmp, e))?;
    file.sync_all().map_err(|e| CorralError::io(&tmp, e))?;
    drop(file);

    std::fs::rename(&tmp, &path).map_err(|e| CorralError::io(&path, e))
}
