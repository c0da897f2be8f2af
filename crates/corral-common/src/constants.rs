//! On-disk names and system-wide defaults.
//!
//! The file and directory names here form the layout that collaborating
//! reconciliation tooling reads, so they must not change:
//!
//! ```text
//! <root>/<container-id>/state.json        {"bundle": "<path>"}
//! <root>/<container-id>/proc/             created at start
//! <root>/<container-id>/proc/shim.pid     monitor PID, once launched
//! <root>/<container-id>/proc/started      written once the init process is registered
//! <root>/<container-id>/proc/exit         written when the init process exits
//! <root>/<container-id>/proc/exitStatus   exit code of the init process
//! ```

/// Default supervisor state root.
pub const DEFAULT_ROOT: &str = "/run/corral";

/// Default monitor binary launched once per container.
pub const DEFAULT_SHIM_BINARY: &str = "corral-shim";

/// Default number of start workers.
pub const DEFAULT_WORKERS: usize = 10;

/// Name of the persisted state document inside a container directory.
pub const STATE_FILE: &str = "state.json";

/// Name of the process-state directory inside a container directory.
pub const PROC_DIR: &str = "proc";

/// Monitor PID record inside the process-state directory.
pub const SHIM_PID_FILE: &str = "shim.pid";

/// Marker for a completed start inside the process-state directory.
pub const STARTED_FILE: &str = "started";

/// Marker written into the process-state directory when the process exits.
pub const EXIT_FILE: &str = "exit";

/// File holding the exit code of the process.
pub const EXIT_STATUS_FILE: &str = "exitStatus";

/// Reserved process name for the first process of a container.
pub const INIT_PROCESS_ID: &str = "init";

/// Configuration document inside a bundle.
pub const BUNDLE_CONFIG_FILE: &str = "config.json";

/// Default stream file names inside the process-state directory.
pub const STDIN_FILE: &str = "stdin";
/// See [`STDIN_FILE`].
pub const STDOUT_FILE: &str = "stdout";
/// See [`STDIN_FILE`].
pub const STDERR_FILE: &str = "stderr";

/// Application name used in CLI output.
pub const APP_NAME: &str = "corral";
