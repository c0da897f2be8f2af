//! `corral start` — Start a created container.

use anyhow::Context;
use clap::Args;
use corral_common::types::ContainerId;
use corral_runtime::Stdio;
use corral_supervisor::Supervisor;

use super::StdioArgs;
use crate::output;

/// Arguments for the `start` command.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Container to start.
    pub id: String,

    /// Stream locations for the init process.
    #[command(flatten)]
    pub stdio: StdioArgs,
}

/// Executes the `start` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or fails to start.
pub fn execute(supervisor: &Supervisor, args: StartArgs) -> anyhow::Result<()> {
    let id = super::parse_id(&args.id)?;
    start(supervisor, &id, args.stdio.into())
}

/// Starts a container through the worker pool and prints its stream names.
///
/// A failed start is reconciled before returning, which removes the
/// container's state.
///
/// # Errors
///
/// Returns the start failure.
pub fn start(supervisor: &Supervisor, id: &ContainerId, stdio: Stdio) -> anyhow::Result<()> {
    let outcome = supervisor.start(id, stdio)?.wait();
    match outcome {
        Ok(response) => {
            output::print_streams(id, &response);
            Ok(())
        }
        Err(e) => {
            let reconciled = supervisor
                .reconcile_pending()
                .context("failed to clean up after start failure")?;
            tracing::info!(%id, reconciled, "cleaned up after failed start");
            Err(e).with_context(|| format!("failed to start container {id}"))
        }
    }
}
