//! `corral delete` — Tear a container down.

use clap::Args;
use corral_supervisor::Supervisor;

/// Arguments for the `delete` command.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Container to delete.
    pub id: String,
}

/// Executes the `delete` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or cannot be removed.
pub fn execute(supervisor: &Supervisor, args: &DeleteArgs) -> anyhow::Result<()> {
    let id = super::parse_id(&args.id)?;
    supervisor.delete(&id)?;
    tracing::info!(%id, "deleted");
    Ok(())
}
