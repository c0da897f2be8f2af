//! `corral state` — Show a container's state.

use clap::Args;
use corral_supervisor::Supervisor;

use crate::output;

/// Arguments for the `state` command.
#[derive(Args, Debug)]
pub struct StateArgs {
    /// Container to inspect.
    pub id: String,
}

/// Executes the `state` command.
///
/// # Errors
///
/// Returns an error if the container is unknown.
pub fn execute(supervisor: &Supervisor, args: &StateArgs) -> anyhow::Result<()> {
    let id = super::parse_id(&args.id)?;
    let state = supervisor.get(&id)?.state();
    output::print_line(&serde_json::to_string_pretty(&state)?);
    Ok(())
}
