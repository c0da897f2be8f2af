//! `corral list` — List containers under the state root.

use corral_supervisor::Supervisor;

use crate::output;

/// Executes the `list` command.
///
/// # Errors
///
/// Never fails once the supervisor is up; the signature matches the other
/// commands.
#[allow(clippy::unnecessary_wraps)]
pub fn execute(supervisor: &Supervisor) -> anyhow::Result<()> {
    let states: Vec<_> = supervisor.list().iter().map(corral_runtime::Container::state).collect();
    output::print_table(&states);
    Ok(())
}
