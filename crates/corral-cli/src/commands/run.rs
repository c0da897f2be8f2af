//! `corral run` — Create and start a container.

use std::path::PathBuf;

use clap::Args;
use corral_supervisor::Supervisor;

use super::StdioArgs;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Container id; a random one is generated when omitted.
    #[arg(long)]
    pub id: Option<String>,

    /// Bundle directory holding `config.json`.
    #[arg(long)]
    pub bundle: PathBuf,

    /// Stream locations for the init process.
    #[command(flatten)]
    pub stdio: StdioArgs,
}

/// Executes the `run` command.
///
/// # Errors
///
/// Returns an error if creation or start fails.
pub fn execute(supervisor: &Supervisor, args: RunArgs) -> anyhow::Result<()> {
    let id = super::create::create(supervisor, args.id.as_deref(), &args.bundle)?;
    super::start::start(supervisor, &id, args.stdio.into())
}
