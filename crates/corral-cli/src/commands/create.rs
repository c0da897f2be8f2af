//! `corral create` — Create a container from a bundle.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use corral_common::types::ContainerId;
use corral_supervisor::Supervisor;

use crate::output;

/// Arguments for the `create` command.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Container id; a random one is generated when omitted.
    #[arg(long)]
    pub id: Option<String>,

    /// Bundle directory holding `config.json`.
    #[arg(long)]
    pub bundle: PathBuf,
}

/// Executes the `create` command.
///
/// # Errors
///
/// Returns an error if the id is invalid or the container cannot be created.
pub fn execute(supervisor: &Supervisor, args: &CreateArgs) -> anyhow::Result<()> {
    let id = create(supervisor, args.id.as_deref(), &args.bundle)?;
    output::print_line(id.as_str());
    Ok(())
}

/// Creates a container, generating an id when none is given.
///
/// # Errors
///
/// Returns an error if the id is invalid or the container cannot be created.
pub fn create(
    supervisor: &Supervisor,
    id: Option<&str>,
    bundle: &std::path::Path,
) -> anyhow::Result<ContainerId> {
    let id = match id {
        Some(raw) => super::parse_id(raw)?,
        None => ContainerId::generate(),
    };
    let bundle = std::path::absolute(bundle)
        .with_context(|| format!("cannot resolve bundle path {}", bundle.display()))?;
    let container = supervisor
        .create(id, bundle)
        .context("failed to create container")?;
    Ok(container.id().clone())
}
