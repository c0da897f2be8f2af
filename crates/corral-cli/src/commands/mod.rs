//! CLI command definitions and dispatch.

pub mod create;
pub mod delete;
pub mod list;
pub mod run;
pub mod start;
pub mod state;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use corral_common::config::SupervisorConfig;
use corral_common::types::ContainerId;
use corral_runtime::Stdio;
use corral_supervisor::Supervisor;

/// corral — container supervisor.
#[derive(Parser, Debug)]
#[command(name = "corral", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// JSON configuration file; flags override its values.
    #[arg(long, global = true, env = "CORRAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// State root holding one directory per container.
    #[arg(long, global = true, env = "CORRAL_ROOT")]
    pub root: Option<PathBuf>,

    /// Monitor binary launched for each started container.
    #[arg(long, global = true, env = "CORRAL_SHIM")]
    pub shim: Option<PathBuf>,

    /// Number of start workers.
    #[arg(long, global = true, env = "CORRAL_WORKERS")]
    pub workers: Option<usize>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a container from a bundle without starting it.
    Create(create::CreateArgs),
    /// Start a created container.
    Start(start::StartArgs),
    /// Create and start a container in one step.
    Run(run::RunArgs),
    /// Show a container's state as JSON.
    State(state::StateArgs),
    /// Tear a container down and remove its state.
    Delete(delete::DeleteArgs),
    /// List containers under the state root.
    List,
}

/// Stream locations shared by `start` and `run`.
#[derive(Args, Debug, Default)]
pub struct StdioArgs {
    /// Path the init process reads input from.
    #[arg(long)]
    pub stdin: Option<PathBuf>,
    /// Path the init process writes output to.
    #[arg(long)]
    pub stdout: Option<PathBuf>,
    /// Path the init process writes errors to.
    #[arg(long)]
    pub stderr: Option<PathBuf>,
}

impl From<StdioArgs> for Stdio {
    fn from(args: StdioArgs) -> Self {
        Self {
            stdin: args.stdin,
            stdout: args.stdout,
            stderr: args.stderr,
        }
    }
}

impl Cli {
    /// Resolves the effective configuration: file first, then flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded or the
    /// result is invalid.
    pub fn supervisor_config(&self) -> anyhow::Result<SupervisorConfig> {
        let mut config = match &self.config {
            Some(path) => SupervisorConfig::from_file(path)?,
            None => SupervisorConfig::default(),
        };
        if let Some(root) = &self.root {
            config.root.clone_from(root);
        }
        if let Some(shim) = &self.shim {
            config.shim_binary.clone_from(shim);
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }
}

/// Parses a container id argument.
///
/// # Errors
///
/// Returns an error if the id cannot name a container directory.
pub fn parse_id(raw: &str) -> anyhow::Result<ContainerId> {
    ContainerId::parse(raw).with_context(|| format!("invalid container id {raw:?}"))
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.supervisor_config()?;
    let supervisor = Supervisor::new(config).context("failed to start supervisor")?;
    let result = match cli.command {
        Command::Create(args) => create::execute(&supervisor, &args),
        Command::Start(args) => start::execute(&supervisor, args),
        Command::Run(args) => run::execute(&supervisor, args),
        Command::State(args) => state::execute(&supervisor, &args),
        Command::Delete(args) => delete::execute(&supervisor, &args),
        Command::List => list::execute(&supervisor),
    };
    supervisor.shutdown();
    result
}
