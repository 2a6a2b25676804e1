//! `minibox exec`: Run a command inside a running container.

use clap::Args;
use minibox_common::config::RuntimeConfig;
use minibox_runtime::engine::Engine;

/// Arguments for the `exec` command.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Container name.
    pub container: String,

    /// Command to execute.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `exec` command.
///
/// Joins the container's namespaces and runs the command with the
/// container's environment, exiting with its status.
///
/// # Errors
///
/// Returns an error if the container is not running or the command cannot
/// be started.
pub fn execute(args: ExecArgs, config: RuntimeConfig) -> anyhow::Result<()> {
    let engine = Engine::new(config);
    let code = engine.exec(&args.container, &args.command)?;
    std::process::exit(code);
}
