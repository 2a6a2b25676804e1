//! `minibox rm`: Remove a stopped container.

use clap::Args;
use minibox_common::config::RuntimeConfig;
use minibox_runtime::engine::Engine;

/// Arguments for the `rm` command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `rm` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or still running.
pub fn execute(args: &RmArgs, config: RuntimeConfig) -> anyhow::Result<()> {
    Engine::new(config).remove(&args.container)?;
    println!("{}", args.container);
    Ok(())
}
