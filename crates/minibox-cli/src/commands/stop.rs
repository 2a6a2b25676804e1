//! `minibox stop`: Stop a running container.

use clap::Args;
use minibox_common::config::RuntimeConfig;
use minibox_runtime::engine::Engine;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error if the container is unknown, not running, or cannot be
/// signalled.
pub fn execute(args: &StopArgs, config: RuntimeConfig) -> anyhow::Result<()> {
    let info = Engine::new(config).stop(&args.container)?;
    println!("{}", info.name);
    Ok(())
}
