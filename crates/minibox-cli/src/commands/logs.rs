//! `minibox logs`: Print a detached container's output.

use std::io::Write;

use clap::Args;
use minibox_common::config::RuntimeConfig;
use minibox_runtime::engine::Engine;

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `logs` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or its log is unreadable.
pub fn execute(args: &LogsArgs, config: RuntimeConfig) -> anyhow::Result<()> {
    let logs = Engine::new(config).logs(&args.container)?;
    if logs.is_empty() {
        tracing::info!(container = %args.container, "no logs recorded");
    }
    std::io::stdout().write_all(logs.as_bytes())?;
    Ok(())
}
