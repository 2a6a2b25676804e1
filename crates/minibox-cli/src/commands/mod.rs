//! CLI command definitions and dispatch.

pub mod exec;
pub mod init;
pub mod logs;
pub mod network;
pub mod ps;
pub mod rm;
pub mod run;
pub mod stop;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use minibox_common::config::RuntimeConfig;
use minibox_common::constants::{
    APP_NAME, DATA_DIR_ENV, DEFAULT_DATA_DIR, DEFAULT_STATE_DIR, STATE_DIR_ENV,
};

/// minibox: a minimal Linux container runtime.
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Directory for container records, logs, and network state.
    #[arg(long, global = true, env = STATE_DIR_ENV, default_value = DEFAULT_STATE_DIR)]
    pub state_dir: PathBuf,

    /// Directory for images, layers, and container filesystems.
    #[arg(long, global = true, env = DATA_DIR_ENV, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Emit runtime logs as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,
}

impl Cli {
    /// Runtime configuration selected by the global flags.
    #[must_use]
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig::new(&self.state_dir, &self.data_dir)
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and run a container.
    Run(run::RunArgs),
    /// Container init entrypoint (internal).
    #[command(hide = true)]
    Init,
    /// Run a command inside a running container.
    Exec(exec::ExecArgs),
    /// List containers.
    Ps,
    /// Print the logs of a detached container.
    Logs(logs::LogsArgs),
    /// Stop a running container.
    Stop(stop::StopArgs),
    /// Remove a stopped container.
    Rm(rm::RmArgs),
    /// Manage container networks.
    #[command(subcommand)]
    Network(network::NetworkCommand),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.runtime_config();
    match cli.command {
        Command::Run(args) => run::execute(args, config),
        Command::Init => init::execute(),
        Command::Exec(args) => exec::execute(args, config),
        Command::Ps => ps::execute(config),
        Command::Logs(args) => logs::execute(&args, config),
        Command::Stop(args) => stop::execute(&args, config),
        Command::Rm(args) => rm::execute(&args, config),
        Command::Network(cmd) => network::execute(cmd, &config),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_dirs_accepted_after_subcommand() {
        let cli = Cli::try_parse_from(["minibox", "ps", "--state-dir", "/tmp/s"]).unwrap();
        assert_eq!(cli.state_dir, PathBuf::from("/tmp/s"));
        assert!(matches!(cli.command, Command::Ps));
    }

    #[test]
    fn network_subcommands_parse() {
        let cli = Cli::try_parse_from([
            "minibox", "network", "create", "--subnet", "192.168.0.0/24", "testbr",
        ])
        .unwrap();
        let Command::Network(network::NetworkCommand::Create(args)) = cli.command else {
            unreachable!("expected network create");
        };
        assert_eq!(args.subnet, "192.168.0.0/24");
        assert_eq!(args.driver, "bridge");
        assert_eq!(args.name, "testbr");
    }
}
