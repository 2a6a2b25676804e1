//! `minibox run`: Create and run a container.

use clap::Args;
use minibox_common::config::RuntimeConfig;
use minibox_common::types::{ResourceConfig, VolumeSpec};
use minibox_runtime::container::ContainerConfig;
use minibox_runtime::engine::{Engine, RunOutcome};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Attach the container to this terminal and wait for it to exit.
    #[arg(short = 't', long, conflicts_with = "detach")]
    pub tty: bool,

    /// Run in the background, logging to the container log.
    ///
    /// This is already the behavior without `-t`; the flag only makes it
    /// explicit and is rejected together with `-t`.
    #[arg(short, long)]
    pub detach: bool,

    /// Container name (defaults to the generated id).
    #[arg(long)]
    pub name: Option<String>,

    /// Bind a host directory, `hostPath:containerPath`.
    #[arg(short, long)]
    pub volume: Option<VolumeSpec>,

    /// Extra environment variable, `KEY=VALUE`.
    #[arg(short, long = "env")]
    pub env: Vec<String>,

    /// Memory limit, e.g. `100m`.
    #[arg(short, long)]
    pub memory: Option<String>,

    /// Relative CPU weight.
    #[arg(long)]
    pub cpu_shares: Option<String>,

    /// CPUs the container may run on, e.g. `0-1`.
    #[arg(long)]
    pub cpuset: Option<String>,

    /// Network to connect the container to.
    #[arg(long)]
    pub net: Option<String>,

    /// Publish a port, `hostPort:containerPort`.
    #[arg(short, long = "publish")]
    pub port: Vec<String>,

    /// Image to run.
    pub image: String,

    /// Command and arguments.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

impl RunArgs {
    /// Turns the flags into a launch configuration.
    #[must_use]
    pub fn into_config(self) -> ContainerConfig {
        let mut config = ContainerConfig::new(self.image, self.command);
        config.tty = self.tty;
        if let Some(name) = self.name {
            config.name = name;
        }
        config.volume = self.volume;
        config.env = self.env;
        config.resources = ResourceConfig {
            memory_limit: self.memory.unwrap_or_default(),
            cpu_shares: self.cpu_shares.unwrap_or_default(),
            cpu_set: self.cpuset.unwrap_or_default(),
        };
        config.network = self.net;
        config.port_mapping = self.port;
        config
    }
}

/// Executes the `run` command.
///
/// # Errors
///
/// Returns an error if the container cannot be started.
pub fn execute(args: RunArgs, config: RuntimeConfig) -> anyhow::Result<()> {
    let engine = Engine::new(config);
    match engine.run(&args.into_config())? {
        RunOutcome::Detached(info) => {
            println!("{}", info.id);
            Ok(())
        }
        RunOutcome::Exited { name, code } => {
            tracing::debug!(%name, code, "attached container finished");
            std::process::exit(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use crate::commands::{Cli, Command};

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("minibox").chain(args.iter().copied()))
    }

    #[test]
    fn run_flags_build_config() {
        let cli = parse(&[
            "run", "-t", "--name", "web", "-v", "/tmp/a:/data", "-e", "A=1", "-m", "100m",
            "--cpuset", "0", "--net", "testbr", "-p", "8080:80", "busybox", "sh", "-c", "top",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            unreachable!("expected run");
        };
        let config = args.into_config();
        assert!(config.tty);
        assert_eq!(config.name, "web");
        assert_eq!(config.volume.unwrap().container_path, "/data");
        assert_eq!(config.env, vec!["A=1"]);
        assert_eq!(config.resources.memory_limit, "100m");
        assert_eq!(config.resources.cpu_set, "0");
        assert!(config.resources.cpu_shares.is_empty());
        assert_eq!(config.network.as_deref(), Some("testbr"));
        assert_eq!(config.port_mapping, vec!["8080:80"]);
        assert_eq!(config.command, vec!["sh", "-c", "top"]);
    }

    #[test]
    fn tty_and_detach_conflict() {
        assert!(parse(&["run", "-t", "-d", "busybox", "top"]).is_err());
    }

    #[test]
    fn detach_flag_selects_background_mode() {
        for flags in [&["run", "-d", "busybox", "top"][..], &["run", "busybox", "top"][..]] {
            let Command::Run(args) = parse(flags).unwrap().command else {
                unreachable!("expected run");
            };
            let config = args.into_config();
            assert!(!config.tty);
            assert_eq!(config.command, vec!["top"]);
        }
    }

    #[test]
    fn command_is_required() {
        assert!(parse(&["run", "busybox"]).is_err());
    }

    #[test]
    fn malformed_volume_is_rejected() {
        assert!(parse(&["run", "-v", "nocolon", "busybox", "top"]).is_err());
    }
}
