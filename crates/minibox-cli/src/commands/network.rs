//! `minibox network`: Manage container networks.

use clap::{Args, Subcommand};
use minibox_common::config::RuntimeConfig;
use minibox_common::constants::BRIDGE_DRIVER;
use minibox_network::NetworkStore;

use crate::output::render_table;

/// Network subcommands.
#[derive(Subcommand, Debug)]
pub enum NetworkCommand {
    /// Create a network.
    Create(CreateArgs),
    /// List networks.
    #[command(alias = "ls")]
    List,
    /// Remove a network.
    #[command(alias = "rm")]
    Remove(RemoveArgs),
}

/// Arguments for `network create`.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Subnet in CIDR notation, e.g. `192.168.0.0/24`.
    #[arg(long)]
    pub subnet: String,

    /// Network driver.
    #[arg(long, default_value = BRIDGE_DRIVER)]
    pub driver: String,

    /// Network name; also the bridge device name.
    pub name: String,
}

/// Arguments for `network remove`.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Network name.
    pub name: String,
}

/// Executes a `network` subcommand.
///
/// # Errors
///
/// Returns an error if the network state cannot be loaded or the operation
/// fails.
pub fn execute(command: NetworkCommand, config: &RuntimeConfig) -> anyhow::Result<()> {
    let mut store = NetworkStore::load(config)?;
    match command {
        NetworkCommand::Create(args) => {
            let network = store.create_network(&args.driver, &args.subnet, &args.name)?;
            println!("{}", network.name);
        }
        NetworkCommand::List => {
            let rows: Vec<Vec<String>> = store
                .list()
                .map(|nw| vec![nw.name.clone(), nw.ip_range.to_string(), nw.driver.clone()])
                .collect();
            print!("{}", render_table(&["NAME", "IP RANGE", "DRIVER"], &rows));
        }
        NetworkCommand::Remove(args) => {
            store.delete_network(&args.name)?;
            println!("{}", args.name);
        }
    }
    Ok(())
}
