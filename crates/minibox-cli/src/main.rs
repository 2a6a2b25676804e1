//! # minibox
//!
//! Minimal daemon-less Linux container runtime.
//! One binary runs containers, enters them, and manages bridge networks.

#![allow(clippy::print_stdout)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

mod commands;
mod output;

use clap::Parser;
use minibox_runtime::entry::EntryMode;
use minibox_runtime::exec::enter_and_run;
use tracing_subscriber::EnvFilter;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    // Resolved before anything else: joining a mount namespace requires a
    // single-threaded process.
    let mode = EntryMode::resolve();

    match mode {
        EntryMode::NamespaceEntry(request) => {
            init_tracing(false);
            let code = enter_and_run(&request)?;
            std::process::exit(code);
        }
        EntryMode::Cli => {
            let cli = Cli::parse();
            init_tracing(cli.log_json);
            commands::execute(cli)
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
