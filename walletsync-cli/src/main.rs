// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use walletsync::config::Config;
use walletsync::node;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "walletsync",
    about = "An exchange wallet scanner service with rpc and sync workers"
)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(long, global = true, default_value = "walletsync.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the database schema migrations.
    Migrate,
    /// Run the business operations rpc service.
    Rpc,
    /// Run the chain scanner, flow processor and broadcasters.
    Sync,
    /// Run the webhook notifier.
    Notify,
    /// Print the version and exit.
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    if let Command::Version = args.command {
        println!("walletsync {VERSION}");
        return Ok(());
    }

    let config = Config::from_file(&args.config)?;
    let cancel = node::shutdown_on_signal();

    match args.command {
        Command::Migrate => node::run_migrations(&config).await,
        Command::Rpc => node::run_rpc(config, cancel).await,
        Command::Sync => node::run_sync(config, cancel).await,
        Command::Notify => node::run_notify(config, cancel).await,
        Command::Version => unreachable!(),
    }
}
