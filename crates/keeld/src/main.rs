//! The Keel registry daemon and admin CLI.
//!
//! `keeld serve` runs the HTTP API over the on-disk registry. The other
//! subcommands open the same data directory, run one transition or query
//! through an in-process ledger, print the result as JSON and exit.
//!
//! # Usage
//!
//! ```text
//! keeld --config /etc/keel/keel.toml serve --listen 0.0.0.0:1317
//! keeld cert generate keel1alice000
//! keeld cert publish keel1alice000
//! keeld deployment create keel1alice000 --manifest deployment.toml
//! keeld query deployments --owner keel1alice000 --state active
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use keel_core::KeelConfig;

mod commands;
mod node;

#[derive(Parser)]
#[command(name = "keeld", about = "Keel deployment registry", version, propagate_version = true)]
struct Cli {
    /// Path to keel.toml. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override `storage.data_dir`.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Override `server.listen`.
        #[arg(long)]
        listen: Option<SocketAddr>,
    },
    /// Client certificate lifecycle.
    Cert {
        #[command(subcommand)]
        action: commands::cert::CertAction,
    },
    /// Deployment transitions.
    Deployment {
        #[command(subcommand)]
        action: commands::deployment::DeploymentAction,
    },
    /// Group transitions.
    Group {
        #[command(subcommand)]
        action: commands::deployment::GroupAction,
    },
    /// Read the registry.
    Query {
        #[command(subcommand)]
        target: commands::query::QueryTarget,
    },
    /// Print the effective configuration.
    Config,
}

fn load_config(cli: &Cli) -> anyhow::Result<KeelConfig> {
    let mut config = match &cli.config {
        Some(path) => KeelConfig::from_file(path)?,
        None => KeelConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,keeld=debug,keel=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match cli.command {
        Command::Serve { listen } => {
            if let Some(listen) = listen {
                config.server.listen = listen;
            }
            commands::serve::run(config).await
        }
        Command::Cert { action } => commands::cert::run(&config, action).await,
        Command::Deployment { action } => commands::deployment::run(&config, action).await,
        Command::Group { action } => commands::deployment::run_group(&config, action).await,
        Command::Query { target } => commands::query::run(&config, target),
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}
