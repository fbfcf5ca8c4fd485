//! Storage server launcher.
//!
//! Usage:
//!   atlas-storage <root> [--naming-host HOST] [--advertise-host HOST]

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use atlasfs_core::Config;
use atlasfs_storage::StorageServer;

#[derive(Parser)]
#[command(name = "atlas-storage")]
#[command(about = "atlasfs storage server", long_about = None)]
struct Cli {
    /// Directory whose files this server hosts
    root: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address for both capability interfaces
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Port of the Storage interface (0 = system-assigned)
    #[arg(long)]
    storage_port: Option<u16>,

    /// Port of the Command interface (0 = system-assigned)
    #[arg(long)]
    command_port: Option<u16>,

    /// Hostname advertised to the naming server and to clients
    #[arg(long)]
    advertise_host: Option<String>,

    /// Hostname of the naming server
    #[arg(long)]
    naming_host: Option<String>,

    /// Registration port of the naming server
    #[arg(long)]
    naming_port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    let mut storage = config.storage;
    if let Some(root) = cli.root {
        storage.root = root;
    }
    if let Some(bind) = cli.bind {
        storage.bind = bind;
    }
    if let Some(port) = cli.storage_port {
        storage.storage_port = port;
    }
    if let Some(port) = cli.command_port {
        storage.command_port = port;
    }
    if let Some(host) = cli.advertise_host {
        storage.advertise_host = host;
    }
    if let Some(host) = cli.naming_host {
        storage.naming_host = host;
    }
    if let Some(port) = cli.naming_port {
        storage.naming_port = port;
    }
    let storage_root = storage.root.canonicalize()?;
    storage.root = storage_root;

    info!("Starting atlasfs storage server...");
    info!("  Hosting: {:?}", storage.root);
    info!("  Naming:  {}", storage.naming_endpoint());

    let server = StorageServer::new(storage)?;
    server.start().await?;

    signal::ctrl_c().await?;
    info!("Shutting down...");
    server.stop().await;

    Ok(())
}
