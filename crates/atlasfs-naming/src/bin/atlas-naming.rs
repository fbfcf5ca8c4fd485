//! Naming server launcher.
//!
//! Usage:
//!   atlas-naming [--bind ADDR] [--service-port N] [--registration-port N]

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use atlasfs_core::Config;
use atlasfs_naming::NamingServer;

#[derive(Parser)]
#[command(name = "atlas-naming")]
#[command(about = "atlasfs naming server", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address for both interfaces
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Port of the client-facing Service interface
    #[arg(long)]
    service_port: Option<u16>,

    /// Port of the storage-facing Registration interface
    #[arg(long)]
    registration_port: Option<u16>,

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
    let mut naming = config.naming;
    if let Some(bind) = cli.bind {
        naming.bind = bind;
    }
    if let Some(port) = cli.service_port {
        naming.service_port = port;
    }
    if let Some(port) = cli.registration_port {
        naming.registration_port = port;
    }

    info!("Starting atlasfs naming server...");
    info!("  Service:      {}", naming.service_addr());
    info!("  Registration: {}", naming.registration_addr());

    let server = NamingServer::new(naming);
    server.start().await?;

    signal::ctrl_c().await?;
    info!("Shutting down...");
    server.stop().await;

    Ok(())
}
