// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Overlay Discovery Server
//!
//! Standalone rendezvous server relays use to find each other when they
//! have no prior knowledge of the network's membership:
//!
//! - A relay sends HEARTBEAT to announce itself and refresh its TTL.
//! - A relay sends DISCPEER to get back a LISTPEER of every other known peer.
//!
//! # Usage
//!
//! ```bash
//! overlay-discovery-server
//! overlay-discovery-server --port 8002 --config server.json
//! ```

use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;
mod server;
mod transport_udp;

pub use config::ServerConfig;
pub use server::DiscoveryServer;

/// Overlay discovery server - rendezvous for relay topology membership.
#[derive(Parser, Debug)]
#[command(name = "overlay-discovery-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// UDP port to listen on
    #[arg(short, long, default_value = "8002")]
    port: u16,

    /// Bind address (0.0.0.0 for all interfaces)
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Configuration file (JSON format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reaper sweep period, in seconds
    #[arg(long, default_value = "10")]
    reaper_interval: u64,

    /// Peer TTL, in seconds
    #[arg(long, default_value = "60")]
    peer_ttl: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = if let Some(config_path) = args.config {
        info!("Loading config from {:?}", config_path);
        ServerConfig::from_file(&config_path)?
    } else {
        ServerConfig {
            bind_address: args.bind.parse()?,
            port: args.port,
            reaper_interval_secs: args.reaper_interval,
            peer_ttl_secs: args.peer_ttl,
            log_level: args.log_level,
            ..Default::default()
        }
    };

    info!("+----------------------------------------------------+");
    info!(
        "|     Overlay Discovery Server v{}              |",
        env!("CARGO_PKG_VERSION")
    );
    info!("+----------------------------------------------------+");
    info!("|  Bind:       {}:{}", config.bind_address, config.port);
    info!("|  Peer TTL:   {}s", config.peer_ttl_secs);
    info!("|  Reaper:     every {}s", config.reaper_interval_secs);
    info!("+----------------------------------------------------+");

    let server = DiscoveryServer::new(config).await?;

    let server_handle = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received, stopping server...");
        server_handle.shutdown();
    });

    server.run().await?;

    info!("Discovery server stopped");
    Ok(())
}
