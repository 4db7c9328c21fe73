// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Overlay Relay
//!
//! Maintains a bounded set of active pub/sub subscriptions (`sol_conns`)
//! over a peer population discovered through a rendezvous beacon, churning
//! the worst active connection out for the best standby one as the network
//! changes.
//!
//! # Usage
//!
//! ```bash
//! overlay-relay gen-config > relay.toml
//! overlay-relay --config relay.toml
//! ```

use clap::{Parser, Subcommand};
use overlay_relay::{RelayConfig, RelayNode};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "overlay-relay")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stats reporting period, in seconds (0 disables reporting)
    #[arg(long, default_value = "30")]
    stats_interval: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print an example configuration to stdout and exit.
    GenConfig,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if matches!(args.command, Some(Command::GenConfig)) {
        let example = RelayConfig::example();
        print!("{}", toml::to_string_pretty(&example)?);
        return Ok(());
    }

    let config = match args.config {
        Some(path) => RelayConfig::from_file(&path)?,
        None => RelayConfig::example(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "Relay starting: protocol_tag={:#x} pubsub={} rendezvous={}",
        config.protocol_tag, config.pubsub_bind_address, config.rendezvous_address
    );

    let node = RelayNode::new(config)?;
    let handle = node.handle();

    let stats_interval = args.stats_interval;
    if stats_interval > 0 {
        let stats_handle = handle.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(stats_interval));
            loop {
                ticker.tick().await;
                if !stats_handle.is_running() {
                    break;
                }
                if let Some(snapshot) = stats_handle.stats().await {
                    info!(
                        "sol_conns={} sol_standby_conns={}",
                        snapshot.sol_conns, snapshot.sol_standby_conns
                    );
                } else {
                    break;
                }
            }
        });
    }

    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received, stopping relay...");
        shutdown_handle.stop();
    });

    node.run().await?;

    info!("Relay stopped");
    Ok(())
}
