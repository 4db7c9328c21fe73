// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Relay node: wires the discovery client, the topology controller, and the
//! pub/sub transport onto one single-task event loop.
//!
//! As in the discovery server, the controller and its buckets are owned
//! exclusively by the task `run` drives — nothing here is behind a lock.
//! Stats are read out through a channel request/response, answered
//! synchronously from within the same loop, rather than through shared
//! mutable state.

use crate::config::RelayConfig;
use crate::controller::RelayController;
use crate::discovery_client::{DiscoveryClient, DispatchOutcome};
use crate::error::RelayError;
use crate::transport_udp::UdpPubSub;
use overlay_core::protocol::ProtocolAdvertisement;
use std::net::SocketAddrV4;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{info, warn};

/// Point-in-time bucket occupancy, for `--stats-interval` reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStatsSnapshot {
    pub sol_conns: usize,
    pub sol_standby_conns: usize,
}

struct StatsRequest {
    reply: oneshot::Sender<RelayStatsSnapshot>,
}

/// Clonable handle to control and introspect a running `RelayNode`.
#[derive(Clone)]
pub struct RelayHandle {
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    stats_tx: mpsc::Sender<StatsRequest>,
}

impl RelayHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.shutdown.notify_waiters();
    }

    /// Request a bucket occupancy snapshot from the running node. Returns
    /// `None` if the node has already stopped.
    pub async fn stats(&self) -> Option<RelayStatsSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.stats_tx.send(StatsRequest { reply: tx }).await.ok()?;
        rx.await.ok()
    }
}

/// A relay node: one discovery client, one topology controller, one pub/sub
/// transport.
pub struct RelayNode {
    config: RelayConfig,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    stats_tx: mpsc::Sender<StatsRequest>,
    stats_rx: mpsc::Receiver<StatsRequest>,
}

impl RelayNode {
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        config.validate()?;
        let (stats_tx, stats_rx) = mpsc::channel(8);
        Ok(Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            stats_tx,
            stats_rx,
        })
    }

    pub fn handle(&self) -> RelayHandle {
        RelayHandle {
            running: self.running.clone(),
            shutdown: self.shutdown.clone(),
            stats_tx: self.stats_tx.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the node's single event loop until stopped via its `RelayHandle`.
    pub async fn run(mut self) -> Result<(), RelayError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RelayError::AlreadyRunning);
        }

        let mut controller: RelayController<SocketAddrV4> =
            RelayController::new(self.config.protocol_tag, self.config.channels.clone());
        if !controller.is_active() {
            info!(
                "Protocol tag {:#x} has no topology capability; controller is inert",
                self.config.protocol_tag
            );
        }

        let mut pubsub = UdpPubSub::bind(self.config.pubsub_bind_address)
            .await
            .map_err(|e| RelayError::Bind(e.to_string()))?;

        let public_key: [u8; overlay_core::wire::PUBLIC_KEY_LEN] = self
            .config
            .public_key
            .clone()
            .try_into()
            .expect("validated in RelayConfig::validate");
        let app_address: [u8; overlay_core::wire::APP_ADDRESS_LEN] = self
            .config
            .app_address
            .clone()
            .try_into()
            .expect("validated in RelayConfig::validate");
        let advertisement: ProtocolAdvertisement = (
            self.config.protocol_tag,
            0,
            self.config.pubsub_bind_address.port(),
        );

        let mut discovery = DiscoveryClient::bind(
            self.config.discovery_bind_address,
            self.config.rendezvous_address,
            public_key,
            app_address,
            advertisement,
        )
        .await
        .map_err(|e| RelayError::Bind(e.to_string()))?;

        info!(
            "Relay node up: pubsub={} discovery={} rendezvous={}",
            self.config.pubsub_bind_address,
            self.config.discovery_bind_address,
            self.config.rendezvous_address
        );

        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval());
        let mut discpeer = tokio::time::interval(self.config.discpeer_interval());
        let mut recv_buf = vec![0u8; overlay_core::wire::LISTPEER_DATAGRAM_CAP];

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if let Err(e) = discovery.send_heartbeat().await {
                        warn!("Failed to send HEARTBEAT: {}", e);
                    }
                }
                _ = discpeer.tick() => {
                    if let Err(e) = discovery.send_discpeer().await {
                        warn!("Failed to send DISCPEER: {}", e);
                    }
                    discovery.prune_stale_pending(
                        self.config.discpeer_interval() * 4,
                        std::time::Instant::now(),
                    );
                }
                result = discovery.recv_and_dispatch(&mut recv_buf) => {
                    match result {
                        Ok(DispatchOutcome::PeerResolved(peer)) => {
                            // RTT is unmeasured at discovery time; the
                            // pub/sub layer (out of scope here) is what
                            // would update it as roundtrips complete.
                            controller.new_peer(peer.remote_address, peer.protocol_tag, 0, &mut pubsub);
                            controller.manage_subscriptions(&mut pubsub);
                        }
                        Ok(DispatchOutcome::None) => {}
                        Err(e) => warn!("Discovery client recv error: {}", e),
                    }
                }
                Some(req) = self.stats_rx.recv() => {
                    let _ = req.reply.send(RelayStatsSnapshot {
                        sol_conns: controller.sol_conns().len(),
                        sol_standby_conns: controller.sol_standby_conns().len(),
                    });
                }
                _ = self.shutdown.notified() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}
