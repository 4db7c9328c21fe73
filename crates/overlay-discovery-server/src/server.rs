// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery server core implementation.
//!
//! The server owns one UDP socket and one `ParticipantRegistry`, both local
//! to the single task `run` drives with `tokio::select!`. Nothing here is
//! behind a lock: the registry is never shared with another task, so there
//! is nothing to contend over.

use crate::config::ServerConfig;
use crate::transport_udp::{UdpPeerHandle, UdpTransport};
use overlay_core::transport::{Transport, TransportFactory};
use overlay_core::wire::{self, MessageKind};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

pub mod registry;

pub use registry::{ParticipantRegistry, PeerRecord, RegisterOutcome};

/// Rendezvous discovery server.
#[derive(Clone)]
pub struct DiscoveryServer {
    config: Arc<ServerConfig>,
    shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
}

impl DiscoveryServer {
    /// Create a new discovery server. Does not bind a socket yet.
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            shutdown: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Run the server's single event loop until `shutdown` fires.
    pub async fn run(&self) -> Result<(), ServerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyRunning);
        }

        let bind_addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| ServerError::Bind(format!("{}", e)))?;
        let bind_addr = match bind_addr {
            SocketAddr::V4(v4) => v4,
            SocketAddr::V6(_) => {
                return Err(ServerError::Bind("only IPv4 binding is supported".into()));
            }
        };
        let transport = UdpTransport::bind(bind_addr)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        info!("Discovery server listening on {}", transport.local_address());

        let mut registry = ParticipantRegistry::new(self.config.max_registry_size);
        let mut reaper = tokio::time::interval(self.config.reaper_interval());
        let mut recv_buf = vec![0u8; self.config.max_datagram_payload];

        loop {
            tokio::select! {
                result = transport.recv(&mut recv_buf) => {
                    match result {
                        Ok((len, peer)) => {
                            Self::handle_datagram(
                                &peer,
                                &mut registry,
                                &recv_buf[..len],
                                self.config.max_datagram_payload,
                            ).await;
                        }
                        Err(e) => warn!("recv error: {}", e),
                    }
                }
                _ = reaper.tick() => {
                    let expired = registry.evict_expired(self.config.peer_ttl(), std::time::Instant::now());
                    if !expired.is_empty() {
                        info!("Evicted {} stale peers", expired.len());
                        for addr in &expired {
                            debug!("  - {}", addr);
                        }
                    }
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

    async fn handle_datagram(
        peer: &UdpPeerHandle,
        registry: &mut ParticipantRegistry,
        datagram: &[u8],
        max_datagram_payload: usize,
    ) {
        let peer_addr = peer.remote_address();
        let peer_v4 = match peer_addr {
            SocketAddr::V4(v4) => v4,
            SocketAddr::V6(_) => {
                warn!("Dropping datagram from non-IPv4 peer {}", peer_addr);
                return;
            }
        };

        let kind = match wire::parse_header(datagram) {
            Some(kind) => kind,
            None => {
                debug!("Dropping malformed datagram from {}", peer_addr);
                return;
            }
        };

        match kind {
            MessageKind::Heartbeat => {
                let payload = match wire::decode_heartbeat(datagram) {
                    Some(p) => p,
                    None => {
                        debug!("Dropping malformed HEARTBEAT from {}", peer_addr);
                        return;
                    }
                };
                match registry.touch(
                    peer_v4,
                    payload.public_key,
                    payload.app_address,
                    std::time::Instant::now(),
                ) {
                    RegisterOutcome::Accepted => {}
                    RegisterOutcome::RegistryFull => {
                        warn!("Registry full, dropping HEARTBEAT from {}", peer_addr);
                    }
                }
            }
            MessageKind::DiscPeer => {
                // A DISCPEER carries no metadata to register the requester
                // by; it only asks "who else is out there". A peer that
                // wants to appear in others' LISTPEER responses must also
                // be sending HEARTBEATs.
                let entries = registry.entries_excluding(peer_v4);
                for datagram in
                    wire::encode_listpeer_datagrams_capped(&entries, max_datagram_payload)
                {
                    if let Err(e) = peer.send(&datagram).await {
                        warn!("Failed to send LISTPEER to {}: {}", peer_addr, e);
                        return;
                    }
                }
            }
            MessageKind::DiscProto => {
                let reply = wire::encode_listproto_empty();
                if let Err(e) = peer.send(&reply).await {
                    warn!("Failed to send LISTPROTO to {}: {}", peer_addr, e);
                }
            }
            MessageKind::ListProto | MessageKind::ListPeer => {
                debug!("Ignoring server-originated message kind from {}", peer_addr);
            }
        }
    }

    /// Signal the server to shut down.
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    /// Whether `run` is currently executing its event loop.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Server error types.
#[derive(Debug)]
pub enum ServerError {
    Config(String),
    Bind(String),
    AlreadyRunning,
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(s) => write!(f, "configuration error: {}", s),
            Self::Bind(s) => write!(f, "bind error: {}", s),
            Self::AlreadyRunning => write!(f, "server already running"),
        }
    }
}

impl std::error::Error for ServerError {}

#[cfg(test)]
mod tests {
    use super::*;
    use overlay_core::wire;
    use std::time::Duration;
    use tokio::net::UdpSocket as TokioUdpSocket;
    use tokio::time::timeout;

    #[tokio::test]
    async fn rejects_running_the_loop_twice_concurrently() {
        let config = ServerConfig {
            port: 18002,
            ..Default::default()
        };
        let server = DiscoveryServer::new(config).await.unwrap();
        assert!(!server.is_running());
    }

    #[test]
    fn server_error_messages_are_human_readable() {
        assert_eq!(
            ServerError::AlreadyRunning.to_string(),
            "server already running"
        );
        assert_eq!(
            ServerError::Bind("addr in use".into()).to_string(),
            "bind error: addr in use"
        );
    }

    async fn spawn_test_server(port: u16, peer_ttl_secs: u64, reaper_interval_secs: u64) -> DiscoveryServer {
        let config = ServerConfig {
            port,
            peer_ttl_secs,
            reaper_interval_secs,
            ..Default::default()
        };
        let server = DiscoveryServer::new(config).await.unwrap();
        let running = server.clone();
        tokio::spawn(async move {
            running.run().await.unwrap();
        });
        // give the bind a moment to land before any client sends.
        tokio::time::sleep(Duration::from_millis(50)).await;
        server
    }

    async fn recv_listpeer(socket: &TokioUdpSocket) -> Vec<u8> {
        let mut buf = vec![0u8; 2048];
        let len = timeout(Duration::from_secs(2), socket.recv(&mut buf))
            .await
            .expect("timed out waiting for LISTPEER")
            .unwrap();
        buf.truncate(len);
        buf
    }

    /// Scenario S1: a lone registrant's own DISCPEER comes back empty.
    #[tokio::test]
    async fn scenario_s1_heartbeat_then_discpeer_sees_nobody() {
        let server_addr: SocketAddr = "127.0.0.1:18101".parse().unwrap();
        let server = spawn_test_server(18101, 60, 10).await;

        let client = TokioUdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(server_addr).await.unwrap();

        let heartbeat = wire::encode_heartbeat(&[0x01; 32], &[0x02; 20]);
        client.send(&heartbeat).await.unwrap();

        client
            .send(&wire::encode_header(wire::MessageKind::DiscPeer))
            .await
            .unwrap();
        let datagram = recv_listpeer(&client).await;

        assert_eq!(datagram, vec![0x00, 0x03]);
        assert!(wire::decode_listpeer_entries(&datagram).is_empty());
        server.shutdown();
    }

    /// Scenario S2: two registered peers see each other, never themselves.
    #[tokio::test]
    async fn scenario_s2_two_peers_see_each_other() {
        let server_addr: SocketAddr = "127.0.0.1:18102".parse().unwrap();
        let server = spawn_test_server(18102, 60, 10).await;

        let a = TokioUdpSocket::bind("127.0.0.1:0").await.unwrap();
        a.connect(server_addr).await.unwrap();
        let b = TokioUdpSocket::bind("127.0.0.1:0").await.unwrap();
        b.connect(server_addr).await.unwrap();
        let b_addr = b.local_addr().unwrap();

        a.send(&wire::encode_heartbeat(&[0xAA; 32], &[0xAB; 20]))
            .await
            .unwrap();
        b.send(&wire::encode_heartbeat(&[0xBB; 32], &[0xBC; 20]))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        a.send(&wire::encode_header(wire::MessageKind::DiscPeer))
            .await
            .unwrap();
        let datagram = recv_listpeer(&a).await;
        let entries = wire::decode_listpeer_entries(&datagram);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].remote_address.port(), b_addr.port());
        assert_eq!(entries[0].public_key, [0xBB; 32]);
        server.shutdown();
    }

    /// Scenario S3: a peer that stops heartbeating disappears after the
    /// reaper sweeps past its TTL.
    #[tokio::test]
    async fn scenario_s3_reaper_evicts_silent_peer() {
        let server_addr: SocketAddr = "127.0.0.1:18103".parse().unwrap();
        let server = spawn_test_server(18103, 1, 1).await;

        let a = TokioUdpSocket::bind("127.0.0.1:0").await.unwrap();
        a.connect(server_addr).await.unwrap();
        let b = TokioUdpSocket::bind("127.0.0.1:0").await.unwrap();
        b.connect(server_addr).await.unwrap();

        b.send(&wire::encode_heartbeat(&[0xCC; 32], &[0xCD; 20]))
            .await
            .unwrap();
        a.send(&wire::encode_heartbeat(&[0xEE; 32], &[0xEF; 20]))
            .await
            .unwrap();

        // peer_ttl=1s, reaper=1s: wait well past both before re-asking.
        tokio::time::sleep(Duration::from_millis(2500)).await;

        a.send(&wire::encode_header(wire::MessageKind::DiscPeer))
            .await
            .unwrap();
        let datagram = recv_listpeer(&a).await;
        assert!(wire::decode_listpeer_entries(&datagram).is_empty());
        server.shutdown();
    }

    /// Scenario S4: 25 registered peers paginate into two LISTPEER
    /// datagrams of 18 and 6 entries, excluding the requester.
    #[tokio::test]
    async fn scenario_s4_listpeer_pagination() {
        let server_addr: SocketAddr = "127.0.0.1:18104".parse().unwrap();
        let server = spawn_test_server(18104, 60, 10).await;

        let mut sockets = Vec::new();
        for i in 0..25u8 {
            let socket = TokioUdpSocket::bind("127.0.0.1:0").await.unwrap();
            socket.connect(server_addr).await.unwrap();
            socket
                .send(&wire::encode_heartbeat(&[i; 32], &[i; 20]))
                .await
                .unwrap();
            sockets.push(socket);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let requester = &sockets[0];
        requester
            .send(&wire::encode_header(wire::MessageKind::DiscPeer))
            .await
            .unwrap();

        let first = recv_listpeer(requester).await;
        let second = recv_listpeer(requester).await;
        assert_eq!(first.len(), 1082);
        assert_eq!(second.len(), 362);

        let mut entries = wire::decode_listpeer_entries(&first);
        entries.extend(wire::decode_listpeer_entries(&second));
        assert_eq!(entries.len(), 24);

        let requester_port = requester.local_addr().unwrap().port();
        assert!(entries
            .iter()
            .all(|e| e.remote_address.port() != requester_port));
        server.shutdown();
    }
}
