// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery client.
//!
//! Periodically contacts the rendezvous with HEARTBEAT (to stay registered)
//! and DISCPEER (to receive a LISTPEER of the current membership), then
//! resolves each newly-seen peer's protocol tag peer-to-peer: the wire
//! protocol's LISTPEER entries carry a network address, public key, and app
//! address but no protocol tag, so this node asks the peer directly via
//! DISCPROTO and reads back its LISTPROTO. Because every node runs this
//! same responder, the query is symmetric — this client also answers
//! DISCPROTO from other nodes with its own advertisement.

use overlay_core::protocol::ProtocolAdvertisement;
use overlay_core::wire::{self, MessageKind, APP_ADDRESS_LEN, PUBLIC_KEY_LEN};
use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use std::time::Instant;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// A peer learned from the rendezvous whose protocol tag is still being
/// resolved via a direct DISCPROTO.
struct PendingPeer {
    #[allow(dead_code)]
    public_key: [u8; PUBLIC_KEY_LEN],
    #[allow(dead_code)]
    app_address: [u8; APP_ADDRESS_LEN],
    requested_at: Instant,
}

/// A fully resolved peer, ready to hand to `RelayController::new_peer`.
pub struct ResolvedPeer {
    pub remote_address: SocketAddrV4,
    pub protocol_tag: u32,
}

/// Result of dispatching one inbound datagram.
pub enum DispatchOutcome {
    /// Nothing actionable — a HEARTBEAT/DISCPEER ack, a DISCPROTO answered
    /// inline, or a malformed/ignored datagram.
    None,
    /// A peer's protocol tag was just resolved; hand it to the controller.
    PeerResolved(ResolvedPeer),
}

pub struct DiscoveryClient {
    socket: UdpSocket,
    rendezvous_address: SocketAddrV4,
    public_key: [u8; PUBLIC_KEY_LEN],
    app_address: [u8; APP_ADDRESS_LEN],
    advertisement: ProtocolAdvertisement,
    pending: HashMap<SocketAddrV4, PendingPeer>,
}

impl DiscoveryClient {
    pub async fn bind(
        local_address: SocketAddrV4,
        rendezvous_address: SocketAddrV4,
        public_key: [u8; PUBLIC_KEY_LEN],
        app_address: [u8; APP_ADDRESS_LEN],
        advertisement: ProtocolAdvertisement,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(SocketAddr::V4(local_address)).await?;
        Ok(Self {
            socket,
            rendezvous_address,
            public_key,
            app_address,
            advertisement,
            pending: HashMap::new(),
        })
    }

    pub fn local_address(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Send a HEARTBEAT to the rendezvous, refreshing this node's TTL.
    pub async fn send_heartbeat(&self) -> io::Result<()> {
        let datagram = wire::encode_heartbeat(&self.public_key, &self.app_address);
        self.socket
            .send_to(&datagram, SocketAddr::V4(self.rendezvous_address))
            .await
            .map(|_| ())
    }

    /// Send a DISCPEER to the rendezvous, requesting the current
    /// membership.
    pub async fn send_discpeer(&self) -> io::Result<()> {
        let datagram = wire::encode_header(MessageKind::DiscPeer);
        self.socket
            .send_to(&datagram, SocketAddr::V4(self.rendezvous_address))
            .await
            .map(|_| ())
    }

    /// Receive and dispatch the next inbound datagram. Blocks until one
    /// arrives; the caller drives this from a `tokio::select!` alongside
    /// its timers.
    pub async fn recv_and_dispatch(&mut self, buf: &mut [u8]) -> io::Result<DispatchOutcome> {
        let (len, from) = self.socket.recv_from(buf).await?;
        let datagram = &buf[..len];

        let from_v4 = match from {
            SocketAddr::V4(v4) => v4,
            SocketAddr::V6(_) => return Ok(DispatchOutcome::None),
        };

        let Some(kind) = wire::parse_header(datagram) else {
            debug!("Dropping malformed datagram from {}", from);
            return Ok(DispatchOutcome::None);
        };

        if from_v4 == self.rendezvous_address {
            return self.dispatch_from_rendezvous(kind, datagram).await;
        }
        self.dispatch_from_peer(kind, datagram, from_v4).await
    }

    async fn dispatch_from_rendezvous(
        &mut self,
        kind: MessageKind,
        datagram: &[u8],
    ) -> io::Result<DispatchOutcome> {
        match kind {
            MessageKind::ListPeer => {
                let entries = wire::decode_listpeer_entries(datagram);
                for entry in entries {
                    if self.pending.contains_key(&entry.remote_address) {
                        continue;
                    }
                    let probe = wire::encode_header(MessageKind::DiscProto);
                    if let Err(e) = self
                        .socket
                        .send_to(&probe, SocketAddr::V4(entry.remote_address))
                        .await
                    {
                        warn!("Failed to probe peer {}: {}", entry.remote_address, e);
                        continue;
                    }
                    self.pending.insert(
                        entry.remote_address,
                        PendingPeer {
                            public_key: entry.public_key,
                            app_address: entry.app_address,
                            requested_at: Instant::now(),
                        },
                    );
                }
                Ok(DispatchOutcome::None)
            }
            MessageKind::ListProto => {
                // The rendezvous's own LISTPROTO carries no descriptors; we
                // never asked it for one anyway.
                Ok(DispatchOutcome::None)
            }
            _ => Ok(DispatchOutcome::None),
        }
    }

    async fn dispatch_from_peer(
        &mut self,
        kind: MessageKind,
        datagram: &[u8],
        from: SocketAddrV4,
    ) -> io::Result<DispatchOutcome> {
        match kind {
            MessageKind::DiscProto => {
                let reply = wire::encode_listproto(std::slice::from_ref(&self.advertisement));
                self.socket.send_to(&reply, SocketAddr::V4(from)).await?;
                Ok(DispatchOutcome::None)
            }
            MessageKind::ListProto => {
                if self.pending.remove(&from).is_none() {
                    debug!("Ignoring unsolicited LISTPROTO from {}", from);
                    return Ok(DispatchOutcome::None);
                }
                let advertisements = wire::decode_listproto(datagram);
                match advertisements.first() {
                    Some(&(protocol_tag, _offset, _port)) => {
                        Ok(DispatchOutcome::PeerResolved(ResolvedPeer {
                            remote_address: from,
                            protocol_tag,
                        }))
                    }
                    None => Ok(DispatchOutcome::None),
                }
            }
            _ => Ok(DispatchOutcome::None),
        }
    }

    /// Drop any pending peer probe older than `max_age`; a peer that never
    /// answers DISCPROTO is simply not promoted, not retried forever.
    pub fn prune_stale_pending(&mut self, max_age: std::time::Duration, now: Instant) {
        self.pending
            .retain(|_, pending| now.duration_since(pending.requested_at) <= max_age);
    }
}
