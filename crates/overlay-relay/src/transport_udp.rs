// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP-backed pub/sub transport.
//!
//! The dissemination protocol itself (message IDs, dedup, cut-through
//! forwarding) is out of scope; this gives the topology controller a real
//! socket to drive `subscribe`/`unsubscribe` through, satisfying
//! `overlay_core::transport`'s contract and `controller::PubSubNode`
//! without inventing wire semantics the spec doesn't define. Control
//! datagrams are single ASCII lines: `SUB <channel>` / `UNSUB <channel>`.

use crate::controller::PubSubNode;
use async_trait::async_trait;
use overlay_core::transport::{Transport, TransportFactory};
use std::io;
use std::net::SocketAddr;
use std::net::SocketAddrV4;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::warn;

/// A handle that sends control datagrams to one fixed peer over a shared
/// socket.
#[derive(Clone)]
pub struct UdpHandle {
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
}

#[async_trait]
impl Transport for UdpHandle {
    fn remote_address(&self) -> SocketAddr {
        self.remote
    }

    async fn send(&self, datagram: &[u8]) -> io::Result<()> {
        self.socket.send_to(datagram, self.remote).await.map(|_| ())
    }
}

/// Concrete pub/sub node: one bound UDP socket, dialing out to whichever
/// peers the controller promotes.
pub struct UdpPubSub {
    socket: Arc<UdpSocket>,
}

impl UdpPubSub {
    pub async fn bind(local_address: SocketAddrV4) -> io::Result<Self> {
        let socket = UdpSocket::bind(SocketAddr::V4(local_address)).await?;
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    /// Receive the next inbound control datagram, if the peer sent one
    /// (this binary doesn't otherwise need to know about inbound
    /// subscribe/unsubscribe requests from peers it hasn't promoted).
    pub async fn recv(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }
}

#[async_trait]
impl TransportFactory for UdpPubSub {
    type Handle = UdpHandle;

    fn local_address(&self) -> SocketAddr {
        self.socket
            .local_addr()
            .expect("bound socket always has a local address")
    }

    fn dial(&self, remote: SocketAddr) -> Self::Handle {
        UdpHandle {
            socket: self.socket.clone(),
            remote,
        }
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<(usize, Self::Handle)> {
        let (len, remote) = self.socket.recv_from(buf).await?;
        Ok((len, self.dial(remote)))
    }
}

impl PubSubNode<SocketAddrV4> for UdpPubSub {
    fn subscribe(&mut self, channel: &str, handle: SocketAddrV4) {
        let socket = self.socket.clone();
        let datagram = format!("SUB {}", channel).into_bytes();
        tokio::spawn(async move {
            if let Err(e) = socket.send_to(&datagram, SocketAddr::V4(handle)).await {
                warn!("Failed to send SUB to {}: {}", handle, e);
            }
        });
    }

    fn unsubscribe(&mut self, channel: &str, handle: SocketAddrV4) {
        let socket = self.socket.clone();
        let datagram = format!("UNSUB {}", channel).into_bytes();
        tokio::spawn(async move {
            if let Err(e) = socket.send_to(&datagram, SocketAddr::V4(handle)).await {
                warn!("Failed to send UNSUB to {}: {}", handle, e);
            }
        });
    }
}
