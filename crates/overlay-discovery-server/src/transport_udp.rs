// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP-backed transport for the rendezvous server.
//!
//! One bound socket serves every peer; each inbound datagram yields a
//! `UdpPeerHandle` dialed back to its sender, satisfying
//! `overlay_core::transport`'s `Transport`/`TransportFactory` contract
//! instead of routing replies through the raw socket directly.

use async_trait::async_trait;
use overlay_core::transport::{Transport, TransportFactory};
use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;
use tokio::net::UdpSocket;

/// A handle that sends datagrams to one fixed peer over a shared socket.
#[derive(Clone)]
pub struct UdpPeerHandle {
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
}

#[async_trait]
impl Transport for UdpPeerHandle {
    fn remote_address(&self) -> SocketAddr {
        self.remote
    }

    async fn send(&self, datagram: &[u8]) -> io::Result<()> {
        self.socket.send_to(datagram, self.remote).await.map(|_| ())
    }
}

/// Concrete rendezvous transport: one bound UDP socket dialing back to
/// whichever peer last sent a datagram.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    pub async fn bind(local_address: SocketAddrV4) -> io::Result<Self> {
        let socket = UdpSocket::bind(SocketAddr::V4(local_address)).await?;
        Ok(Self {
            socket: Arc::new(socket),
        })
    }
}

#[async_trait]
impl TransportFactory for UdpTransport {
    type Handle = UdpPeerHandle;

    fn local_address(&self) -> SocketAddr {
        self.socket
            .local_addr()
            .expect("bound socket always has a local address")
    }

    fn dial(&self, remote: SocketAddr) -> Self::Handle {
        UdpPeerHandle {
            socket: self.socket.clone(),
            remote,
        }
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<(usize, Self::Handle)> {
        let (len, remote) = self.socket.recv_from(buf).await?;
        Ok((len, self.dial(remote)))
    }
}
