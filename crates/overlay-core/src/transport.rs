// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport contract.
//!
//! The discovery server and the relay each drive their own datagram
//! transport, but both reduce to the same three-role shape the reference
//! implementation expresses through its `TransportFactory` /
//! `did_recv_packet` / `did_dial` split: a factory that binds a listening
//! socket and dials peers, a handle used to send to one address, and a
//! delegate that receives callbacks for datagrams and dial completions.
//! Rust has no template delegate parameter, so the three roles are traits a
//! binary implements directly rather than a generic parameter threaded
//! through the type.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;

/// A handle capable of sending datagrams to one fixed remote address.
///
/// Cloning must be cheap (an `Arc`-wrapped socket or similar) since both the
/// owning event loop and any spawned response path may hold one.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Remote address this handle sends to.
    fn remote_address(&self) -> SocketAddr;

    /// Send one datagram to `remote_address()`.
    async fn send(&self, datagram: &[u8]) -> io::Result<()>;
}

/// Binds a listening socket and produces `Transport` handles for both
/// inbound peers (as datagrams arrive) and outbound dials (before the first
/// send).
#[async_trait]
pub trait TransportFactory: Send + Sync {
    type Handle: Transport;

    /// Local address this factory's socket is bound to.
    fn local_address(&self) -> SocketAddr;

    /// Obtain a handle for sending to `remote`, without requiring a prior
    /// inbound datagram from it (the reference implementation's `did_dial`).
    fn dial(&self, remote: SocketAddr) -> Self::Handle;

    /// Receive the next inbound datagram, returning its sender's handle
    /// alongside the payload. Mirrors `did_recv_packet(transport, packet)`
    /// without the callback indirection: the caller's own event loop
    /// `select!`s on this future directly, in keeping with the single
    /// cooperative loop the rest of this crate assumes.
    async fn recv(&self, buf: &mut [u8]) -> io::Result<(usize, Self::Handle)>;
}

/// Per-message dispatch a binary implements once its transport is wired up.
///
/// This is the Rust equivalent of overriding `did_recv_DISCPROTO` /
/// `did_recv_HEARTBEAT` / etc. in the reference delegate: one method per
/// message kind, invoked by the binary's own receive loop after
/// `wire::parse_header` has identified the kind. It is not invoked by this
/// crate — `overlay-core` only supplies the vocabulary (wire formats, the
/// transport trait, protocol tags); dispatch lives in each binary's own
/// event loop so that it can own its registry/bucket state without a lock.
pub trait TransportDelegate<H: Transport> {
    /// A datagram the dispatcher couldn't attribute to a known message kind
    /// arrived from `from`.
    fn did_recv_unknown(&mut self, from: &H, datagram: &[u8]);
}
