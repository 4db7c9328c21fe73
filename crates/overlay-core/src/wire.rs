// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Beacon wire protocol.
//!
//! All messages are UDP datagrams whose second byte (offset 1) is the
//! message kind; the first byte is reserved and observed as `0`.
//!
//! ```text
//! DISCPROTO  0x00 0x00                                  client -> server
//! LISTPROTO  0x00 0x01 <protocol descriptors...>         server -> client
//! DISCPEER   0x00 0x02                                  client -> server
//! LISTPEER   0x00 0x03 <peer entry>*                     server -> client
//! HEARTBEAT  0x00 0x04 <public_key:32> <app_address:20>  client -> server
//! ```

use crate::buffer::ByteBuffer;
use std::net::{Ipv4Addr, SocketAddrV4};

/// Size of a public key payload (a standard public-key primitive).
pub const PUBLIC_KEY_LEN: usize = 32;
/// Size of an application-level address (account/contract-style identifier).
pub const APP_ADDRESS_LEN: usize = 20;
/// Wire size of a serialized `(family, IPv4, port)` socket address.
pub const SOCKET_ADDR_LEN: usize = 8;
/// Wire size of one LISTPEER entry (`address ‖ public_key ‖ app_address`).
pub const PEER_ENTRY_LEN: usize = SOCKET_ADDR_LEN + PUBLIC_KEY_LEN + APP_ADDRESS_LEN;
/// Max UDP payload a LISTPEER datagram is packed into.
pub const LISTPEER_DATAGRAM_CAP: usize = 1100;
/// Max peer entries that fit in one LISTPEER datagram after the 2-byte header.
pub const PEER_ENTRIES_PER_DATAGRAM: usize = (LISTPEER_DATAGRAM_CAP - 2) / PEER_ENTRY_LEN;

const AF_INET: u16 = 2;
const RESERVED_BYTE: u8 = 0x00;

/// Message kind carried in byte offset 1 of every datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    DiscProto,
    ListProto,
    DiscPeer,
    ListPeer,
    Heartbeat,
}

impl MessageKind {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::DiscProto),
            1 => Some(Self::ListProto),
            2 => Some(Self::DiscPeer),
            3 => Some(Self::ListPeer),
            4 => Some(Self::Heartbeat),
            _ => None,
        }
    }

    fn as_byte(self) -> u8 {
        match self {
            Self::DiscProto => 0,
            Self::ListProto => 1,
            Self::DiscPeer => 2,
            Self::ListPeer => 3,
            Self::Heartbeat => 4,
        }
    }
}

/// Parse the 2-byte header, returning the message kind. `None` if the
/// datagram is shorter than 2 bytes or the reserved byte / kind isn't
/// recognized; callers should log and drop on `None`.
pub fn parse_header(datagram: &[u8]) -> Option<MessageKind> {
    if datagram.len() < 2 {
        return None;
    }
    if datagram[0] != RESERVED_BYTE {
        return None;
    }
    MessageKind::from_byte(datagram[1])
}

/// Encode a bare 2-byte header (DISCPROTO / DISCPEER).
pub fn encode_header(kind: MessageKind) -> [u8; 2] {
    [RESERVED_BYTE, kind.as_byte()]
}

/// Encode an empty LISTPROTO: `0x00 0x01`. This is what the rendezvous
/// discovery server emits; richer payloads are a forward-compatible
/// extension (see [`encode_listproto`]).
pub fn encode_listproto_empty() -> [u8; 2] {
    encode_header(MessageKind::ListProto)
}

/// Wire size of one `(protocol_tag, offset, pub/sub port)` advertisement
/// triple: `u32 ‖ u16 ‖ u16`.
pub const PROTOCOL_ADVERTISEMENT_LEN: usize = 8;

/// Encode a populated LISTPROTO carrying protocol advertisement triples.
/// Used peer-to-peer, when a node answers another node's DISCPROTO with its
/// own `get_protocols()` — the rendezvous itself never emits this form.
pub fn encode_listproto(advertisements: &[crate::protocol::ProtocolAdvertisement]) -> Vec<u8> {
    let mut out = encode_header(MessageKind::ListProto).to_vec();
    for &(tag, offset, port) in advertisements {
        let mut entry = [0u8; PROTOCOL_ADVERTISEMENT_LEN];
        let mut buf = ByteBuffer::new(&mut entry);
        let ok = buf.write_uint32(0, tag) && buf.write_uint16(4, offset) && buf.write_uint16(6, port);
        debug_assert!(ok, "encode_listproto: fixed-size entry must fit its own fields");
        out.extend_from_slice(&entry);
    }
    out
}

/// Decode a LISTPROTO datagram's advertisement triples (header already
/// consumed by the caller via `parse_header`). Drops a trailing partial
/// triple rather than failing the whole datagram.
pub fn decode_listproto(datagram: &[u8]) -> Vec<crate::protocol::ProtocolAdvertisement> {
    let payload = &datagram[2.min(datagram.len())..];
    payload
        .chunks(PROTOCOL_ADVERTISEMENT_LEN)
        .filter(|chunk| chunk.len() == PROTOCOL_ADVERTISEMENT_LEN)
        .filter_map(|chunk| {
            let mut scratch = [0u8; PROTOCOL_ADVERTISEMENT_LEN];
            scratch.copy_from_slice(chunk);
            let buf = ByteBuffer::new(&mut scratch);
            let tag = buf.read_uint32(0)?;
            let offset = buf.read_uint16(4)?;
            let port = buf.read_uint16(6)?;
            Some((tag, offset, port))
        })
        .collect()
}

/// Encode a HEARTBEAT datagram: `0x00 0x04 ‖ public_key(32) ‖ app_address(20)`.
pub fn encode_heartbeat(public_key: &[u8; PUBLIC_KEY_LEN], app_address: &[u8; APP_ADDRESS_LEN]) -> [u8; 2 + PUBLIC_KEY_LEN + APP_ADDRESS_LEN] {
    let mut out = [0u8; 2 + PUBLIC_KEY_LEN + APP_ADDRESS_LEN];
    out[0..2].copy_from_slice(&encode_header(MessageKind::Heartbeat));
    out[2..2 + PUBLIC_KEY_LEN].copy_from_slice(public_key);
    out[2 + PUBLIC_KEY_LEN..].copy_from_slice(app_address);
    out
}

/// Decoded HEARTBEAT payload (header already consumed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatPayload {
    pub public_key: [u8; PUBLIC_KEY_LEN],
    pub app_address: [u8; APP_ADDRESS_LEN],
}

/// Decode a HEARTBEAT datagram's payload (expects the 2-byte header to have
/// already been validated by `parse_header`). Returns `None` if the datagram
/// isn't exactly 54 bytes.
pub fn decode_heartbeat(datagram: &[u8]) -> Option<HeartbeatPayload> {
    if datagram.len() != 2 + PUBLIC_KEY_LEN + APP_ADDRESS_LEN {
        return None;
    }
    let mut public_key = [0u8; PUBLIC_KEY_LEN];
    public_key.copy_from_slice(&datagram[2..2 + PUBLIC_KEY_LEN]);
    let mut app_address = [0u8; APP_ADDRESS_LEN];
    app_address.copy_from_slice(&datagram[2 + PUBLIC_KEY_LEN..]);
    Some(HeartbeatPayload {
        public_key,
        app_address,
    })
}

/// Serialize a `(family=AF_INET, IPv4, port)` tuple to 8 bytes. Family and
/// port are written in the host's native byte order, matching the
/// transport layer's convention in the reference implementation.
pub fn encode_socket_addr(addr: SocketAddrV4) -> [u8; SOCKET_ADDR_LEN] {
    let mut out = [0u8; SOCKET_ADDR_LEN];
    let mut buf = ByteBuffer::new(&mut out);
    let ok = buf.write_uint16(0, AF_INET) && buf.write(2, &addr.ip().octets()) && buf.write_uint16(6, addr.port());
    debug_assert!(ok, "encode_socket_addr: fixed-size buffer must fit its own fields");
    out
}

/// Parse an 8-byte `(family, IPv4, port)` tuple. Returns `None` for a
/// non-`AF_INET` family.
pub fn decode_socket_addr(bytes: &[u8; SOCKET_ADDR_LEN]) -> Option<SocketAddrV4> {
    let mut scratch = *bytes;
    let buf = ByteBuffer::new(&mut scratch);
    let family = buf.read_uint16(0)?;
    if family != AF_INET {
        return None;
    }
    let mut octets = [0u8; 4];
    if !buf.read(2, &mut octets) {
        return None;
    }
    let port = buf.read_uint16(6)?;
    Some(SocketAddrV4::new(Ipv4Addr::from(octets), port))
}

/// One LISTPEER entry: `remote_address(8) ‖ public_key(32) ‖ app_address(20)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerEntry {
    pub remote_address: SocketAddrV4,
    pub public_key: [u8; PUBLIC_KEY_LEN],
    pub app_address: [u8; APP_ADDRESS_LEN],
}

impl PeerEntry {
    /// Encode this entry into exactly `PEER_ENTRY_LEN` bytes.
    pub fn encode(&self) -> [u8; PEER_ENTRY_LEN] {
        let mut out = [0u8; PEER_ENTRY_LEN];
        out[0..SOCKET_ADDR_LEN].copy_from_slice(&encode_socket_addr(self.remote_address));
        out[SOCKET_ADDR_LEN..SOCKET_ADDR_LEN + PUBLIC_KEY_LEN].copy_from_slice(&self.public_key);
        out[SOCKET_ADDR_LEN + PUBLIC_KEY_LEN..].copy_from_slice(&self.app_address);
        out
    }

    /// Decode a `PEER_ENTRY_LEN`-byte slice. Returns `None` if the slice is
    /// the wrong length or the address family isn't `AF_INET`.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != PEER_ENTRY_LEN {
            return None;
        }
        let mut addr_bytes = [0u8; SOCKET_ADDR_LEN];
        addr_bytes.copy_from_slice(&bytes[0..SOCKET_ADDR_LEN]);
        let remote_address = decode_socket_addr(&addr_bytes)?;

        let mut public_key = [0u8; PUBLIC_KEY_LEN];
        public_key.copy_from_slice(&bytes[SOCKET_ADDR_LEN..SOCKET_ADDR_LEN + PUBLIC_KEY_LEN]);

        let mut app_address = [0u8; APP_ADDRESS_LEN];
        app_address.copy_from_slice(&bytes[SOCKET_ADDR_LEN + PUBLIC_KEY_LEN..]);

        Some(Self {
            remote_address,
            public_key,
            app_address,
        })
    }
}

/// Max peer entries that fit in a LISTPEER datagram capped at
/// `max_datagram_payload` bytes (header included). Always at least 1 — callers
/// validate `max_datagram_payload >= 2 + PEER_ENTRY_LEN` up front.
pub fn peer_entries_per_datagram(max_datagram_payload: usize) -> usize {
    (max_datagram_payload.saturating_sub(2) / PEER_ENTRY_LEN).max(1)
}

/// Pack `entries` into one or more LISTPEER datagrams, each carrying at most
/// `PEER_ENTRIES_PER_DATAGRAM` entries and sized `2 + 60*k`. Returns an empty
/// single datagram (`0x00 0x03`, no entries) when `entries` is empty — this
/// still counts as "one LISTPEER datagram" per the registration scenario.
pub fn encode_listpeer_datagrams(entries: &[PeerEntry]) -> Vec<Vec<u8>> {
    encode_listpeer_datagrams_capped(entries, LISTPEER_DATAGRAM_CAP)
}

/// Like `encode_listpeer_datagrams`, but packs at most
/// `peer_entries_per_datagram(max_datagram_payload)` entries per datagram
/// instead of the default `PEER_ENTRIES_PER_DATAGRAM`. This is the entry
/// point a server wires its configured `max_datagram_payload` through.
pub fn encode_listpeer_datagrams_capped(
    entries: &[PeerEntry],
    max_datagram_payload: usize,
) -> Vec<Vec<u8>> {
    if entries.is_empty() {
        return vec![encode_header(MessageKind::ListPeer).to_vec()];
    }

    let per_datagram = peer_entries_per_datagram(max_datagram_payload);
    entries
        .chunks(per_datagram)
        .map(|chunk| {
            let mut datagram = Vec::with_capacity(2 + chunk.len() * PEER_ENTRY_LEN);
            datagram.extend_from_slice(&encode_header(MessageKind::ListPeer));
            for entry in chunk {
                datagram.extend_from_slice(&entry.encode());
            }
            datagram
        })
        .collect()
}

/// Decode a LISTPEER datagram's entries (header already consumed by the
/// caller via `parse_header`). Drops a trailing partial entry rather than
/// failing the whole datagram, matching the "malformed -> drop that part"
/// failure posture of §7.
pub fn decode_listpeer_entries(datagram: &[u8]) -> Vec<PeerEntry> {
    let payload = &datagram[2.min(datagram.len())..];
    payload
        .chunks(PEER_ENTRY_LEN)
        .filter(|chunk| chunk.len() == PEER_ENTRY_LEN)
        .filter_map(PeerEntry::decode)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(a: u8, b: u8, c: u8, d: u8, port: u16) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(a, b, c, d), port)
    }

    #[test]
    fn socket_addr_round_trips() {
        let a = addr(127, 0, 0, 1, 9001);
        let encoded = encode_socket_addr(a);
        assert_eq!(encoded.len(), SOCKET_ADDR_LEN);
        assert_eq!(decode_socket_addr(&encoded), Some(a));
    }

    #[test]
    fn peer_entry_round_trips() {
        let entry = PeerEntry {
            remote_address: addr(127, 0, 0, 1, 9002),
            public_key: [0x02; PUBLIC_KEY_LEN],
            app_address: [0x09; APP_ADDRESS_LEN],
        };
        let encoded = entry.encode();
        assert_eq!(encoded.len(), PEER_ENTRY_LEN);
        assert_eq!(PeerEntry::decode(&encoded), Some(entry));
    }

    #[test]
    fn heartbeat_round_trips() {
        let key = [0x01u8; PUBLIC_KEY_LEN];
        let app = [0x02u8; APP_ADDRESS_LEN];
        let datagram = encode_heartbeat(&key, &app);
        assert_eq!(parse_header(&datagram), Some(MessageKind::Heartbeat));
        let decoded = decode_heartbeat(&datagram).unwrap();
        assert_eq!(decoded.public_key, key);
        assert_eq!(decoded.app_address, app);
    }

    #[test]
    fn unknown_kind_and_reserved_byte_are_rejected() {
        assert_eq!(parse_header(&[0x00, 0x09]), None);
        assert_eq!(parse_header(&[0x01, 0x00]), None);
        assert_eq!(parse_header(&[0x00]), None);
    }

    #[test]
    fn listpeer_packing_caps_entries_per_datagram() {
        assert_eq!(PEER_ENTRIES_PER_DATAGRAM, 18);

        let entries: Vec<PeerEntry> = (0..25)
            .map(|i| PeerEntry {
                remote_address: addr(10, 0, 0, i as u8, 9000 + i as u16),
                public_key: [i as u8; PUBLIC_KEY_LEN],
                app_address: [i as u8; APP_ADDRESS_LEN],
            })
            .collect();

        let datagrams = encode_listpeer_datagrams(&entries);
        assert_eq!(datagrams.len(), 2);
        assert_eq!(datagrams[0].len(), 2 + 18 * PEER_ENTRY_LEN);
        assert_eq!(datagrams[0].len(), 1082);
        assert_eq!(datagrams[1].len(), 2 + 7 * PEER_ENTRY_LEN);
        assert_eq!(datagrams[1].len(), 422);

        let mut round_tripped = Vec::new();
        for datagram in &datagrams {
            assert_eq!(parse_header(datagram), Some(MessageKind::ListPeer));
            round_tripped.extend(decode_listpeer_entries(datagram));
        }
        assert_eq!(round_tripped.len(), 25);
        assert_eq!(round_tripped, entries);
    }

    #[test]
    fn listproto_advertisement_round_trips() {
        let ads = vec![(crate::protocol::MASTER, 0u16, 9003u16)];
        let datagram = encode_listproto(&ads);
        assert_eq!(parse_header(&datagram), Some(MessageKind::ListProto));
        assert_eq!(decode_listproto(&datagram), ads);
    }

    #[test]
    fn empty_registry_yields_one_empty_listpeer_datagram() {
        let datagrams = encode_listpeer_datagrams(&[]);
        assert_eq!(datagrams.len(), 1);
        assert_eq!(datagrams[0], vec![0x00, 0x03]);
        assert!(decode_listpeer_entries(&datagrams[0]).is_empty());
    }

    #[test]
    fn configured_cap_changes_entries_per_datagram() {
        let entries: Vec<PeerEntry> = (0..5)
            .map(|i| PeerEntry {
                remote_address: addr(10, 0, 0, i as u8, 9000 + i as u16),
                public_key: [i as u8; PUBLIC_KEY_LEN],
                app_address: [i as u8; APP_ADDRESS_LEN],
            })
            .collect();

        // A cap that fits exactly 2 entries after the header.
        let cap = 2 + 2 * PEER_ENTRY_LEN;
        assert_eq!(peer_entries_per_datagram(cap), 2);

        let datagrams = encode_listpeer_datagrams_capped(&entries, cap);
        assert_eq!(datagrams.len(), 3);
        assert_eq!(datagrams[0].len(), 2 + 2 * PEER_ENTRY_LEN);
        assert_eq!(datagrams[1].len(), 2 + 2 * PEER_ENTRY_LEN);
        assert_eq!(datagrams[2].len(), 2 + 1 * PEER_ENTRY_LEN);

        let mut round_tripped = Vec::new();
        for datagram in &datagrams {
            round_tripped.extend(decode_listpeer_entries(datagram));
        }
        assert_eq!(round_tripped, entries);
    }

    #[test]
    fn cap_too_small_for_one_entry_still_packs_one() {
        // Below the validated minimum, but the packer itself never panics:
        // `ServerConfig::validate` is what rejects this before it reaches here.
        assert_eq!(peer_entries_per_datagram(2), 1);
    }
}
