// Snowcap: Synthesizing Network-Wide Configuration Updates
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Hello and Update packet codec.
//!
//! Encoding is big-endian and bit-packed where fields are sub-byte. Every
//! frame carries a 16-bit one's-complement checksum, computed over the
//! whole frame with the checksum field itself treated as zero, exactly like
//! the IPv4/UDP checksum.
//!
//! ```rust
//! use adup::codec::{Codec, Packet, HelloPacket};
//! use adup::types::LinkMetrics;
//!
//! let hello = Packet::Hello(HelloPacket {
//!     metrics: LinkMetrics { delay_us: 1000, jitter_us: 10, loss_permille: 0,
//!         congestion_pct: 0, stability: 100 },
//! });
//! let bytes = Codec::encode(&hello).unwrap();
//! assert_eq!(bytes.len(), 12);
//! assert_eq!(Codec::decode(&bytes).unwrap(), hello);
//! ```

use crate::error::ParseError;
use crate::types::{Cost, LinkMetrics, Prefix};

const VERSION: u8 = 1;
const OPCODE_HELLO: u8 = 1;
const OPCODE_UPDATE: u8 = 2;
const HELLO_LEN: usize = 12;
const UPDATE_HEADER_LEN: usize = 4;
const ROUTE_ENTRY_LEN: usize = 20;
/// Default MTU used when a [`Codec`] is constructed via [`Codec::new`].
pub const DEFAULT_MTU: usize = 1500;

/// A single entry inside an [`UpdatePacket`]: the advertised route and
/// composite metrics for one prefix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteEntry {
    /// Destination prefix.
    pub prefix: Prefix,
    /// Raw per-link metrics as measured on the advertising link.
    pub metrics: LinkMetrics,
    /// Reported composite distance (RD) for this prefix.
    pub reported_distance: Cost,
}

/// Contents of a Hello frame: the sender's current outbound link metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HelloPacket {
    /// Metrics of the link the Hello is sent on.
    pub metrics: LinkMetrics,
}

/// Contents of an Update frame: zero or more [`RouteEntry`] advertisements.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePacket {
    /// Advertised route entries.
    pub entries: Vec<RouteEntry>,
}

/// A decoded ADUP packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Neighbor-discovery / keepalive frame.
    Hello(HelloPacket),
    /// Route advertisement, query, reply, or withdrawal frame.
    Update(UpdatePacket),
}

/// Stateless Hello/Update codec, parameterized by an MTU.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    mtu: usize,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec {
    /// Construct a codec using [`DEFAULT_MTU`].
    pub fn new() -> Self {
        Self { mtu: DEFAULT_MTU }
    }

    /// Construct a codec with a custom MTU.
    pub fn with_mtu(mtu: usize) -> Self {
        Self { mtu }
    }

    /// Encode `packet` into its wire representation.
    pub fn encode(packet: &Packet) -> Result<Vec<u8>, ParseError> {
        Self::new().encode_checked(packet)
    }

    /// Decode a wire frame into a [`Packet`], validating against [`DEFAULT_MTU`].
    pub fn decode(bytes: &[u8]) -> Result<Packet, ParseError> {
        Self::new().decode_checked(bytes)
    }

    /// Encode `packet`, rejecting frames that would exceed this codec's MTU.
    pub fn encode_checked(&self, packet: &Packet) -> Result<Vec<u8>, ParseError> {
        let bytes = match packet {
            Packet::Hello(hello) => encode_hello(hello),
            Packet::Update(update) => encode_update(update),
        };
        if bytes.len() > self.mtu {
            return Err(ParseError::MtuExceeded { len: bytes.len(), mtu: self.mtu });
        }
        Ok(bytes)
    }

    /// Decode `bytes`, rejecting frames that exceed this codec's MTU.
    pub fn decode_checked(&self, bytes: &[u8]) -> Result<Packet, ParseError> {
        if bytes.len() > self.mtu {
            return Err(ParseError::MtuExceeded { len: bytes.len(), mtu: self.mtu });
        }
        let opcode = peek_opcode(bytes)?;
        match opcode {
            OPCODE_HELLO => decode_hello(bytes).map(Packet::Hello),
            OPCODE_UPDATE => decode_update(bytes).map(Packet::Update),
            other => Err(ParseError::UnknownOpCode(other)),
        }
    }
}

fn peek_opcode(bytes: &[u8]) -> Result<u8, ParseError> {
    let byte0 = *bytes.first().ok_or(ParseError::Truncated)?;
    Ok(byte0 & 0x0f)
}

fn encode_hello(hello: &HelloPacket) -> Vec<u8> {
    let mut buf = vec![0u8; HELLO_LEN];
    buf[0] = (VERSION << 4) | OPCODE_HELLO;
    buf[1] = 0; // reserved
    buf[2..4].copy_from_slice(&hello.metrics.delay_us.to_be_bytes());
    buf[4..6].copy_from_slice(&hello.metrics.jitter_us.to_be_bytes());
    buf[6] = hello.metrics.loss_permille;
    buf[7] = hello.metrics.congestion_pct;
    buf[8..10].copy_from_slice(&hello.metrics.stability.to_be_bytes());
    // checksum field (10..12) left zero while computing
    let sum = checksum16(&buf);
    buf[10..12].copy_from_slice(&sum.to_be_bytes());
    buf
}

fn decode_hello(bytes: &[u8]) -> Result<HelloPacket, ParseError> {
    if bytes.len() != HELLO_LEN {
        return Err(ParseError::Truncated);
    }
    let version = bytes[0] >> 4;
    if version != VERSION {
        return Err(ParseError::UnsupportedVersion(version));
    }
    verify_checksum(bytes, 10)?;
    let metrics = LinkMetrics {
        delay_us: u16::from_be_bytes([bytes[2], bytes[3]]),
        jitter_us: u16::from_be_bytes([bytes[4], bytes[5]]),
        loss_permille: bytes[6],
        congestion_pct: bytes[7],
        stability: u16::from_be_bytes([bytes[8], bytes[9]]),
    };
    Ok(HelloPacket { metrics })
}

fn encode_update(update: &UpdatePacket) -> Vec<u8> {
    let mut buf = vec![0u8; UPDATE_HEADER_LEN + update.entries.len() * ROUTE_ENTRY_LEN];
    buf[0] = (VERSION << 4) | OPCODE_UPDATE;
    buf[1] = 0; // reserved
    // checksum field (2..4) left zero while computing

    for (i, entry) in update.entries.iter().enumerate() {
        let base = UPDATE_HEADER_LEN + i * ROUTE_ENTRY_LEN;
        buf[base] = entry.prefix.length;
        buf[base + 1..base + 4].copy_from_slice(&[0, 0, 0]); // reserved
        buf[base + 4..base + 8].copy_from_slice(&entry.prefix.address.to_be_bytes());
        buf[base + 8..base + 10].copy_from_slice(&entry.metrics.delay_us.to_be_bytes());
        buf[base + 10..base + 12].copy_from_slice(&entry.metrics.jitter_us.to_be_bytes());
        buf[base + 12] = entry.metrics.loss_permille;
        buf[base + 13] = entry.metrics.congestion_pct;
        buf[base + 14..base + 16].copy_from_slice(&entry.metrics.stability.to_be_bytes());
        buf[base + 16..base + 20].copy_from_slice(&encode_cost(entry.reported_distance).to_be_bytes());
    }

    let sum = checksum16(&buf);
    buf[2..4].copy_from_slice(&sum.to_be_bytes());
    buf
}

fn decode_update(bytes: &[u8]) -> Result<UpdatePacket, ParseError> {
    if bytes.len() < UPDATE_HEADER_LEN {
        return Err(ParseError::Truncated);
    }
    let version = bytes[0] >> 4;
    if version != VERSION {
        return Err(ParseError::UnsupportedVersion(version));
    }
    let body_len = bytes.len() - UPDATE_HEADER_LEN;
    if body_len % ROUTE_ENTRY_LEN != 0 {
        return Err(ParseError::Truncated);
    }
    verify_checksum(bytes, 2)?;

    let n = body_len / ROUTE_ENTRY_LEN;
    let mut entries = Vec::with_capacity(n);
    for i in 0..n {
        let base = UPDATE_HEADER_LEN + i * ROUTE_ENTRY_LEN;
        let prefix_length = bytes[base];
        let address = u32::from_be_bytes([
            bytes[base + 4],
            bytes[base + 5],
            bytes[base + 6],
            bytes[base + 7],
        ]);
        let metrics = LinkMetrics {
            delay_us: u16::from_be_bytes([bytes[base + 8], bytes[base + 9]]),
            jitter_us: u16::from_be_bytes([bytes[base + 10], bytes[base + 11]]),
            loss_permille: bytes[base + 12],
            congestion_pct: bytes[base + 13],
            stability: u16::from_be_bytes([bytes[base + 14], bytes[base + 15]]),
        };
        let rd_raw = u32::from_be_bytes([
            bytes[base + 16],
            bytes[base + 17],
            bytes[base + 18],
            bytes[base + 19],
        ]);
        entries.push(RouteEntry {
            prefix: Prefix::new(address, prefix_length),
            metrics,
            reported_distance: decode_cost(rd_raw),
        });
    }
    Ok(UpdatePacket { entries })
}

/// Verify the checksum of `bytes`, whose checksum field occupies bytes
/// `[checksum_offset, checksum_offset + 2)`.
fn verify_checksum(bytes: &[u8], checksum_offset: usize) -> Result<(), ParseError> {
    let mut zeroed = bytes.to_vec();
    let received = u16::from_be_bytes([bytes[checksum_offset], bytes[checksum_offset + 1]]);
    zeroed[checksum_offset..checksum_offset + 2].copy_from_slice(&[0, 0]);
    if checksum16(&zeroed) != received {
        return Err(ParseError::BadChecksum);
    }
    Ok(())
}

/// 16-bit one's-complement sum of all 16-bit big-endian words of `bytes`.
fn checksum16(bytes: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = bytes.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

const RESERVED_COST_ENCODING: u32 = u32::MAX;
const COST_SCALE: f64 = 1000.0;

/// Encode a [`Cost`] as a fixed-point `u32`, reserving the all-ones pattern
/// for infinity and saturating on overflow rather than wrapping.
fn encode_cost(cost: Cost) -> u32 {
    if cost.is_infinite() {
        return RESERVED_COST_ENCODING;
    }
    let scaled = (cost.0 * COST_SCALE).round();
    if scaled >= (RESERVED_COST_ENCODING - 1) as f64 {
        RESERVED_COST_ENCODING - 1
    } else {
        scaled as u32
    }
}

/// Decode a fixed-point `u32` back into a [`Cost`].
fn decode_cost(raw: u32) -> Cost {
    if raw == RESERVED_COST_ENCODING {
        Cost::INFINITE
    } else {
        Cost::new(raw as f64 / COST_SCALE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metrics() -> LinkMetrics {
        LinkMetrics { delay_us: 1000, jitter_us: 10, loss_permille: 0, congestion_pct: 0, stability: 100 }
    }

    #[test]
    fn hello_round_trips() {
        let hello = Packet::Hello(HelloPacket { metrics: sample_metrics() });
        let bytes = Codec::encode(&hello).unwrap();
        assert_eq!(bytes.len(), HELLO_LEN);
        assert_eq!(Codec::decode(&bytes).unwrap(), hello);
    }

    #[test]
    fn update_round_trips_with_multiple_entries() {
        let update = Packet::Update(UpdatePacket {
            entries: vec![
                RouteEntry {
                    prefix: Prefix::new(0xc0a80100, 24),
                    metrics: sample_metrics(),
                    reported_distance: Cost::new(42.5),
                },
                RouteEntry {
                    prefix: Prefix::new(0xc0a80300, 24),
                    metrics: sample_metrics(),
                    reported_distance: Cost::INFINITE,
                },
            ],
        });
        let bytes = Codec::encode(&update).unwrap();
        assert_eq!(bytes.len(), UPDATE_HEADER_LEN + 2 * ROUTE_ENTRY_LEN);
        assert_eq!(Codec::decode(&bytes).unwrap(), update);
    }

    #[test]
    fn empty_update_round_trips() {
        let update = Packet::Update(UpdatePacket { entries: vec![] });
        let bytes = Codec::encode(&update).unwrap();
        assert_eq!(bytes.len(), UPDATE_HEADER_LEN);
        assert_eq!(Codec::decode(&bytes).unwrap(), update);
    }

    #[test]
    fn rejects_bad_checksum() {
        let hello = Packet::Hello(HelloPacket { metrics: sample_metrics() });
        let mut bytes = Codec::encode(&hello).unwrap();
        bytes[2] ^= 0x01; // flip a bit in the delay field
        assert_eq!(Codec::decode(&bytes), Err(ParseError::BadChecksum));
    }

    #[test]
    fn rejects_unsupported_version() {
        let hello = Packet::Hello(HelloPacket { metrics: sample_metrics() });
        let mut bytes = Codec::encode(&hello).unwrap();
        bytes[0] = (2 << 4) | OPCODE_HELLO;
        assert_eq!(Codec::decode(&bytes), Err(ParseError::UnsupportedVersion(2)));
    }

    #[test]
    fn rejects_truncated_hello() {
        let hello = Packet::Hello(HelloPacket { metrics: sample_metrics() });
        let bytes = Codec::encode(&hello).unwrap();
        assert_eq!(Codec::decode(&bytes[..HELLO_LEN - 1]), Err(ParseError::Truncated));
    }

    #[test]
    fn rejects_update_with_non_integral_entries() {
        let update = Packet::Update(UpdatePacket { entries: vec![] });
        let mut bytes = Codec::encode(&update).unwrap();
        bytes.extend_from_slice(&[0u8; 5]); // not a multiple of 20
        assert_eq!(Codec::decode(&bytes), Err(ParseError::Truncated));
    }

    #[test]
    fn rejects_mtu_exceeded() {
        let many_entries = (0..100)
            .map(|i| RouteEntry {
                prefix: Prefix::new(i, 24),
                metrics: sample_metrics(),
                reported_distance: Cost::new(1.0),
            })
            .collect();
        let update = Packet::Update(UpdatePacket { entries: many_entries });
        let codec = Codec::with_mtu(100);
        assert!(matches!(codec.encode_checked(&update), Err(ParseError::MtuExceeded { .. })));
    }

    #[test]
    fn cost_encoding_saturates_near_infinite() {
        let huge = Cost::new(f64::MAX / 2.0);
        assert_eq!(encode_cost(huge), RESERVED_COST_ENCODING - 1);
        assert_eq!(encode_cost(Cost::INFINITE), RESERVED_COST_ENCODING);
        assert!(decode_cost(RESERVED_COST_ENCODING).is_infinite());
    }
}
