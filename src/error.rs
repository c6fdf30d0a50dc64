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

//! Error taxonomy for the ADUP core.
//!
//! Packet-level errors ([`ParseError`]) and topology-level errors
//! ([`TopologyError`]) are local and recoverable: the caller logs and drops
//! the offending packet, and the simulation continues. DUAL invariant
//! violations and scheduler errors are not recoverable: they indicate a bug
//! in this crate, and the simulation halts rather than risk silently
//! producing a wrong routing table.

use crate::types::{Cost, Prefix, RouterId, SimTime};
use thiserror::Error;

/// Errors raised while decoding a Hello or Update frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// The recomputed one's-complement checksum does not match the frame.
    #[error("bad checksum")]
    BadChecksum,
    /// The version nibble was not `1`.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),
    /// The opcode nibble was neither `1` (Hello) nor `2` (Update).
    #[error("unknown opcode: {0}")]
    UnknownOpCode(u8),
    /// The frame length does not match the expected fixed or modular size.
    #[error("truncated frame")]
    Truncated,
    /// The frame exceeds the configured MTU.
    #[error("frame of {len} bytes exceeds MTU of {mtu} bytes")]
    MtuExceeded {
        /// Length of the offending frame, in bytes.
        len: usize,
        /// Configured MTU, in bytes.
        mtu: usize,
    },
}

/// Errors raised while mutating the [`TopologyTable`](crate::topology::TopologyTable).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyError {
    /// An operation referenced a neighbor that is not in the neighbor table.
    #[error("unknown neighbor: {0:?}")]
    UnknownNeighbor(RouterId),
    /// A link between the same pair of routers was added twice.
    #[error("duplicate link: {0:?} <-> {1:?}")]
    DuplicateLink(RouterId, RouterId),
}

/// A violation of one of DUAL's core invariants. Fatal: the simulation halts.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum DualInvariantViolation {
    /// The Feasible Distance increased while the prefix was Passive.
    #[error("feasible distance increased in Passive state for {prefix:?}: {old:?} -> {new:?}")]
    FeasibleDistanceIncreasedInPassive {
        /// Prefix for which the invariant broke.
        prefix: Prefix,
        /// Feasible Distance before the offending transition.
        old: Cost,
        /// Feasible Distance after the offending transition.
        new: Cost,
    },
    /// A prefix entered Active with no neighbors to query.
    #[error("prefix {prefix:?} entered Active state with no neighbors")]
    ActiveWithNoNeighbors {
        /// Prefix for which the invariant broke.
        prefix: Prefix,
    },
    /// The outstanding-replies bookkeeping for a prefix went negative.
    #[error("negative replies_outstanding for {prefix:?}")]
    NegativeRepliesOutstanding {
        /// Prefix for which the invariant broke.
        prefix: Prefix,
    },
}

/// A scheduler-level error. Fatal: the simulation halts.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum SchedulerError {
    /// An event was scheduled at a time strictly before the current clock.
    #[error("event scheduled at {scheduled:?}, but clock is already at {now:?}")]
    PastDatedEvent {
        /// Current simulated time.
        now: SimTime,
        /// The (invalid) time the event was scheduled for.
        scheduled: SimTime,
    },
}

/// Crate-wide error type, aggregating every error taxonomy above.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdupError {
    /// Error while parsing a wire frame.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    /// Error while mutating topology state.
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),
    /// A DUAL invariant was violated; the simulation is halted.
    #[error("DUAL invariant violated: {0}")]
    DualInvariant(#[from] DualInvariantViolation),
    /// A scheduler-level invariant was violated; the simulation is halted.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
    /// A router referenced in a control operation does not exist.
    #[error("unknown router: {0:?}")]
    UnknownRouter(RouterId),
    /// A router name passed to a lookup does not exist.
    #[error("unknown router name: {0}")]
    UnknownRouterName(String),
}
