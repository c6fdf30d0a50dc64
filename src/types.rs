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

//! Module containing the base type definitions shared across the crate.

use petgraph::graph::NodeIndex;
use std::ops::Add;
use std::time::Duration;

/// Router identifier. This is the index of the router's node in the
/// [`Scheduler`](crate::scheduler::Scheduler)'s topology graph, not an
/// independently allocated value.
pub type RouterId = NodeIndex<u32>;

/// `(address, prefix_length)`. Identifies a destination network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Prefix {
    /// 32-bit network address.
    pub address: u32,
    /// Prefix length, in `[0, 32]`.
    pub length: u8,
}

impl Prefix {
    /// Construct a new prefix.
    pub fn new(address: u32, length: u8) -> Self {
        debug_assert!(length <= 32, "prefix length must be at most 32");
        Self { address, length }
    }
}

impl std::fmt::Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}/{}",
            (self.address >> 24) & 0xff,
            (self.address >> 16) & 0xff,
            (self.address >> 8) & 0xff,
            self.address & 0xff,
            self.length
        )
    }
}

/// Simulated time, in milliseconds since the start of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(pub u64);

impl SimTime {
    /// The start of the simulation.
    pub const ZERO: SimTime = SimTime(0);

    /// Construct a `SimTime` from a whole number of seconds.
    pub fn from_secs(secs: u64) -> Self {
        SimTime(secs * 1000)
    }

    /// Construct a `SimTime` from a `Duration`, truncated to millisecond resolution.
    pub fn from_duration(d: Duration) -> Self {
        SimTime(d.as_millis() as u64)
    }

    /// The underlying number of milliseconds.
    pub fn as_millis(self) -> u64 {
        self.0
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> SimTime {
        SimTime(self.0 + rhs.as_millis() as u64)
    }
}

impl Add<u64> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: u64) -> SimTime {
        SimTime(self.0 + rhs)
    }
}

/// Per-link metrics measured or configured on an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkMetrics {
    /// One-way propagation delay, in microseconds.
    pub delay_us: u16,
    /// Delay variation, in microseconds.
    pub jitter_us: u16,
    /// Packet loss, in permille (parts per thousand).
    pub loss_permille: u8,
    /// Link congestion, as a percentage.
    pub congestion_pct: u8,
    /// Stability score; higher means more stable.
    pub stability: u16,
}

/// Weights used to compose [`LinkMetrics`] into a scalar [`Cost`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    /// Weight applied to `delay_us`.
    pub w_delay: f64,
    /// Weight applied to `jitter_us`.
    pub w_jitter: f64,
    /// Weight applied to `loss_permille`.
    pub w_loss: f64,
    /// Weight applied to `congestion_pct`.
    pub w_congestion: f64,
    /// Weight applied to `stability` (subtracted).
    pub w_stability: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self { w_delay: 1.0, w_jitter: 0.5, w_loss: 10.0, w_congestion: 1.0, w_stability: 0.1 }
    }
}

/// Non-negative composite routing cost, or [`Cost::INFINITE`] to mean unreachable.
///
/// `Cost` wraps `f64` rather than deriving `Eq`/`Hash`: composite costs are
/// compared and summed, never used as hash keys. Saturating addition and the
/// reserved infinite value are the only two departures from plain `f64`
/// arithmetic that the protocol cares about.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Cost(pub f64);

impl Cost {
    /// The reserved "unreachable" cost.
    pub const INFINITE: Cost = Cost(f64::INFINITY);

    /// Zero cost.
    pub const ZERO: Cost = Cost(0.0);

    /// Construct a cost, clamping negative values at zero.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Cost::INFINITE
        } else if value < 0.0 {
            Cost::ZERO
        } else {
            Cost(value)
        }
    }

    /// True if this cost represents unreachability.
    pub fn is_infinite(self) -> bool {
        self.0.is_infinite()
    }

    /// Saturating addition: adding to an infinite cost stays infinite, and the
    /// result never overflows into a negative or NaN value.
    pub fn add_saturating(self, rhs: Cost) -> Cost {
        Cost::new(self.0 + rhs.0)
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        self.add_saturating(rhs)
    }
}

impl Eq for Cost {}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(std::cmp::Ordering::Equal)
    }
}

impl std::fmt::Display for Cost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_infinite() {
            write!(f, "inf")
        } else {
            write!(f, "{:.3}", self.0)
        }
    }
}
