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

#![deny(missing_docs)]

//! # ADUP: Advanced Diffusing Update Protocol
//!
//! This is the core of a distance-vector routing protocol that combines
//! the Diffusing Update Algorithm (DUAL) for loop-free convergence with a
//! Multi-Armed Bandit (MAB) learner for tie-breaking among equal-cost
//! paths, simulated over a discrete-event network of routers.
//!
//! ## Problem statement
//!
//! Given a network of routers connected by links with measured
//! `(delay, jitter, loss, congestion, stability)` characteristics, compute
//! and maintain, per destination prefix, a loop-free next hop at every
//! router — converging quickly after a link failure, and breaking ties
//! among equally-good paths by learning which one performs best in
//! practice rather than picking arbitrarily.
//!
//! ## Structure
//!
//! - **[`types`]**: base type definitions (`RouterId`, `Prefix`,
//!   `LinkMetrics`, `Cost`, `SimTime`) shared across the crate.
//! - **[`codec`]**: the Hello/Update wire format — encode, decode, and
//!   checksum.
//! - **[`metric`]**: composes raw link metrics into a single scalar
//!   [`types::Cost`] under configured weights.
//! - **[`topology`]**: the per-destination [`topology::TopologyTable`],
//!   searching for feasible successors.
//! - **[`dual`]**: the per-prefix DUAL finite state machine.
//! - **[`mab`]**: the ε-greedy [`mab::Mab`] tie-breaker consulted when DUAL
//!   reports more than one feasible successor.
//! - **[`router`]**: [`router::Router`] — owns one router's neighbor,
//!   topology, DUAL, and routing tables, and its periodic timers.
//! - **[`scheduler`]**: [`scheduler::Scheduler`] — the discrete-event
//!   simulator that owns the clock, the event queue, and the physical link
//!   graph tying every router together.
//! - **[`subscriber`]**: the append-only event stream external
//!   visualizers consume ([`subscriber::Subscriber`],
//!   [`subscriber::SimEvent`]).
//! - **[`error`]**: the crate-wide error taxonomy ([`error::AdupError`]).
//!
//! This crate deliberately stops at the core: desktop/web visualization,
//! configuration-file parsing, CLI argument parsing, and bindings to real
//! network interfaces are all external collaborators consuming this crate
//! through the subscription and control interfaces above.
//!
//! ## Usage
//!
//! ```rust
//! use adup::scheduler::Scheduler;
//! use adup::types::{LinkMetrics, Prefix, SimTime};
//! use std::time::Duration;
//!
//! let mut net = Scheduler::new(42);
//! let r1 = net.add_router("R1");
//! let r2 = net.add_router("R2");
//!
//! let metrics = LinkMetrics { delay_us: 1000, jitter_us: 10, loss_permille: 0,
//!     congestion_pct: 0, stability: 100 };
//! net.add_link(r1, r2, metrics, metrics, Duration::from_millis(10), 0.0).unwrap();
//! net.originate_prefix(r2, Prefix::new(0xc0a80200, 24)).unwrap();
//!
//! net.run_until(SimTime::from_secs(60)).unwrap();
//!
//! assert!(net.router(r1).unwrap().routing_table().iter().any(|r| r.prefix == Prefix::new(0xc0a80200, 24)));
//! ```

pub mod codec;
pub mod dual;
pub mod error;
pub mod mab;
pub mod metric;
pub mod router;
pub mod scheduler;
pub mod subscriber;
pub mod topology;
pub mod types;

pub use error::AdupError;
