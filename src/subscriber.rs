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

//! The subscription interface consumed by external visualizers.
//!
//! The core never performs real-time I/O. Instead, every protocol-visible
//! occurrence (a packet sent or received, a routing-table change, a
//! neighbor coming up or down, a DUAL state transition) is turned into a
//! [`SimEvent`] and handed to every registered [`Subscriber`] synchronously,
//! between event-queue steps, exactly as §5 requires ("drained between
//! events"). This is a plain trait object list, not a channel: the core has
//! no executor, and an async channel would need one.

use crate::types::{Cost, Prefix, RouterId, SimTime};

/// The kind of protocol-visible occurrence a [`SimEvent`] carries. Exactly
/// the ten variants named by the external-interfaces section of the spec.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimEventKind {
    /// A Hello was sent to `to`.
    HelloSent {
        /// Recipient of the Hello.
        to: RouterId,
    },
    /// A Hello was received from `from`.
    HelloRecv {
        /// Sender of the Hello.
        from: RouterId,
    },
    /// An Update entry for `prefix` was sent to `to`.
    UpdateSent {
        /// Recipient of the Update.
        to: RouterId,
        /// Prefix the entry advertises.
        prefix: Prefix,
        /// Metric carried by the entry.
        metric: Cost,
    },
    /// An Update entry for `prefix` was received from `from`.
    UpdateRecv {
        /// Sender of the Update.
        from: RouterId,
        /// Prefix the entry advertises.
        prefix: Prefix,
        /// Metric carried by the entry.
        metric: Cost,
    },
    /// A neighbor transitioned to the Up state.
    NeighborUp {
        /// Neighbor that came up.
        neighbor: RouterId,
    },
    /// A neighbor transitioned to the Down state.
    NeighborDown {
        /// Neighbor that went down.
        neighbor: RouterId,
    },
    /// A route was installed or changed in the routing table.
    RouteInstalled {
        /// Destination prefix.
        prefix: Prefix,
        /// Newly installed next hop.
        next_hop: RouterId,
        /// Newly installed metric.
        metric: Cost,
    },
    /// A route was withdrawn from the routing table.
    RouteWithdrawn {
        /// Destination prefix.
        prefix: Prefix,
    },
    /// A prefix's DUAL state machine entered the Active state.
    DualActive {
        /// Prefix whose diffusing computation began.
        prefix: Prefix,
    },
    /// A prefix's DUAL state machine returned to the Passive state.
    DualPassive {
        /// Prefix whose diffusing computation collapsed.
        prefix: Prefix,
    },
}

/// A single, timestamped, router-attributed protocol occurrence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimEvent {
    /// Simulated time the event occurred.
    pub timestamp: SimTime,
    /// Router the event is attributed to (the sender for `*Sent`/install
    /// events, the receiver for `*Recv` events).
    pub router: RouterId,
    /// The occurrence itself.
    pub kind: SimEventKind,
}

/// Receives [`SimEvent`]s from the [`Scheduler`](crate::scheduler::Scheduler)
/// as they happen. Implementations must not block: the core dispatches
/// events synchronously between steps of its own event loop.
pub trait Subscriber {
    /// Called once per emitted event, in the order the events occurred.
    fn notify(&mut self, event: SimEvent);
}

/// The default, dependency-free [`Subscriber`]: appends every event to an
/// in-memory `Vec` a test or an external visualizer can poll or drain.
#[derive(Debug, Clone, Default)]
pub struct ChannelSubscriber {
    events: Vec<SimEvent>,
}

impl ChannelSubscriber {
    /// Construct an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events collected so far, oldest first.
    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    /// Remove and return all collected events, oldest first.
    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Subscriber for ChannelSubscriber {
    fn notify(&mut self, event: SimEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::graph::NodeIndex;

    fn rid(i: u32) -> RouterId {
        NodeIndex::new(i as usize)
    }

    #[test]
    fn channel_subscriber_preserves_order() {
        let mut sub = ChannelSubscriber::new();
        sub.notify(SimEvent { timestamp: SimTime::ZERO, router: rid(1), kind: SimEventKind::NeighborUp { neighbor: rid(2) } });
        sub.notify(SimEvent { timestamp: SimTime::from_secs(1), router: rid(1), kind: SimEventKind::NeighborDown { neighbor: rid(2) } });
        assert_eq!(sub.events().len(), 2);
        let drained = sub.drain();
        assert!(sub.events().is_empty());
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0].kind, SimEventKind::NeighborUp { .. }));
    }
}
