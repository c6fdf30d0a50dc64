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

//! The per-prefix DUAL finite state machine.
//!
//! [`Dual`] holds one [`DualState`] per destination prefix and is a pure
//! state machine: it borrows the [`TopologyTable`] and the caller's current
//! view of which neighbors are Up, and returns a list of [`DualIntent`]
//! values describing what should happen next. It never touches the routing
//! table, the MAB tie-breaker, or the event queue directly — the
//! [`Router`](crate::router::Router) owns those and applies the intents.
//! This indirection exists so `Dual` and `Router` do not need back-pointers
//! into each other.

use crate::error::DualInvariantViolation;
use crate::types::{Cost, Prefix, RouterId, SimTime};
use crate::topology::TopologyTable;
use std::collections::{HashMap, HashSet};

/// Who triggered a prefix's entry into the Active state. Determines who
/// receives the direct Reply when the diffusing computation collapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOrigin {
    /// A local event (link cost change, neighbor loss with no other trigger).
    SelfInitiated,
    /// An Update received from this neighbor caused the transition.
    Neighbor(RouterId),
}

#[derive(Debug, Clone)]
enum DualState {
    Passive {
        fd: Cost,
        successors: Vec<RouterId>,
    },
    Active {
        /// FD as of the moment this prefix left Passive; used to answer
        /// queries that arrive mid-computation without disturbing it.
        frozen_fd: Cost,
        replies_outstanding: HashSet<RouterId>,
        query_origin: QueryOrigin,
        entered_at: SimTime,
    },
}

impl Default for DualState {
    fn default() -> Self {
        DualState::Passive { fd: Cost::INFINITE, successors: Vec::new() }
    }
}

/// Destination of an [`DualIntent::EmitUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTarget {
    /// Every Up neighbor.
    All,
    /// A single neighbor.
    Neighbor(RouterId),
    /// Every Up neighbor except the named one.
    AllExcept(RouterId),
}

/// An action `Dual` asks the [`Router`](crate::router::Router) to perform.
/// `Dual` never mutates routing, neighbor, or event-queue state itself.
#[derive(Debug, Clone)]
pub enum DualIntent {
    /// Install `metric` for `prefix` via one of `candidates`. When
    /// `candidates.len() > 1` the Router consults the MAB tie-breaker to
    /// pick the next hop; DUAL correctness only requires that every
    /// candidate is feasible, not which one is finally chosen.
    ReportSuccessors { prefix: Prefix, candidates: Vec<RouterId>, metric: Cost },
    /// `prefix` is no longer reachable; remove it from the routing table.
    WithdrawRoute { prefix: Prefix },
    /// Send an Update entry for `prefix` carrying `metric`.
    EmitUpdate { prefix: Prefix, to: UpdateTarget, metric: Cost },
    /// `prefix` just transitioned Passive -> Active.
    BeginActive { prefix: Prefix },
    /// `prefix` just transitioned Active -> Passive.
    EndActive { prefix: Prefix },
}

/// Per-router collection of per-prefix DUAL state machines.
#[derive(Debug, Clone, Default)]
pub struct Dual {
    states: HashMap<Prefix, DualState>,
}

impl Dual {
    /// Construct an empty set of DUAL instances.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `prefix` is currently in the Active state.
    pub fn is_active(&self, prefix: Prefix) -> bool {
        matches!(self.states.get(&prefix), Some(DualState::Active { .. }))
    }

    /// The Feasible Distance currently advertised for `prefix`, or infinite
    /// if the prefix has never been learned.
    pub fn feasible_distance(&self, prefix: Prefix) -> Cost {
        match self.states.get(&prefix) {
            Some(DualState::Passive { fd, .. }) => *fd,
            _ => Cost::INFINITE,
        }
    }

    /// The current feasible successor set for `prefix`. Empty if the prefix
    /// is unknown, unreachable, or currently Active — successors are frozen
    /// mid-computation until the diffusing computation collapses back to
    /// Passive.
    pub fn successors(&self, prefix: Prefix) -> &[RouterId] {
        match self.states.get(&prefix) {
            Some(DualState::Passive { successors, .. }) => successors,
            _ => &[],
        }
    }

    fn passive_snapshot(&self, prefix: Prefix) -> (Cost, Vec<RouterId>) {
        match self.states.get(&prefix) {
            Some(DualState::Passive { fd, successors }) => (*fd, successors.clone()),
            _ => (Cost::INFINITE, Vec::new()),
        }
    }

    /// Handle an Update entry received from `from` for `prefix`. The caller
    /// must have already reflected the new reported distance (or the
    /// withdrawal) in `topology` before calling this.
    pub fn on_update(
        &mut self,
        prefix: Prefix,
        from: RouterId,
        topology: &TopologyTable,
        up_neighbors: &[RouterId],
        now: SimTime,
    ) -> Result<Vec<DualIntent>, DualInvariantViolation> {
        let is_reply = match self.states.get_mut(&prefix) {
            Some(DualState::Active { replies_outstanding, .. }) => replies_outstanding.remove(&from),
            _ => false,
        };

        if is_reply {
            return self.resolve_if_all_replied(prefix, topology, up_neighbors, now);
        }

        match self.states.get(&prefix) {
            Some(DualState::Active { frozen_fd, .. }) => {
                let fd = *frozen_fd;
                Ok(vec![DualIntent::EmitUpdate { prefix, to: UpdateTarget::Neighbor(from), metric: fd }])
            }
            _ => self.recompute_passive(prefix, QueryOrigin::Neighbor(from), topology, up_neighbors, now),
        }
    }

    /// Handle `neighbor` transitioning to Down. The caller must have already
    /// removed `neighbor`'s topology entries before calling this.
    pub fn on_neighbor_down(
        &mut self,
        prefix: Prefix,
        neighbor: RouterId,
        topology: &TopologyTable,
        up_neighbors: &[RouterId],
        now: SimTime,
    ) -> Result<Vec<DualIntent>, DualInvariantViolation> {
        let is_reply = match self.states.get_mut(&prefix) {
            Some(DualState::Active { replies_outstanding, .. }) => replies_outstanding.remove(&neighbor),
            _ => false,
        };

        if is_reply {
            return self.resolve_if_all_replied(prefix, topology, up_neighbors, now);
        }

        match self.states.get(&prefix) {
            Some(DualState::Active { .. }) => Ok(Vec::new()),
            _ => self.recompute_passive(prefix, QueryOrigin::SelfInitiated, topology, up_neighbors, now),
        }
    }

    /// Handle a local outbound link-cost change already reflected in `topology`.
    pub fn on_local_change(
        &mut self,
        prefix: Prefix,
        topology: &TopologyTable,
        up_neighbors: &[RouterId],
        now: SimTime,
    ) -> Result<Vec<DualIntent>, DualInvariantViolation> {
        if self.is_active(prefix) {
            return Ok(Vec::new());
        }
        self.recompute_passive(prefix, QueryOrigin::SelfInitiated, topology, up_neighbors, now)
    }

    /// Collapse an Active prefix that has sat past the Active timeout,
    /// treating every still-outstanding neighbor as Down.
    pub fn on_active_timeout(
        &mut self,
        prefix: Prefix,
        topology: &TopologyTable,
        up_neighbors: &[RouterId],
        now: SimTime,
    ) -> Result<Vec<DualIntent>, DualInvariantViolation> {
        if !self.is_active(prefix) {
            return Ok(Vec::new());
        }
        if let Some(DualState::Active { replies_outstanding, .. }) = self.states.get_mut(&prefix) {
            replies_outstanding.clear();
        }
        self.collapse_active(prefix, topology, up_neighbors, now)
    }

    /// Simulated time this prefix entered Active, if it is currently Active.
    pub fn active_since(&self, prefix: Prefix) -> Option<SimTime> {
        match self.states.get(&prefix) {
            Some(DualState::Active { entered_at, .. }) => Some(*entered_at),
            _ => None,
        }
    }

    fn resolve_if_all_replied(
        &mut self,
        prefix: Prefix,
        topology: &TopologyTable,
        up_neighbors: &[RouterId],
        now: SimTime,
    ) -> Result<Vec<DualIntent>, DualInvariantViolation> {
        let done = matches!(
            self.states.get(&prefix),
            Some(DualState::Active { replies_outstanding, .. }) if replies_outstanding.is_empty()
        );
        if done {
            self.collapse_active(prefix, topology, up_neighbors, now)
        } else {
            Ok(Vec::new())
        }
    }

    fn recompute_passive(
        &mut self,
        prefix: Prefix,
        origin: QueryOrigin,
        topology: &TopologyTable,
        up_neighbors: &[RouterId],
        now: SimTime,
    ) -> Result<Vec<DualIntent>, DualInvariantViolation> {
        let (old_fd, old_successors) = self.passive_snapshot(prefix);

        if topology.is_unreachable(prefix) {
            let mut intents = Vec::new();
            if !old_fd.is_infinite() || !old_successors.is_empty() {
                intents.push(DualIntent::WithdrawRoute { prefix });
                intents.push(DualIntent::EmitUpdate { prefix, to: UpdateTarget::All, metric: Cost::INFINITE });
            }
            self.states.insert(prefix, DualState::Passive { fd: Cost::INFINITE, successors: Vec::new() });
            return Ok(intents);
        }

        let (feasible, best) = topology.find_successors(prefix, old_fd);

        if !feasible.is_empty() {
            if best > old_fd {
                // A feasible successor survives (its RD is still below the FD we
                // already advertised), but recomputing would raise that FD while
                // staying Passive, which breaks the monotonicity every downstream
                // router's own Feasibility Condition relies on. Halt rather than
                // quietly widen it.
                return Err(DualInvariantViolation::FeasibleDistanceIncreasedInPassive { prefix, old: old_fd, new: best });
            }
            let changed = best != old_fd || feasible != old_successors;
            self.states.insert(prefix, DualState::Passive { fd: best, successors: feasible.clone() });
            let mut intents = vec![DualIntent::ReportSuccessors { prefix, candidates: feasible, metric: best }];
            if changed {
                intents.push(DualIntent::EmitUpdate { prefix, to: UpdateTarget::All, metric: best });
            }
            return Ok(intents);
        }

        if up_neighbors.is_empty() {
            return Err(DualInvariantViolation::ActiveWithNoNeighbors { prefix });
        }

        let query_metric = topology.min_computed_distance(prefix);
        self.states.insert(
            prefix,
            DualState::Active {
                frozen_fd: old_fd,
                replies_outstanding: up_neighbors.iter().copied().collect(),
                query_origin: origin,
                entered_at: now,
            },
        );
        Ok(vec![DualIntent::BeginActive { prefix }, DualIntent::EmitUpdate { prefix, to: UpdateTarget::All, metric: query_metric }])
    }

    fn collapse_active(
        &mut self,
        prefix: Prefix,
        topology: &TopologyTable,
        _up_neighbors: &[RouterId],
        _now: SimTime,
    ) -> Result<Vec<DualIntent>, DualInvariantViolation> {
        let query_origin = match self.states.get(&prefix) {
            Some(DualState::Active { query_origin, .. }) => *query_origin,
            _ => QueryOrigin::SelfInitiated,
        };

        // FD is relaxed to infinite so any surviving neighbor counts as feasible.
        let (feasible, best) = topology.find_successors(prefix, Cost::INFINITE);

        let mut intents = vec![DualIntent::EndActive { prefix }];
        if feasible.is_empty() {
            self.states.insert(prefix, DualState::Passive { fd: Cost::INFINITE, successors: Vec::new() });
            intents.push(DualIntent::WithdrawRoute { prefix });
            push_reply_then_broadcast(&mut intents, prefix, query_origin, Cost::INFINITE);
        } else {
            self.states.insert(prefix, DualState::Passive { fd: best, successors: feasible.clone() });
            intents.push(DualIntent::ReportSuccessors { prefix, candidates: feasible, metric: best });
            push_reply_then_broadcast(&mut intents, prefix, query_origin, best);
        }
        Ok(intents)
    }
}

fn push_reply_then_broadcast(intents: &mut Vec<DualIntent>, prefix: Prefix, origin: QueryOrigin, metric: Cost) {
    match origin {
        QueryOrigin::Neighbor(n) => {
            intents.push(DualIntent::EmitUpdate { prefix, to: UpdateTarget::Neighbor(n), metric });
            intents.push(DualIntent::EmitUpdate { prefix, to: UpdateTarget::AllExcept(n), metric });
        }
        QueryOrigin::SelfInitiated => {
            intents.push(DualIntent::EmitUpdate { prefix, to: UpdateTarget::All, metric });
        }
    }
}
