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

//! A single router: neighbor table, topology table, DUAL instances,
//! routing table, and the timers that drive them.
//!
//! `Router` is the only thing in this crate that mutates routing state; it
//! does so by applying [`DualIntent`]s emitted by its [`Dual`] instances and
//! consulting [`Mab`] to break ties among feasible successors. It never
//! touches the event queue directly — instead it returns [`RouterEffect`]s
//! that the [`Scheduler`](crate::scheduler::Scheduler) turns into scheduled
//! events and subscriber notifications.

use crate::codec::{Codec, HelloPacket, Packet, RouteEntry, UpdatePacket};
use crate::dual::{Dual, DualIntent, UpdateTarget};
use crate::error::{AdupError, TopologyError};
use crate::mab::Mab;
use crate::metric;
use crate::subscriber::SimEventKind;
use crate::topology::TopologyTable;
use crate::types::{Cost, LinkMetrics, Prefix, RouterId, SimTime, Weights};
use log::{debug, trace, warn};
use rand::Rng;
use std::collections::{HashMap, HashSet};

/// Configuration knobs for a single router. Defaults match §4.6 and the
/// Active-timeout/Hello-hold values fixed in the Design Notes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouterConfig {
    /// Interval between broadcast Hellos.
    pub hello_interval: SimTime,
    /// How long a neighbor may go without a Hello before it is declared Down.
    pub hold_time: SimTime,
    /// Interval between MAB `observe()` samples along installed routes.
    pub mab_sample_interval: SimTime,
    /// How long a prefix may remain Active before outstanding replies are
    /// assumed lost and the computation is forcibly collapsed.
    pub active_timeout: SimTime,
    /// Weights used to compose [`LinkMetrics`] into a [`Cost`].
    pub weights: Weights,
    /// Path MTU enforced by this router's [`Codec`].
    pub mtu: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            hello_interval: SimTime::from_secs(5),
            hold_time: SimTime::from_secs(15),
            mab_sample_interval: SimTime::from_secs(2),
            active_timeout: SimTime::from_secs(16),
            weights: Weights::default(),
            mtu: crate::codec::DEFAULT_MTU,
        }
    }
}

/// Liveness state of one neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborState {
    /// A Hello was sent but none received yet.
    Pending,
    /// A Hello was received within the hold time.
    Up,
    /// No Hello received within the hold time, or an explicit link-down.
    Down,
}

/// Everything known about one neighbor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborEntry {
    /// Identity of the neighbor.
    pub neighbor_id: RouterId,
    /// Simulated time the last Hello was received.
    pub last_hello_time: SimTime,
    /// Metrics last advertised on the link *to* this neighbor, i.e. the
    /// neighbor's own outbound measurement, as received in their Hello.
    pub link_metrics: LinkMetrics,
    /// Time at which, absent a fresh Hello, this neighbor is declared Down.
    pub hold_down_deadline: SimTime,
    /// Current liveness state.
    pub state: NeighborState,
    /// Bumped every time this neighbor's hold deadline is refreshed. The
    /// [`Scheduler`](crate::scheduler::Scheduler) tags each scheduled
    /// hold-check event with the generation in effect when it was
    /// scheduled; on dispatch, a mismatched generation means the deadline
    /// was since refreshed and the event is stale, per §5's cancellation
    /// rule.
    pub generation: u64,
}

/// A single installed forwarding-table entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutingEntry {
    /// Destination prefix.
    pub prefix: Prefix,
    /// Next-hop router for this prefix.
    pub next_hop: RouterId,
    /// Composite cost via `next_hop`.
    pub metric: Cost,
    /// Simulated time this entry was installed.
    pub installed_at: SimTime,
}

/// A side effect a [`Router`] handler asks the
/// [`Scheduler`](crate::scheduler::Scheduler) to carry out. `Router` itself
/// never enqueues events or notifies subscribers.
#[derive(Debug, Clone)]
pub enum RouterEffect {
    /// Send `packet` to `to` over the link between them.
    Send { to: RouterId, packet: Packet },
    /// Emit a protocol event for subscribers.
    Event(SimEventKind),
    /// Schedule a hold-check for `neighbor` at `deadline`, tagged with
    /// `generation`. Stale once a later Hello bumps the neighbor's
    /// generation past it.
    ScheduleHoldCheck { neighbor: RouterId, generation: u64, deadline: SimTime },
}

/// A single router in the simulated network.
#[derive(Debug, Clone)]
pub struct Router {
    router_id: RouterId,
    name: String,
    config: RouterConfig,
    codec: Codec,
    neighbors: HashMap<RouterId, NeighborEntry>,
    /// Per-interface outbound metrics: what this router measures looking
    /// *out* toward each neighbor, distinct from what the neighbor reports
    /// about the same link in their Hello.
    outbound_metrics: HashMap<RouterId, LinkMetrics>,
    topology: TopologyTable,
    dual: Dual,
    mab: Mab,
    routing_table: HashMap<Prefix, RoutingEntry>,
    /// Prefixes this router originates itself (directly connected networks).
    local_prefixes: HashSet<Prefix>,
    known_prefixes: HashSet<Prefix>,
    /// Whether this router is currently processing inbound packets and
    /// timer firings. `false` after `stop()`, until a matching `start()`.
    running: bool,
}

impl Router {
    /// Construct a new, otherwise empty router.
    pub fn new(router_id: RouterId, name: impl Into<String>, config: RouterConfig) -> Self {
        let mtu = config.mtu;
        Self {
            router_id,
            name: name.into(),
            config,
            codec: Codec::with_mtu(mtu),
            neighbors: HashMap::new(),
            outbound_metrics: HashMap::new(),
            topology: TopologyTable::new(),
            dual: Dual::new(),
            mab: Mab::new(crate::mab::DEFAULT_EPSILON),
            routing_table: HashMap::new(),
            local_prefixes: HashSet::new(),
            known_prefixes: HashSet::new(),
            running: true,
        }
    }

    /// Reset all learned protocol state, as if the router had just booted.
    /// Configuration and locally-originated prefixes are preserved.
    pub fn reset(&mut self) {
        self.neighbors.clear();
        self.outbound_metrics.clear();
        self.topology = TopologyTable::new();
        self.dual = Dual::new();
        self.mab = Mab::new(crate::mab::DEFAULT_EPSILON);
        self.routing_table.clear();
        self.known_prefixes.clear();
        self.running = true;
    }

    /// Begin (or resume) processing inbound packets and timer firings.
    /// Routers start in this state; calling `start()` only matters after a
    /// prior `stop()`. Never discards learned state.
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Stop processing inbound packets and timer firings until `start()` is
    /// called again. Neighbors of a stopped router will still see it as
    /// Down once their own hold timers expire, the same as any other silent
    /// failure; this does not itself notify anyone.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Whether this router is currently processing events.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// This router's identifier.
    pub fn router_id(&self) -> RouterId {
        self.router_id
    }

    /// This router's configured name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// An owned, copy-on-read snapshot of the routing table, safe for an
    /// external subscriber to hold onto across later events.
    pub fn routing_table(&self) -> Vec<RoutingEntry> {
        self.routing_table.values().copied().collect()
    }

    /// An owned, copy-on-read snapshot of the neighbor table.
    pub fn neighbor_table(&self) -> Vec<NeighborEntry> {
        self.neighbors.values().copied().collect()
    }

    /// Whether `prefix`'s DUAL state machine is currently Active (mid
    /// diffusing computation) rather than settled Passive.
    pub fn is_active(&self, prefix: Prefix) -> bool {
        self.dual.is_active(prefix)
    }

    /// Declare `prefix` as directly originated by this router, at zero cost.
    pub fn originate_prefix(&mut self, prefix: Prefix) -> Result<Vec<RouterEffect>, AdupError> {
        self.local_prefixes.insert(prefix);
        self.known_prefixes.insert(prefix);
        self.routing_table.insert(
            prefix,
            RoutingEntry { prefix, next_hop: self.router_id, metric: Cost::ZERO, installed_at: SimTime::ZERO },
        );
        let mut effects = vec![RouterEffect::Event(SimEventKind::RouteInstalled {
            prefix,
            next_hop: self.router_id,
            metric: Cost::ZERO,
        })];
        effects.extend(self.broadcast_update(prefix, Cost::ZERO, UpdateTarget::All)?);
        Ok(effects)
    }

    /// Withdraw a previously [`Router::originate_prefix`]d route: remove it
    /// locally and advertise its withdrawal (metric = infinite) to every Up
    /// neighbor. A no-op, aside from the advertisement, if `prefix` was not
    /// locally originated.
    pub fn withdraw_prefix(&mut self, prefix: Prefix) -> Result<Vec<RouterEffect>, AdupError> {
        self.local_prefixes.remove(&prefix);
        let mut effects = Vec::new();
        if self.routing_table.remove(&prefix).is_some() {
            effects.push(RouterEffect::Event(SimEventKind::RouteWithdrawn { prefix }));
        }
        effects.extend(self.broadcast_update(prefix, Cost::INFINITE, UpdateTarget::All)?);
        Ok(effects)
    }

    /// Register the outbound link metrics toward `neighbor`, used to form
    /// this router's own Hello and the link-cost half of topology entries.
    pub fn set_outbound_metrics(&mut self, neighbor: RouterId, metrics: LinkMetrics) {
        self.outbound_metrics.insert(neighbor, metrics);
    }

    fn up_neighbors(&self) -> Vec<RouterId> {
        self.neighbors.values().filter(|n| n.state == NeighborState::Up).map(|n| n.neighbor_id).collect()
    }

    fn link_cost(&self, neighbor: RouterId) -> Cost {
        self.outbound_metrics.get(&neighbor).map(|m| metric::compose(*m, self.config.weights)).unwrap_or(Cost::INFINITE)
    }

    /// Decode and dispatch an inbound frame received from `from`.
    pub fn on_packet(
        &mut self,
        from: RouterId,
        bytes: &[u8],
        now: SimTime,
        rng: &mut impl Rng,
    ) -> Result<Vec<RouterEffect>, AdupError> {
        if !self.running {
            return Ok(Vec::new());
        }
        let packet = self.codec.decode_checked(bytes)?;
        match packet {
            Packet::Hello(hello) => Ok(self.on_hello(from, hello, now)),
            Packet::Update(update) => self.on_update_packet(from, update, now, rng),
        }
    }

    fn on_hello(&mut self, from: RouterId, hello: HelloPacket, now: SimTime) -> Vec<RouterEffect> {
        let mut effects = vec![RouterEffect::Event(SimEventKind::HelloRecv { from })];
        let is_new = !self.neighbors.contains_key(&from) || self.neighbors[&from].state != NeighborState::Up;
        let generation = self.neighbors.get(&from).map(|n| n.generation + 1).unwrap_or(0);
        let deadline = now + self.config.hold_time.as_millis();

        self.neighbors.insert(
            from,
            NeighborEntry {
                neighbor_id: from,
                last_hello_time: now,
                link_metrics: hello.metrics,
                hold_down_deadline: deadline,
                state: NeighborState::Up,
                generation,
            },
        );
        effects.push(RouterEffect::ScheduleHoldCheck { neighbor: from, generation, deadline });

        if is_new {
            effects.push(RouterEffect::Event(SimEventKind::NeighborUp { neighbor: from }));
            effects.extend(self.full_dump_to(from));
        }
        effects
    }

    fn full_dump_to(&self, to: RouterId) -> Vec<RouterEffect> {
        let entries: Vec<RouteEntry> = self
            .routing_table
            .values()
            .map(|r| RouteEntry {
                prefix: r.prefix,
                metrics: self.outbound_metrics.get(&to).copied().unwrap_or_default(),
                reported_distance: r.metric,
            })
            .collect();
        if entries.is_empty() {
            return Vec::new();
        }
        vec![RouterEffect::Send { to, packet: Packet::Update(UpdatePacket { entries }) }]
    }

    fn on_update_packet(
        &mut self,
        from: RouterId,
        update: UpdatePacket,
        now: SimTime,
        rng: &mut impl Rng,
    ) -> Result<Vec<RouterEffect>, AdupError> {
        if !self.neighbors.contains_key(&from) {
            warn!("{}: update from unknown neighbor {:?}, dropping", self.name, from);
            return Err(AdupError::Topology(TopologyError::UnknownNeighbor(from)));
        }

        let mut effects = Vec::new();
        let up = self.up_neighbors();
        for entry in update.entries {
            effects.push(RouterEffect::Event(SimEventKind::UpdateRecv {
                from,
                prefix: entry.prefix,
                metric: entry.reported_distance,
            }));
            self.known_prefixes.insert(entry.prefix);

            if entry.reported_distance.is_infinite() {
                self.topology.remove(entry.prefix, from);
            } else {
                let link_cost = self.link_cost(from);
                self.topology.insert(entry.prefix, from, entry.reported_distance, link_cost);
            }

            let intents = self.dual.on_update(entry.prefix, from, &self.topology, &up, now)?;
            effects.extend(self.apply_intents(entry.prefix, intents, now, rng)?);
        }
        Ok(effects)
    }

    /// Handle a link to `peer` going down (hold-timer expiry or an injected
    /// failure).
    pub fn on_link_down(&mut self, peer: RouterId, now: SimTime, rng: &mut impl Rng) -> Result<Vec<RouterEffect>, AdupError> {
        if let Some(entry) = self.neighbors.get_mut(&peer) {
            if entry.state == NeighborState::Down {
                return Ok(Vec::new());
            }
            entry.state = NeighborState::Down;
        } else {
            return Ok(Vec::new());
        }

        let mut effects = vec![RouterEffect::Event(SimEventKind::NeighborDown { neighbor: peer })];
        self.topology.remove_neighbor(peer);
        self.outbound_metrics.remove(&peer);

        let affected: Vec<Prefix> = self.known_prefixes.iter().copied().collect();
        let up = self.up_neighbors();
        for prefix in affected {
            let intents = self.dual.on_neighbor_down(prefix, peer, &self.topology, &up, now)?;
            effects.extend(self.apply_intents(prefix, intents, now, rng)?);
        }
        Ok(effects)
    }

    /// Handle a link to `peer` coming up (or being reconfigured) with new metrics.
    pub fn on_link_up(&mut self, peer: RouterId, metrics: LinkMetrics, now: SimTime, rng: &mut impl Rng) -> Result<Vec<RouterEffect>, AdupError> {
        self.set_outbound_metrics(peer, metrics);
        self.topology.update_link_cost(peer, self.link_cost(peer));
        let mut effects = Vec::new();
        if !self.neighbors.contains_key(&peer) {
            let deadline = now + self.config.hold_time.as_millis();
            self.neighbors.insert(
                peer,
                NeighborEntry {
                    neighbor_id: peer,
                    last_hello_time: now,
                    link_metrics: LinkMetrics::default(),
                    hold_down_deadline: deadline,
                    state: NeighborState::Pending,
                    generation: 0,
                },
            );
            effects.push(RouterEffect::ScheduleHoldCheck { neighbor: peer, generation: 0, deadline });
        }

        let affected: Vec<Prefix> = self.known_prefixes.iter().copied().collect();
        let up = self.up_neighbors();
        for prefix in affected {
            let intents = self.dual.on_local_change(prefix, &self.topology, &up, now)?;
            effects.extend(self.apply_intents(prefix, intents, now, rng)?);
        }
        Ok(effects)
    }

    /// Broadcast a Hello on every interface. Called by the Hello timer.
    pub fn hello_timer_fire(&self, now: SimTime) -> Vec<RouterEffect> {
        let _ = now;
        if !self.running {
            return Vec::new();
        }
        self.outbound_metrics
            .keys()
            .flat_map(|&to| {
                let metrics = self.outbound_metrics[&to];
                vec![
                    RouterEffect::Event(SimEventKind::HelloSent { to }),
                    RouterEffect::Send { to, packet: Packet::Hello(HelloPacket { metrics }) },
                ]
            })
            .collect()
    }

    /// Dispatch a scheduled hold-check for `neighbor`. If `generation`
    /// no longer matches the neighbor's current generation, a later Hello
    /// already refreshed the deadline and this event is stale — discarded
    /// without effect, per §5's cancellation rule. Otherwise, the neighbor
    /// has gone silent for a full hold interval and is declared Down.
    pub fn hold_check(&mut self, neighbor: RouterId, generation: u64, now: SimTime, rng: &mut impl Rng) -> Result<Vec<RouterEffect>, AdupError> {
        if !self.running {
            return Ok(Vec::new());
        }
        match self.neighbors.get(&neighbor) {
            Some(entry) if entry.generation == generation && entry.state != NeighborState::Down => {}
            _ => return Ok(Vec::new()),
        }
        self.on_link_down(neighbor, now, rng)
    }

    /// This router's configuration, for the
    /// [`Scheduler`](crate::scheduler::Scheduler) to read timer intervals from.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Sample every current feasible successor's quality and feed it to the
    /// MAB tie-breaker, then reselect among them. Called by the MAB sample
    /// timer. Reselecting (rather than only observing the installed route)
    /// is what lets the bandit actually act on what it has learned: DUAL
    /// only offers a fresh candidate set to `Mab::select` when a topology
    /// change forces a recompute, so without this periodic re-evaluation a
    /// tie broken once at installation would never revisit that choice.
    pub fn mab_timer_fire(&mut self, now: SimTime, rng: &mut impl Rng) -> Vec<RouterEffect> {
        if !self.running {
            return Vec::new();
        }
        let mut effects = Vec::new();
        let prefixes: Vec<Prefix> = self.known_prefixes.iter().copied().collect();
        for prefix in prefixes {
            let candidates: Vec<RouterId> = self.dual.successors(prefix).to_vec();
            if candidates.is_empty() {
                continue;
            }
            for &candidate in &candidates {
                if let Some(entry) = self.topology.get(prefix, candidate) {
                    self.mab.observe_cost(prefix, candidate, entry.computed_distance);
                }
            }
            if candidates.len() > 1 {
                let chosen = self.mab.select(prefix, &candidates, rng);
                if let Some(entry) = self.topology.get(prefix, chosen) {
                    self.install_route(prefix, chosen, entry.computed_distance, now, &mut effects);
                }
            }
        }
        effects
    }

    /// Collapse any prefix that has been Active for longer than the
    /// configured Active timeout.
    pub fn check_active_timeouts(&mut self, now: SimTime, rng: &mut impl Rng) -> Result<Vec<RouterEffect>, AdupError> {
        if !self.running {
            return Ok(Vec::new());
        }
        let mut effects = Vec::new();
        let up = self.up_neighbors();
        let timed_out: Vec<Prefix> = self
            .known_prefixes
            .iter()
            .copied()
            .filter(|p| match self.dual.active_since(*p) {
                Some(since) => now.as_millis() >= since.as_millis() + self.config.active_timeout.as_millis(),
                None => false,
            })
            .collect();
        for prefix in timed_out {
            let intents = self.dual.on_active_timeout(prefix, &self.topology, &up, now)?;
            effects.extend(self.apply_intents(prefix, intents, now, rng)?);
        }
        Ok(effects)
    }

    /// Apply the intents a [`Dual`] state transition emitted: install or
    /// withdraw routes, breaking ties among multiple feasible successors via
    /// the MAB tie-breaker, and turn the remainder into [`RouterEffect`]s for
    /// the Scheduler to dispatch.
    fn apply_intents(
        &mut self,
        prefix: Prefix,
        intents: Vec<DualIntent>,
        now: SimTime,
        rng: &mut impl Rng,
    ) -> Result<Vec<RouterEffect>, AdupError> {
        let mut effects = Vec::new();
        for intent in intents {
            match intent {
                DualIntent::ReportSuccessors { candidates, metric, .. } => {
                    let next_hop = if candidates.len() > 1 {
                        self.mab.select(prefix, &candidates, rng)
                    } else {
                        candidates[0]
                    };
                    self.install_route(prefix, next_hop, metric, now, &mut effects);
                }
                DualIntent::WithdrawRoute { .. } => {
                    if self.routing_table.remove(&prefix).is_some() {
                        effects.push(RouterEffect::Event(SimEventKind::RouteWithdrawn { prefix }));
                    }
                    self.mab.reset_prefix(prefix);
                }
                DualIntent::EmitUpdate { to, metric, .. } => {
                    effects.extend(self.broadcast_update(prefix, metric, to)?);
                }
                DualIntent::BeginActive { .. } => {
                    effects.push(RouterEffect::Event(SimEventKind::DualActive { prefix }));
                }
                DualIntent::EndActive { .. } => {
                    effects.push(RouterEffect::Event(SimEventKind::DualPassive { prefix }));
                }
            }
        }
        debug!("{}: applied {} intent(s) for {}", self.name, effects.len(), prefix);
        Ok(effects)
    }

    fn install_route(&mut self, prefix: Prefix, next_hop: RouterId, metric: Cost, now: SimTime, effects: &mut Vec<RouterEffect>) {
        let changed = self.routing_table.get(&prefix).map(|r| r.next_hop != next_hop || r.metric != metric).unwrap_or(true);
        self.routing_table.insert(prefix, RoutingEntry { prefix, next_hop, metric, installed_at: now });
        if changed {
            effects.push(RouterEffect::Event(SimEventKind::RouteInstalled { prefix, next_hop, metric }));
        }
    }

    fn broadcast_update(&self, prefix: Prefix, metric: Cost, target: UpdateTarget) -> Result<Vec<RouterEffect>, AdupError> {
        let targets: Vec<RouterId> = match target {
            UpdateTarget::All => self.up_neighbors(),
            UpdateTarget::Neighbor(n) => vec![n],
            UpdateTarget::AllExcept(skip) => self.up_neighbors().into_iter().filter(|&n| n != skip).collect(),
        };
        let mut effects = Vec::with_capacity(targets.len() * 2);
        for to in targets {
            trace!("{}: emitting update for {} -> {:?} (metric {})", self.name, prefix, to, metric);
            let metrics = self.outbound_metrics.get(&to).copied().unwrap_or_default();
            let entries = vec![RouteEntry { prefix, metrics, reported_distance: metric }];
            effects.push(RouterEffect::Event(SimEventKind::UpdateSent { to, prefix, metric }));
            effects.push(RouterEffect::Send { to, packet: Packet::Update(UpdatePacket { entries }) });
        }
        Ok(effects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::graph::NodeIndex;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rid(i: u32) -> RouterId {
        NodeIndex::new(i as usize)
    }

    fn metrics() -> LinkMetrics {
        LinkMetrics { delay_us: 1000, jitter_us: 10, loss_permille: 0, congestion_pct: 0, stability: 100 }
    }

    fn new_router() -> Router {
        Router::new(rid(1), "R1", RouterConfig::default())
    }

    #[test]
    fn first_hello_brings_neighbor_up_and_dumps_routes() {
        let mut r = new_router();
        r.originate_prefix(Prefix::new(1, 8)).unwrap();
        r.set_outbound_metrics(rid(2), metrics());

        let effects = r.on_hello(rid(2), HelloPacket { metrics: metrics() }, SimTime::from_secs(1));

        assert!(effects.iter().any(|e| matches!(e, RouterEffect::Event(SimEventKind::NeighborUp { neighbor }) if *neighbor == rid(2))));
        assert!(effects.iter().any(|e| matches!(e, RouterEffect::Send { to, packet: Packet::Update(_) } if *to == rid(2))));
        assert_eq!(r.neighbors[&rid(2)].state, NeighborState::Up);
    }

    #[test]
    fn second_hello_from_same_neighbor_does_not_redump() {
        let mut r = new_router();
        r.originate_prefix(Prefix::new(1, 8)).unwrap();
        r.set_outbound_metrics(rid(2), metrics());
        r.on_hello(rid(2), HelloPacket { metrics: metrics() }, SimTime::from_secs(1));

        let effects = r.on_hello(rid(2), HelloPacket { metrics: metrics() }, SimTime::from_secs(6));
        assert!(!effects.iter().any(|e| matches!(e, RouterEffect::Event(SimEventKind::NeighborUp { .. }))));
        assert!(!effects.iter().any(|e| matches!(e, RouterEffect::Send { .. })));
    }

    #[test]
    fn hold_check_with_stale_generation_is_ignored() {
        let mut r = new_router();
        let mut rng = StdRng::seed_from_u64(1);
        r.set_outbound_metrics(rid(2), metrics());
        r.on_hello(rid(2), HelloPacket { metrics: metrics() }, SimTime::from_secs(1));
        // A second Hello bumps the generation past the one the first hold-check was tagged with.
        r.on_hello(rid(2), HelloPacket { metrics: metrics() }, SimTime::from_secs(2));

        let effects = r.hold_check(rid(2), 0, SimTime::from_secs(16), &mut rng).unwrap();
        assert!(effects.is_empty());
        assert_eq!(r.neighbors[&rid(2)].state, NeighborState::Up);
    }

    #[test]
    fn hold_check_with_current_generation_declares_neighbor_down() {
        let mut r = new_router();
        let mut rng = StdRng::seed_from_u64(1);
        r.set_outbound_metrics(rid(2), metrics());
        r.on_hello(rid(2), HelloPacket { metrics: metrics() }, SimTime::from_secs(1));

        let effects = r.hold_check(rid(2), 0, SimTime::from_secs(16), &mut rng).unwrap();
        assert!(effects.iter().any(|e| matches!(e, RouterEffect::Event(SimEventKind::NeighborDown { neighbor }) if *neighbor == rid(2))));
        assert_eq!(r.neighbors[&rid(2)].state, NeighborState::Down);
    }

    #[test]
    fn originate_then_withdraw_emits_install_then_withdraw_events() {
        let mut r = new_router();
        let p = Prefix::new(1, 8);

        let installed = r.originate_prefix(p).unwrap();
        assert!(installed.iter().any(|e| matches!(e, RouterEffect::Event(SimEventKind::RouteInstalled { prefix, .. }) if *prefix == p)));
        assert!(r.routing_table().iter().any(|e| e.prefix == p));

        let withdrawn = r.withdraw_prefix(p).unwrap();
        assert!(withdrawn.iter().any(|e| matches!(e, RouterEffect::Event(SimEventKind::RouteWithdrawn { prefix }) if *prefix == p)));
        assert!(!r.routing_table().iter().any(|e| e.prefix == p));
    }

    #[test]
    fn update_from_unknown_neighbor_is_rejected_and_logged() {
        let mut r = new_router();
        let mut rng = StdRng::seed_from_u64(1);
        let update = Packet::Update(UpdatePacket {
            entries: vec![RouteEntry { prefix: Prefix::new(1, 8), metrics: metrics(), reported_distance: Cost::new(1.0) }],
        });
        let bytes = Codec::encode(&update).unwrap();
        let result = r.on_packet(rid(99), &bytes, SimTime::ZERO, &mut rng);
        assert!(matches!(result, Err(AdupError::Topology(TopologyError::UnknownNeighbor(_)))));
    }

    #[test]
    fn stopped_router_ignores_packets_and_timers_until_started() {
        let mut r = new_router();
        let mut rng = StdRng::seed_from_u64(1);
        r.set_outbound_metrics(rid(2), metrics());
        assert!(r.is_running());

        r.stop();
        assert!(!r.is_running());

        let hello = Packet::Hello(HelloPacket { metrics: metrics() });
        let bytes = Codec::encode(&hello).unwrap();
        let effects = r.on_packet(rid(2), &bytes, SimTime::from_secs(1), &mut rng).unwrap();
        assert!(effects.is_empty());
        assert!(r.hello_timer_fire(SimTime::from_secs(1)).is_empty());
        assert!(r.hold_check(rid(2), 0, SimTime::from_secs(16), &mut rng).unwrap().is_empty());
        assert!(r.check_active_timeouts(SimTime::from_secs(1), &mut rng).unwrap().is_empty());
        assert!(!r.neighbors.contains_key(&rid(2)));

        r.start();
        assert!(r.is_running());
        let effects = r.on_packet(rid(2), &bytes, SimTime::from_secs(2), &mut rng).unwrap();
        assert!(effects.iter().any(|e| matches!(e, RouterEffect::Event(SimEventKind::NeighborUp { neighbor }) if *neighbor == rid(2))));
    }
}
