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

//! Per-destination topology table.
//!
//! For every prefix, keeps one entry per neighbor that has advertised it:
//! the neighbor's reported distance (RD), the cost of the link to that
//! neighbor, and their sum (the computed distance). This is the raw
//! material DUAL searches for feasible successors.

use crate::types::{Cost, Prefix, RouterId};
use itertools::Itertools;
use std::collections::HashMap;

/// One `(prefix, neighbor)` entry in the [`TopologyTable`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopologyEntry {
    /// Distance the neighbor reports for this prefix (RD).
    pub reported_distance: Cost,
    /// Cost of the link to the neighbor.
    pub link_cost: Cost,
    /// `reported_distance + link_cost`.
    pub computed_distance: Cost,
}

impl TopologyEntry {
    fn new(reported_distance: Cost, link_cost: Cost) -> Self {
        Self { reported_distance, link_cost, computed_distance: reported_distance.add_saturating(link_cost) }
    }
}

/// Per-destination set of `(neighbor, reported_distance, link_cost)` triples.
#[derive(Debug, Clone, Default)]
pub struct TopologyTable {
    entries: HashMap<Prefix, HashMap<RouterId, TopologyEntry>>,
}

impl TopologyTable {
    /// Construct an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `(prefix, neighbor)`.
    pub fn insert(&mut self, prefix: Prefix, neighbor: RouterId, reported_distance: Cost, link_cost: Cost) {
        self.entries
            .entry(prefix)
            .or_default()
            .insert(neighbor, TopologyEntry::new(reported_distance, link_cost));
    }

    /// Remove the entry for `(prefix, neighbor)`, if present. Returns the
    /// removed entry.
    pub fn remove(&mut self, prefix: Prefix, neighbor: RouterId) -> Option<TopologyEntry> {
        let removed = self.entries.get_mut(&prefix).and_then(|table| table.remove(&neighbor));
        if matches!(self.entries.get(&prefix), Some(table) if table.is_empty()) {
            self.entries.remove(&prefix);
        }
        removed
    }

    /// Remove every entry belonging to `neighbor`, across all prefixes.
    /// Used when a neighbor transitions to Down.
    pub fn remove_neighbor(&mut self, neighbor: RouterId) {
        self.entries.retain(|_, table| {
            table.remove(&neighbor);
            !table.is_empty()
        });
    }

    /// Look up the entry for `(prefix, neighbor)`.
    pub fn get(&self, prefix: Prefix, neighbor: RouterId) -> Option<&TopologyEntry> {
        self.entries.get(&prefix)?.get(&neighbor)
    }

    /// Iterate over all `(neighbor, entry)` pairs known for `prefix`.
    pub fn neighbors_for(&self, prefix: Prefix) -> impl Iterator<Item = (RouterId, &TopologyEntry)> {
        self.entries.get(&prefix).into_iter().flat_map(|table| table.iter().map(|(&id, e)| (id, e)))
    }

    /// True if no neighbor advertises `prefix` at all (feasible or not) —
    /// the prefix is entirely unreachable through this router.
    pub fn is_unreachable(&self, prefix: Prefix) -> bool {
        !self.entries.get(&prefix).map(|table| !table.is_empty()).unwrap_or(false)
    }

    /// Minimum reported distance across *all* neighbors for `prefix`,
    /// feasible or not. Used by DUAL to pick the new Feasible Distance
    /// baseline when an Active computation collapses.
    pub fn best_reported_distance(&self, prefix: Prefix) -> Option<Cost> {
        self.entries.get(&prefix)?.values().map(|e| e.reported_distance).min()
    }

    /// Find the feasible successors for `prefix` given a Feasible Distance
    /// `fd`. A neighbor is feasible iff `reported_distance < fd` (strict).
    /// Returns every feasible neighbor tied for the minimum computed
    /// distance, plus that minimum. Returns `(vec![], Cost::INFINITE)` if no
    /// neighbor is feasible.
    pub fn find_successors(&self, prefix: Prefix, fd: Cost) -> (Vec<RouterId>, Cost) {
        let feasible: Vec<(RouterId, Cost)> = self
            .neighbors_for(prefix)
            .filter(|(_, e)| e.reported_distance < fd)
            .map(|(id, e)| (id, e.computed_distance))
            .collect();

        let best = match feasible.iter().map(|(_, cost)| *cost).min() {
            Some(best) => best,
            None => return (Vec::new(), Cost::INFINITE),
        };

        let successors: Vec<RouterId> =
            feasible.into_iter().filter(|(_, cost)| *cost == best).map(|(id, _)| id).sorted().collect();
        (successors, best)
    }

    /// Refresh the stored link cost for every `(prefix, neighbor)` entry
    /// belonging to `neighbor`, recomputing each entry's computed distance.
    /// Called when a local outbound link metric changes so stale entries
    /// don't keep feeding DUAL a link cost that no longer applies.
    pub fn update_link_cost(&mut self, neighbor: RouterId, new_link_cost: Cost) {
        for table in self.entries.values_mut() {
            if let Some(entry) = table.get_mut(&neighbor) {
                entry.link_cost = new_link_cost;
                entry.computed_distance = entry.reported_distance.add_saturating(new_link_cost);
            }
        }
    }

    /// Minimum computed distance across *all* Up neighbors for `prefix`,
    /// feasible or not — used by DUAL's Passive-state recompute step, which
    /// considers every neighbor before narrowing down to feasible ones.
    pub fn min_computed_distance(&self, prefix: Prefix) -> Cost {
        self.neighbors_for(prefix).map(|(_, e)| e.computed_distance).min().unwrap_or(Cost::INFINITE)
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
    fn feasible_successor_requires_strict_rd_below_fd() {
        let mut t = TopologyTable::new();
        let p = Prefix::new(1, 24);
        t.insert(p, rid(1), Cost::new(10.0), Cost::new(1.0));
        t.insert(p, rid(2), Cost::new(20.0), Cost::new(1.0));

        // FD = 15: neighbor 1 (RD=10) is feasible, neighbor 2 (RD=20) is not.
        let (successors, best) = t.find_successors(p, Cost::new(15.0));
        assert_eq!(successors, vec![rid(1)]);
        assert_eq!(best, Cost::new(11.0));
    }

    #[test]
    fn ties_return_all_minimal_successors() {
        let mut t = TopologyTable::new();
        let p = Prefix::new(1, 24);
        t.insert(p, rid(1), Cost::new(5.0), Cost::new(5.0));
        t.insert(p, rid(2), Cost::new(5.0), Cost::new(5.0));
        t.insert(p, rid(3), Cost::new(9.0), Cost::new(5.0));

        let (successors, best) = t.find_successors(p, Cost::new(100.0));
        assert_eq!(successors, vec![rid(1), rid(2)]);
        assert_eq!(best, Cost::new(10.0));
    }

    #[test]
    fn no_feasible_successor_yields_infinite() {
        let mut t = TopologyTable::new();
        let p = Prefix::new(1, 24);
        t.insert(p, rid(1), Cost::new(50.0), Cost::new(1.0));

        let (successors, best) = t.find_successors(p, Cost::new(10.0));
        assert!(successors.is_empty());
        assert_eq!(best, Cost::INFINITE);
    }

    #[test]
    fn remove_neighbor_clears_across_all_prefixes() {
        let mut t = TopologyTable::new();
        let p1 = Prefix::new(1, 24);
        let p2 = Prefix::new(2, 24);
        t.insert(p1, rid(1), Cost::new(1.0), Cost::new(1.0));
        t.insert(p2, rid(1), Cost::new(1.0), Cost::new(1.0));
        t.insert(p2, rid(2), Cost::new(1.0), Cost::new(1.0));

        t.remove_neighbor(rid(1));

        assert!(t.is_unreachable(p1));
        assert!(!t.is_unreachable(p2));
        assert!(t.get(p2, rid(2)).is_some());
    }

    #[test]
    fn update_link_cost_refreshes_computed_distance_for_that_neighbor_only() {
        let mut t = TopologyTable::new();
        let p1 = Prefix::new(1, 24);
        let p2 = Prefix::new(2, 24);
        t.insert(p1, rid(1), Cost::new(10.0), Cost::new(1.0));
        t.insert(p2, rid(1), Cost::new(20.0), Cost::new(1.0));
        t.insert(p1, rid(2), Cost::new(10.0), Cost::new(1.0));

        t.update_link_cost(rid(1), Cost::new(5.0));

        assert_eq!(t.get(p1, rid(1)).unwrap().computed_distance, Cost::new(15.0));
        assert_eq!(t.get(p2, rid(1)).unwrap().computed_distance, Cost::new(25.0));
        assert_eq!(t.get(p1, rid(2)).unwrap().computed_distance, Cost::new(11.0));
    }

    #[test]
    fn withdrawal_by_remove_can_make_prefix_unreachable() {
        let mut t = TopologyTable::new();
        let p = Prefix::new(1, 24);
        t.insert(p, rid(1), Cost::new(1.0), Cost::new(1.0));
        assert!(!t.is_unreachable(p));
        t.remove(p, rid(1));
        assert!(t.is_unreachable(p));
    }
}
