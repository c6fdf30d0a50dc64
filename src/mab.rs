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

//! ε-greedy Multi-Armed Bandit tie-breaker.
//!
//! One independent bandit per prefix. Arms are candidate next-hop router
//! IDs; DUAL guarantees every candidate handed to [`Mab::select`] is already
//! a feasible successor, so the bandit is free to optimize purely for
//! observed path quality.

use crate::types::{Cost, Prefix, RouterId};
use rand::Rng;
use std::collections::HashMap;

/// Default exploration rate.
pub const DEFAULT_EPSILON: f64 = 0.1;

#[derive(Debug, Clone, Copy, Default)]
struct ArmStats {
    n_pulls: u64,
    q_estimate: f64,
}

/// Per-prefix ε-greedy bandit over candidate next hops.
#[derive(Debug, Clone)]
pub struct Mab {
    epsilon: f64,
    arms: HashMap<Prefix, HashMap<RouterId, ArmStats>>,
}

impl Default for Mab {
    fn default() -> Self {
        Self::new(DEFAULT_EPSILON)
    }
}

impl Mab {
    /// Construct a bandit with the given exploration rate.
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon, arms: HashMap::new() }
    }

    /// Pick a next hop among `candidates` for `prefix`. Candidates never
    /// pulled before have `q_estimate = 0.0`, so an unpulled arm is
    /// preferred over a known arm with negative expected reward.
    ///
    /// Callers should only invoke this when `candidates.len() > 1`; with a
    /// single candidate there is nothing to choose between.
    pub fn select(&mut self, prefix: Prefix, candidates: &[RouterId], rng: &mut impl Rng) -> RouterId {
        debug_assert!(!candidates.is_empty(), "select called with no candidates");
        if candidates.len() == 1 {
            return candidates[0];
        }

        if rng.gen::<f64>() < self.epsilon {
            let idx = rng.gen_range(0, candidates.len());
            return candidates[idx];
        }

        let table = self.arms.entry(prefix).or_default();
        let mut best = candidates[0];
        let mut best_q = table.get(&best).map(|a| a.q_estimate).unwrap_or(0.0);
        for &candidate in &candidates[1..] {
            let q = table.get(&candidate).map(|a| a.q_estimate).unwrap_or(0.0);
            if q > best_q || (q == best_q && candidate < best) {
                best = candidate;
                best_q = q;
            }
        }
        best
    }

    /// Record an observed `reward` for `(prefix, neighbor)`, updating the
    /// arm's running mean: `q <- q + (reward - q) / n`.
    pub fn observe(&mut self, prefix: Prefix, neighbor: RouterId, reward: f64) {
        let arm = self.arms.entry(prefix).or_default().entry(neighbor).or_default();
        arm.n_pulls += 1;
        arm.q_estimate += (reward - arm.q_estimate) / arm.n_pulls as f64;
    }

    /// Convenience wrapper computing `reward = -cost` for [`Mab::observe`].
    pub fn observe_cost(&mut self, prefix: Prefix, neighbor: RouterId, cost: Cost) {
        let reward = if cost.is_infinite() { f64::MIN } else { -cost.0 };
        self.observe(prefix, neighbor, reward);
    }

    /// Discard all learned state for `prefix`. Called when a prefix is
    /// withdrawn so a later re-learn starts from a clean slate.
    pub fn reset_prefix(&mut self, prefix: Prefix) {
        self.arms.remove(&prefix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::graph::NodeIndex;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rid(i: u32) -> RouterId {
        NodeIndex::new(i as usize)
    }

    #[test]
    fn single_candidate_short_circuits() {
        let mut mab = Mab::new(0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let prefix = Prefix::new(1, 24);
        assert_eq!(mab.select(prefix, &[rid(7)], &mut rng), rid(7));
    }

    #[test]
    fn zero_epsilon_always_exploits_best_arm() {
        let mut mab = Mab::new(0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let prefix = Prefix::new(1, 24);
        mab.observe(prefix, rid(1), -10.0);
        mab.observe(prefix, rid(2), -1.0);
        assert_eq!(mab.select(prefix, &[rid(1), rid(2)], &mut rng), rid(2));
    }

    #[test]
    fn ties_break_by_lowest_router_id() {
        let mut mab = Mab::new(0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let prefix = Prefix::new(1, 24);
        assert_eq!(mab.select(prefix, &[rid(5), rid(2), rid(9)], &mut rng), rid(2));
    }

    #[test]
    fn incremental_mean_matches_running_average() {
        let mut mab = Mab::new(0.0);
        let prefix = Prefix::new(1, 24);
        mab.observe(prefix, rid(1), 2.0);
        mab.observe(prefix, rid(1), 4.0);
        mab.observe(prefix, rid(1), 6.0);
        let arm = mab.arms.get(&prefix).unwrap().get(&rid(1)).unwrap();
        assert!((arm.q_estimate - 4.0).abs() < 1e-9);
    }

    #[test]
    fn reset_prefix_clears_learned_state() {
        let mut mab = Mab::new(0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let prefix = Prefix::new(1, 24);
        mab.observe(prefix, rid(1), -100.0);
        mab.observe(prefix, rid(2), -1.0);
        mab.reset_prefix(prefix);
        // With no history, both arms tie at q=0 and the lowest ID wins.
        assert_eq!(mab.select(prefix, &[rid(2), rid(1)], &mut rng), rid(1));
    }

    #[test]
    fn exploration_frequency_converges_to_epsilon() {
        let epsilon = 0.1;
        let mut mab = Mab::new(epsilon);
        let mut rng = StdRng::seed_from_u64(42);
        let prefix = Prefix::new(1, 24);
        // Arm 1 is clearly best; any pick of arm 2 beyond float noise is exploration.
        mab.observe(prefix, rid(1), 0.0);
        mab.observe(prefix, rid(2), -1000.0);

        let pulls = 10_000;
        let mut non_best = 0;
        for _ in 0..pulls {
            if mab.select(prefix, &[rid(1), rid(2)], &mut rng) == rid(2) {
                non_best += 1;
            }
        }
        let observed = non_best as f64 / pulls as f64;
        assert!((observed - epsilon).abs() < 0.02, "observed {} vs epsilon {}", observed, epsilon);
    }
}
