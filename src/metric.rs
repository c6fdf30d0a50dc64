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

//! Composite link-metric model.
//!
//! Turns a [`LinkMetrics`] sample into a single scalar [`Cost`] under a set
//! of configured [`Weights`]. Two metrics compare by their composite cost
//! only; ties are genuine and are left to the caller (the
//! [`TopologyTable`](crate::topology::TopologyTable) and the
//! [`Mab`](crate::mab::Mab) tie-breaker) to resolve.

use crate::types::{Cost, LinkMetrics, Weights};

/// Compose `metrics` into a scalar [`Cost`] under `weights`.
///
/// `Cost = w_delay*delay + w_jitter*jitter + w_loss*loss + w_congestion*congestion
/// - w_stability*stability`, clamped at zero.
pub fn compose(metrics: LinkMetrics, weights: Weights) -> Cost {
    let raw = weights.w_delay * metrics.delay_us as f64
        + weights.w_jitter * metrics.jitter_us as f64
        + weights.w_loss * metrics.loss_permille as f64
        + weights.w_congestion * metrics.congestion_pct as f64
        - weights.w_stability * metrics.stability as f64;
    Cost::new(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn default_weights_match_spec() {
        let w = Weights::default();
        assert_eq!(w.w_delay, 1.0);
        assert_eq!(w.w_jitter, 0.5);
        assert_eq!(w.w_loss, 10.0);
        assert_eq!(w.w_congestion, 1.0);
        assert_eq!(w.w_stability, 0.1);
    }

    #[test]
    fn composes_linear_combination() {
        let metrics = LinkMetrics {
            delay_us: 1000,
            jitter_us: 10,
            loss_permille: 0,
            congestion_pct: 0,
            stability: 100,
        };
        let cost = compose(metrics, Weights::default());
        // 1000 + 0.5*10 + 0 + 0 - 0.1*100 = 1000 + 5 - 10 = 995
        assert_approx_eq!(cost.0, 995.0);
    }

    #[test]
    fn clamps_at_zero_when_stability_dominates() {
        let metrics = LinkMetrics {
            delay_us: 1,
            jitter_us: 0,
            loss_permille: 0,
            congestion_pct: 0,
            stability: u16::MAX,
        };
        let cost = compose(metrics, Weights::default());
        assert_eq!(cost, Cost::ZERO);
    }
}
