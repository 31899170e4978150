//! Incremental placement cost: wirelength, timing, and a net-sharing term.
//!
//! [`CostModel`] tracks each net's axis-aligned bounding box as a pair of
//! `(extreme, count-at-extreme)` pairs so that moving one cell can usually
//! update affected nets in O(1) instead of rescanning every pin. A move only
//! forces a full rescan of a net when it removes the sole pin sitting at
//! that net's current extreme on an axis.

use crate::data::PnrNetlist;
use crate::ids::{PnrCellId, PnrNetId, PnrPinId};
use crate::placement::cluster::{ClusterOracle, ClusterTable};
use crate::placement::constraint_legaliser::constraints_distance;
use crate::placement::grid::PlacementGrid;
use crate::placement::options::PlacementOptions;
use aion_arch::ids::SiteId;

/// Floor applied to cost baselines so a move made before the first
/// [`CostModel::refresh_baselines`] call never divides by zero.
const BASELINE_EPSILON: f64 = 1e-6;

/// How a single-axis bound changed after an incremental update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundChange {
    /// The axis bound is unaffected; only the move delta is known to be zero
    /// for this axis (e.g. the cell did not change `x`).
    NoChange,
    /// A pin was added or shifted strictly inside the current bound, or
    /// removed without being the sole occupant of an extreme.
    Inwards,
    /// The bound widened because a pin moved past the previous extreme.
    Outwards,
    /// The sole pin at an extreme was removed; the bound can only be
    /// recovered by rescanning every pin on the net.
    FullRecompute,
}

#[derive(Debug, Clone, Copy)]
struct AxisBounds {
    lo: i64,
    hi: i64,
    lo_count: u32,
    hi_count: u32,
}

impl AxisBounds {
    /// Removes one occupant at `v`. Checks the lo and hi extremes
    /// independently (not as an else-if) so a single-point bound, where
    /// `lo == hi`, decrements both counts correctly.
    fn remove_only(&mut self, v: i64) -> BoundChange {
        if v == self.lo && self.lo_count <= 1 {
            return BoundChange::FullRecompute;
        }
        if v == self.hi && self.hi_count <= 1 {
            return BoundChange::FullRecompute;
        }
        if v == self.lo {
            self.lo_count -= 1;
        }
        if v == self.hi {
            self.hi_count -= 1;
        }
        BoundChange::Inwards
    }

    /// Adds one occupant at `v`. As in [`Self::remove_only`], the lo and hi
    /// checks are independent so a single-point bound updates both extremes.
    fn add(&mut self, v: i64) -> BoundChange {
        let mut change = BoundChange::Inwards;
        if v < self.lo {
            self.lo = v;
            self.lo_count = 1;
            change = BoundChange::Outwards;
        } else if v == self.lo {
            self.lo_count += 1;
        }
        if v > self.hi {
            self.hi = v;
            self.hi_count = 1;
            change = BoundChange::Outwards;
        } else if v == self.hi {
            self.hi_count += 1;
        }
        change
    }

    fn update_pin_move(&mut self, old: i64, new: i64) -> BoundChange {
        if old == new {
            return BoundChange::NoChange;
        }
        if matches!(self.remove_only(old), BoundChange::FullRecompute) {
            return BoundChange::FullRecompute;
        }
        self.add(new)
    }

    fn span(&self) -> f64 {
        (self.hi - self.lo) as f64
    }
}

/// Builds bounds with accurate extreme-occupant counts from a full pin list.
fn axis_bounds_with_counts(values: &[i64]) -> Option<AxisBounds> {
    if values.is_empty() {
        return None;
    }
    let lo = *values.iter().min().unwrap();
    let hi = *values.iter().max().unwrap();
    let lo_count = values.iter().filter(|&&v| v == lo).count() as u32;
    let hi_count = values.iter().filter(|&&v| v == hi).count() as u32;
    Some(AxisBounds {
        lo,
        hi,
        lo_count,
        hi_count,
    })
}

#[derive(Debug, Clone)]
struct NetBounds {
    x: AxisBounds,
    y: AxisBounds,
}

impl NetBounds {
    fn hpwl(&self, scale_x: f64, scale_y: f64) -> f64 {
        scale_x * self.x.span() + scale_y * self.y.span()
    }
}

/// Incremental cost tracker over a netlist's current placement.
///
/// Holds one [`NetBounds`] per net (`None` while fewer than one of its pins
/// is placed) plus a running total HPWL, so callers can query
/// [`CostModel::total_hpwl`] in O(1) after each [`CostModel::move_cell`].
pub struct CostModel {
    bounds: Vec<Option<NetBounds>>,
    scale_x: f64,
    scale_y: f64,
    total_hpwl: f64,
    baseline_wirelen: f64,
    baseline_timing: f64,
}

impl CostModel {
    /// Builds a cost model from a netlist's current placement.
    pub fn new(netlist: &PnrNetlist, grid: &PlacementGrid, options: &PlacementOptions) -> Self {
        let mut model = Self {
            bounds: vec![None; netlist.net_count()],
            scale_x: options.hpwl_scale_x,
            scale_y: options.hpwl_scale_y,
            total_hpwl: 0.0,
            baseline_wirelen: BASELINE_EPSILON,
            baseline_timing: BASELINE_EPSILON,
        };
        for i in 0..netlist.net_count() {
            model.recompute_net(PnrNetId::from_raw(i as u32), netlist, grid);
        }
        model.baseline_wirelen = model.total_hpwl.max(BASELINE_EPSILON);
        model
    }

    /// Re-anchors the cost-normalization baselines to the current committed
    /// cost, the way a rolling acceptance criterion tracks its last-accepted
    /// cost rather than a cost fixed at construction time. Wirelength is
    /// always refreshed; timing only if `criticality` is supplied.
    pub fn refresh_baselines(
        &mut self,
        netlist: &PnrNetlist,
        grid: &PlacementGrid,
        options: &PlacementOptions,
        criticality: Option<&dyn Fn(PnrPinId) -> f64>,
    ) {
        self.baseline_wirelen = self.total_hpwl.max(BASELINE_EPSILON);
        if let Some(crit_fn) = criticality {
            self.baseline_timing = timing_cost(netlist, grid, options.crit_exp, crit_fn).max(BASELINE_EPSILON);
        }
    }

    /// Total wirelength cost across every net.
    pub fn total_hpwl(&self) -> f64 {
        self.total_hpwl
    }

    /// Wirelength cost of a single net (`0.0` if fewer than two pins are placed).
    pub fn net_hpwl(&self, net: PnrNetId) -> f64 {
        self.bounds[net.as_raw() as usize]
            .as_ref()
            .map(|b| b.hpwl(self.scale_x, self.scale_y))
            .unwrap_or(0.0)
    }

    /// Rescans every pin on `net` and rebuilds its bounds from scratch.
    pub fn recompute_net(&mut self, net: PnrNetId, netlist: &PnrNetlist, grid: &PlacementGrid) {
        let old_hpwl = self.net_hpwl(net);
        let net_data = netlist.net(net);

        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for pin_id in std::iter::once(net_data.driver).chain(net_data.sinks.iter().copied()) {
            let cell = netlist.pin(pin_id).cell;
            if let Some(site) = netlist.cell(cell).placement {
                if let Some((x, y, _)) = grid.location_of(site) {
                    xs.push(x as i64);
                    ys.push(y as i64);
                }
            }
        }

        let bounds = match (axis_bounds_with_counts(&xs), axis_bounds_with_counts(&ys)) {
            (Some(x), Some(y)) => Some(NetBounds { x, y }),
            _ => None,
        };
        self.bounds[net.as_raw() as usize] = bounds;
        self.total_hpwl += self.net_hpwl(net) - old_hpwl;
    }

    /// Moves `cell` from `old_site` to `new_site`, incrementally updating
    /// every net it touches, and returns the signed total HPWL delta.
    ///
    /// Callers must apply this after the cell's `placement` field has
    /// already been updated in `netlist`, so [`PlacementGrid::location_of`]
    /// resolves the new position for any net this triggers a full
    /// recompute on.
    pub fn move_cell(
        &mut self,
        cell: PnrCellId,
        old_site: Option<SiteId>,
        new_site: Option<SiteId>,
        netlist: &PnrNetlist,
        grid: &PlacementGrid,
    ) -> f64 {
        let before = self.total_hpwl;
        for net in nets_touching_cell(netlist, cell) {
            self.update_net_for_move(net, old_site, new_site, netlist, grid);
        }
        self.total_hpwl - before
    }

    fn update_net_for_move(
        &mut self,
        net: PnrNetId,
        old_site: Option<SiteId>,
        new_site: Option<SiteId>,
        netlist: &PnrNetlist,
        grid: &PlacementGrid,
    ) {
        let old_hpwl = self.net_hpwl(net);
        let old_pos = old_site.and_then(|s| grid.location_of(s));
        let new_pos = new_site.and_then(|s| grid.location_of(s));

        let idx = net.as_raw() as usize;
        let needs_full = match self.bounds[idx].as_mut() {
            None => true,
            Some(bounds) => match (old_pos, new_pos) {
                (None, None) => false,
                (None, Some((nx, ny, _))) => {
                    bounds.x.add(nx as i64);
                    bounds.y.add(ny as i64);
                    false
                }
                (Some((ox, oy, _)), None) => {
                    matches!(bounds.x.remove_only(ox as i64), BoundChange::FullRecompute)
                        || matches!(bounds.y.remove_only(oy as i64), BoundChange::FullRecompute)
                }
                (Some((ox, oy, _)), Some((nx, ny, _))) => {
                    matches!(
                        bounds.x.update_pin_move(ox as i64, nx as i64),
                        BoundChange::FullRecompute
                    ) || matches!(
                        bounds.y.update_pin_move(oy as i64, ny as i64),
                        BoundChange::FullRecompute
                    )
                }
            },
        };

        if needs_full {
            self.recompute_net(net, netlist, grid);
        } else {
            let new_hpwl = self.net_hpwl(net);
            self.total_hpwl += new_hpwl - old_hpwl;
        }
    }

    /// Total cost combining wirelength, net-sharing, a constraint-violation
    /// penalty, and (when `timing_driven`) a criticality-weighted timing
    /// term, blended by `options.lambda`.
    ///
    /// Wirelength and timing are each normalized against their own rolling
    /// baseline (see [`Self::refresh_baselines`]) before blending, so
    /// `lambda` trades off two terms of comparable scale rather than raw
    /// tile-distance against raw nanoseconds.
    pub fn total_cost(
        &self,
        netlist: &PnrNetlist,
        grid: &PlacementGrid,
        clusters: &ClusterTable,
        oracle: &dyn ClusterOracle,
        options: &PlacementOptions,
        criticality: Option<&dyn Fn(PnrPinId) -> f64>,
    ) -> f64 {
        let net_share = options.net_share_weight * net_share_cost(netlist, grid);
        let constraint_penalty = options.constraint_weight
            * total_constraint_distance(netlist, grid, clusters, oracle)
            / self.baseline_wirelen;

        if !options.timing_driven {
            return self.total_hpwl + net_share + constraint_penalty;
        }

        let timing = criticality
            .map(|f| timing_cost(netlist, grid, options.crit_exp, f))
            .unwrap_or(0.0);
        (1.0 - options.lambda) * (self.total_hpwl / self.baseline_wirelen)
            + options.lambda * (timing / self.baseline_timing)
            + net_share
            + constraint_penalty
    }
}

/// Sum of [`constraints_distance`] across every non-singleton cluster's
/// root. Singleton clusters always have zero distance and are skipped.
pub fn total_constraint_distance(
    netlist: &PnrNetlist,
    grid: &PlacementGrid,
    clusters: &ClusterTable,
    oracle: &dyn ClusterOracle,
) -> f64 {
    let mut total = 0i64;
    for id in clusters.ids() {
        let cluster = clusters.get(id);
        if cluster.is_singleton() {
            continue;
        }
        total += constraints_distance(netlist, grid, clusters, oracle, cluster.root);
    }
    total as f64
}

/// Nets with at least one pin on `cell`.
pub(crate) fn nets_touching_cell(netlist: &PnrNetlist, cell: PnrCellId) -> Vec<PnrNetId> {
    let mut nets = std::collections::HashSet::new();
    for pin in &netlist.pins {
        if pin.cell == cell {
            if let Some(net_id) = pin.net {
                nets.insert(net_id);
            }
        }
    }
    nets.into_iter().collect()
}

/// Criticality-weighted predicted-delay sum across every driver/sink pair.
pub fn timing_cost(
    netlist: &PnrNetlist,
    grid: &PlacementGrid,
    crit_exp: i32,
    criticality: &dyn Fn(PnrPinId) -> f64,
) -> f64 {
    let mut cost = 0.0;
    for net in &netlist.nets {
        let driver_cell = netlist.pin(net.driver).cell;
        let Some(driver_site) = netlist.cell(driver_cell).placement else {
            continue;
        };
        for &sink_pin in &net.sinks {
            let sink_cell = netlist.pin(sink_pin).cell;
            let Some(sink_site) = netlist.cell(sink_cell).placement else {
                continue;
            };
            let delay = grid.predict_delay_ns(driver_site, sink_site);
            let crit = criticality(sink_pin).clamp(0.0, 1.0);
            cost += delay * crit.powi(crit_exp);
        }
    }
    cost
}

/// Crude local-congestion proxy: counts pin pairs on the same net that
/// currently occupy the same tile, scaled by `net_share_weight` by the caller.
pub fn net_share_cost(netlist: &PnrNetlist, grid: &PlacementGrid) -> f64 {
    let mut cost = 0.0;
    for net in &netlist.nets {
        let mut tiles: Vec<(u32, u32)> = Vec::new();
        for pin_id in std::iter::once(net.driver).chain(net.sinks.iter().copied()) {
            let cell = netlist.pin(pin_id).cell;
            if let Some(site) = netlist.cell(cell).placement {
                if let Some((x, y, _)) = grid.location_of(site) {
                    tiles.push((x, y));
                }
            }
        }
        for i in 0..tiles.len() {
            for j in (i + 1)..tiles.len() {
                if tiles[i] == tiles[j] {
                    cost += 1.0;
                }
            }
        }
    }
    cost
}
