//! Relative-constraint (chain/cluster) legalisation and single-cell ripple
//! placement.
//!
//! Two passes run after the analytic solver and cut-spreader have produced a
//! candidate placement:
//!
//! 1. [`ConstraintLegaliser::legalise_constraints`] walks every cluster root
//!    and, where the cluster's current placement doesn't match its members'
//!    fixed offsets, searches outward from the root's current location in
//!    increasing-diameter rings for the nearest location where the whole
//!    cluster fits. Cells displaced in the process are ripped up and handed
//!    to the second pass.
//! 2. [`ConstraintLegaliser::place_single_cell`] re-homes one ripped-up cell
//!    at a time, growing its random sampling window until a legal bel is
//!    found, cascading further rip-ups if the chosen bel is occupied.

use crate::data::{PnrCellType, PnrNetlist};
use crate::ids::PnrCellId;
use crate::placement::cluster::{ClusterInfo, ClusterOracle, ClusterTable};
use crate::placement::cost::nets_touching_cell;
use crate::placement::fast_bel_index::FastBelIndex;
use crate::placement::grid::{ArchBindings, BelBucket, BindStrength, PlacementGrid};
use crate::placement::options::{PlacementOptions, PlacerError};
use aion_arch::ids::SiteId;
use rand::Rng;
use std::collections::{HashMap, HashSet};

/// Searches outward from a starting coordinate in increasing-diameter rings,
/// clamped to `[min, max]`: `start`, `start+1`, `start-1`, `start+2`,
/// `start-2`, ... Exhausted once `diameter` exceeds the span from `min` to
/// `max`.
#[derive(Debug, Clone, Copy)]
struct IncreasingDiameterSearch {
    start: i64,
    min: i64,
    max: i64,
    diameter: i64,
    sign: i64,
}

impl IncreasingDiameterSearch {
    fn new(start: i64, min: i64, max: i64) -> Self {
        Self {
            start,
            min,
            max,
            diameter: 0,
            sign: 0,
        }
    }

    fn done(&self) -> bool {
        self.diameter > (self.max - self.min)
    }

    fn get(&self) -> i64 {
        (self.start + self.sign * self.diameter).clamp(self.min, self.max)
    }

    fn next(&mut self) {
        if self.sign == 0 {
            self.sign = 1;
            self.diameter = 1;
        } else if self.sign == -1 {
            self.sign = 1;
            if self.start + self.sign * self.diameter > self.max {
                self.sign = -1;
            }
            self.diameter += 1;
        } else {
            self.sign = -1;
            if self.start + self.sign * self.diameter < self.min {
                self.sign = 1;
                self.diameter += 1;
            }
        }
    }

    fn reset(&mut self) {
        self.sign = 0;
        self.diameter = 0;
    }
}

/// Probes the uniform z-depth reserved for `bucket`, independent of `(x, y)`.
fn bucket_depth(grid: &PlacementGrid, bucket: BelBucket) -> u32 {
    let mut z = 0;
    while grid.site_at(bucket, 0, 0, z).is_some() {
        z += 1;
    }
    z
}

/// A cheap placement-quality estimate for one candidate site: summed
/// Manhattan distance from `candidate` to every other already-placed pin on
/// a net touching `cell`. Used only to rank candidates during single-cell
/// ripple placement; [`crate::placement::cost::CostModel`] is the
/// authoritative wirelength cost once a cell is committed.
fn trial_metric(netlist: &PnrNetlist, grid: &PlacementGrid, cell: PnrCellId, candidate: SiteId) -> f64 {
    let Some((cx, cy, _)) = grid.location_of(candidate) else {
        return f64::INFINITY;
    };
    let mut total = 0.0;
    for net in nets_touching_cell(netlist, cell) {
        let net_data = netlist.net(net);
        for pin_id in std::iter::once(net_data.driver).chain(net_data.sinks.iter().copied()) {
            let pin_cell = netlist.pin(pin_id).cell;
            if pin_cell == cell {
                continue;
            }
            if let Some(site) = netlist.cell(pin_cell).placement {
                if let Some((ox, oy, _)) = grid.location_of(site) {
                    total +=
                        cx.abs_diff(ox) as f64 + cy.abs_diff(oy) as f64;
                }
            }
        }
    }
    total
}

/// The total distance a cell (or its cluster) currently sits from satisfying
/// its relative placement constraints; `0` means satisfied, a large sentinel
/// means it cannot currently be evaluated (unplaced, or an infeasible
/// cluster mapping).
pub fn constraints_distance(
    netlist: &PnrNetlist,
    grid: &PlacementGrid,
    clusters: &ClusterTable,
    oracle: &dyn ClusterOracle,
    cell: PnrCellId,
) -> i64 {
    const UNKNOWN: i64 = 1_000_000;
    let Some(site) = netlist.cell(cell).placement else {
        return UNKNOWN;
    };
    let Some(cluster_id) = clusters.cluster_of(cell) else {
        return 0;
    };
    let cluster = clusters.get(cluster_id);

    if cluster.root == cell {
        let Some(placement) = oracle.get_cluster_placement(netlist, cluster, site) else {
            return UNKNOWN;
        };
        let mut dist = 0i64;
        for (member, target_site) in &placement {
            let Some(member_site) = netlist.cell(*member).placement else {
                return UNKNOWN;
            };
            let (mx, my, mz) = grid.location_of(member_site).unwrap_or((0, 0, 0));
            let (tx, ty, tz) = grid.location_of(*target_site).unwrap_or((0, 0, 0));
            dist += (mx as i64 - tx as i64).abs()
                + (my as i64 - ty as i64).abs()
                + (mz as i64 - tz as i64).abs();
        }
        dist
    } else {
        let Some(root_site) = netlist.cell(cluster.root).placement else {
            return UNKNOWN;
        };
        let (rx, ry, _) = grid.location_of(root_site).unwrap_or((0, 0, 0));
        let (cx, cy, _) = grid.location_of(site).unwrap_or((0, 0, 0));
        let offset = cluster
            .members
            .iter()
            .find(|(member, _)| *member == cell)
            .map(|(_, offset)| *offset)
            .unwrap_or_default();
        (rx as i64 + offset.dx as i64 - cx as i64).abs() + (ry as i64 + offset.dy as i64 - cy as i64).abs()
    }
}

/// Runs [`ConstraintLegaliser::legalise_constraints`] and its single-cell
/// follow-up pass.
pub struct ConstraintLegaliser<'a> {
    grid: &'a PlacementGrid,
    bindings: &'a ArchBindings,
    clusters: &'a ClusterTable,
    oracle: &'a dyn ClusterOracle,
    fast_bels: &'a FastBelIndex,
    options: &'a PlacementOptions,
    ripped_cells: HashSet<PnrCellId>,
    old_locations: HashMap<PnrCellId, (u32, u32, u32)>,
}

impl<'a> ConstraintLegaliser<'a> {
    /// Builds a legaliser over the given shared placement state.
    pub fn new(
        grid: &'a PlacementGrid,
        bindings: &'a ArchBindings,
        clusters: &'a ClusterTable,
        oracle: &'a dyn ClusterOracle,
        fast_bels: &'a FastBelIndex,
        options: &'a PlacementOptions,
    ) -> Self {
        Self {
            grid,
            bindings,
            clusters,
            oracle,
            fast_bels,
            options,
            ripped_cells: HashSet::new(),
            old_locations: HashMap::new(),
        }
    }

    fn constraints_satisfied(&self, netlist: &PnrNetlist, cell: PnrCellId) -> bool {
        constraints_distance(netlist, self.grid, self.clusters, self.oracle, cell) == 0
    }

    /// Whether `candidate` (and every member it maps to, if `cell` is a
    /// cluster root) is free or only weakly/strongly held, never displacing
    /// a user-constrained or locked cell.
    fn valid_loc_for(
        &self,
        netlist: &PnrNetlist,
        cell: PnrCellId,
        candidate: SiteId,
    ) -> Option<Vec<(PnrCellId, SiteId)>> {
        match self.clusters.cluster_of(cell) {
            None => {
                let cell_type = &netlist.cell(cell).cell_type;
                if !self.grid.is_valid_bel_for_cell_type(cell_type, candidate) {
                    return None;
                }
                if self.bindings.strength_at(candidate) >= BindStrength::Strong {
                    return None;
                }
                Some(vec![(cell, candidate)])
            }
            Some(cluster_id) => {
                let cluster = self.clusters.get(cluster_id);
                let placement = self.oracle.get_cluster_placement(netlist, cluster, candidate)?;
                for &(_, site) in &placement {
                    if self.bindings.strength_at(site) >= BindStrength::Strong {
                        return None;
                    }
                }
                Some(placement)
            }
        }
    }

    /// Sets every cell in `cluster`'s chain to [`BindStrength::Strong`],
    /// so later single-cell ripple placement will not displace it.
    fn lockdown_chain(&mut self, netlist: &PnrNetlist, cluster: &ClusterInfo) -> Result<(), PlacerError> {
        for &member in std::iter::once(&cluster.root).chain(cluster.members.iter().map(|(m, _)| m)) {
            if let Some(site) = netlist.cell(member).placement {
                self.bindings.unbind_bel(site);
                self.bindings.bind_bel(site, member, BindStrength::Strong)?;
            }
        }
        Ok(())
    }

    fn commit_solution(
        &mut self,
        netlist: &mut PnrNetlist,
        solution: &[(PnrCellId, SiteId)],
    ) -> Result<(), PlacerError> {
        for &(member, _) in solution {
            if let Some(old_site) = self.bindings.bel_of(member) {
                self.bindings.unbind_bel(old_site);
            }
        }
        for &(member, site) in solution {
            if let Some(occupant) = self.bindings.cell_at(site) {
                self.bindings.unbind_bel(site);
                netlist.cell_mut(occupant).placement = None;
                self.ripped_cells.insert(occupant);
            }
            self.bindings.bind_bel(site, member, BindStrength::Strong)?;
            netlist.cell_mut(member).placement = Some(site);
            self.ripped_cells.remove(&member);
        }
        Ok(())
    }

    /// Legalises one cluster root (a no-op and always `Ok(true)` for
    /// non-roots and already-satisfied clusters).
    fn legalise_cell(&mut self, netlist: &mut PnrNetlist, cell: PnrCellId) -> Result<bool, PlacerError> {
        if !self.clusters.is_root(cell) {
            return Ok(true);
        }
        if self.constraints_satisfied(netlist, cell) {
            if let Some(cluster_id) = self.clusters.cluster_of(cell) {
                let cluster = self.clusters.get(cluster_id).clone();
                self.lockdown_chain(netlist, &cluster)?;
            }
            return Ok(true);
        }

        let bucket = BelBucket::for_cell_type(&netlist.cell(cell).cell_type);
        let depth = bucket_depth(self.grid, bucket);
        if depth == 0 {
            return Ok(false);
        }
        let (width, height) = self.grid.dimensions();
        let current = netlist
            .cell(cell)
            .placement
            .and_then(|site| self.grid.location_of(site))
            .or_else(|| self.old_locations.get(&cell).copied())
            .unwrap_or((0, 0, 0));

        let mut x_search = IncreasingDiameterSearch::new(current.0 as i64, 0, width as i64 - 1);
        let mut y_search = IncreasingDiameterSearch::new(current.1 as i64, 0, height as i64 - 1);
        let mut z_search = IncreasingDiameterSearch::new(current.2 as i64, 0, depth as i64 - 1);

        while !x_search.done() {
            let root_loc = (x_search.get() as u32, y_search.get() as u32, z_search.get() as u32);

            z_search.next();
            if z_search.done() {
                z_search.reset();
                y_search.next();
                if y_search.done() {
                    y_search.reset();
                    x_search.next();
                }
            }

            let Some(root_site) = self.grid.site_at(bucket, root_loc.0, root_loc.1, root_loc.2) else {
                continue;
            };
            if let Some(solution) = self.valid_loc_for(netlist, cell, root_site) {
                self.commit_solution(netlist, &solution)?;
                if let Some(cluster_id) = self.clusters.cluster_of(cell) {
                    let cluster = self.clusters.get(cluster_id).clone();
                    self.lockdown_chain(netlist, &cluster)?;
                }
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Re-homes `start` (and any cell it displaces, cascading) using
    /// increasing random-window sampling. Never touches a cell that
    /// belongs to a cluster — those are the constraint legaliser's
    /// responsibility, not this pass's.
    pub fn place_single_cell(
        &mut self,
        netlist: &mut PnrNetlist,
        start: PnrCellId,
        rng: &mut impl Rng,
    ) -> Result<(), PlacerError> {
        let (max_x, max_y) = self.grid.dimensions();
        let max_diameter = max_x.max(max_y).max(1);

        let mut next = Some(start);
        while let Some(cell) = next {
            if let Some(old_site) = self.bindings.bel_of(cell) {
                self.bindings.unbind_bel(old_site);
            }
            netlist.cell_mut(cell).placement = None;

            let bucket = BelBucket::for_cell_type(&netlist.cell(cell).cell_type);
            let (ox, oy, _) = self.old_locations.get(&cell).copied().unwrap_or((0, 0, 0));

            let mut diameter: u32 = 1;
            let mut iter: u32 = 0;
            let mut total_iter: u32 = 0;
            let mut best_site: Option<SiteId> = None;
            let mut best_metric = f64::INFINITY;

            loop {
                iter += 1;
                total_iter += 1;
                if self.options.cell_placement_timeout > 0
                    && total_iter >= self.options.cell_placement_timeout
                {
                    return Err(PlacerError::Infeasible {
                        subsystem: "ConstraintLegaliser",
                        message: format!("cell {cell} exceeded its legalisation attempt cap"),
                    });
                }
                let at_threshold = iter >= 5 * diameter;
                if at_threshold {
                    iter = 0;
                    if diameter < max_diameter {
                        diameter += 1;
                    }
                    if best_site.is_some() {
                        break;
                    }
                    if diameter >= max_diameter && best_site.is_none() {
                        return Err(PlacerError::Infeasible {
                            subsystem: "ConstraintLegaliser",
                            message: format!("no legal bel found for cell {cell}"),
                        });
                    }
                }

                let clusters = self.clusters;
                let bindings = self.bindings;
                let Some(candidate) = self.fast_bels.sample_in_window(
                    self.grid,
                    bucket,
                    ox,
                    oy,
                    diameter,
                    rng,
                    |site| {
                        bindings.check_bel_avail(site)
                            || bindings
                                .cell_at(site)
                                .map(|occ| {
                                    bindings.strength_at(site) <= BindStrength::Strong
                                        && clusters.cluster_of(occ).is_none()
                                })
                                .unwrap_or(false)
                    },
                ) else {
                    continue;
                };

                let mut metric = trial_metric(netlist, self.grid, cell, candidate);
                if self.bindings.cell_at(candidate).is_some() {
                    metric *= 5.0;
                }
                if metric < best_metric {
                    best_metric = metric;
                    best_site = Some(candidate);
                }
            }

            let best_site = best_site.expect("loop only exits with a candidate or an early Infeasible return");
            let displaced = self.bindings.cell_at(best_site);
            if let Some(occupant) = displaced {
                self.bindings.unbind_bel(best_site);
                netlist.cell_mut(occupant).placement = None;
            }
            self.bindings.bind_bel(best_site, cell, BindStrength::Weak)?;
            netlist.cell_mut(cell).placement = Some(best_site);
            self.ripped_cells.remove(&cell);

            next = displaced;
        }
        Ok(())
    }

    /// Legalises every cluster's relative placement constraints, then
    /// re-homes whatever cells that process displaced. Returns the number
    /// of cells moved or left unplaced, mirroring the teacher's
    /// `print_stats` bookkeeping.
    pub fn legalise_constraints(
        &mut self,
        netlist: &mut PnrNetlist,
        rng: &mut impl Rng,
    ) -> Result<usize, PlacerError> {
        self.old_locations.clear();
        for cell in &netlist.cells {
            if let Some(site) = cell.placement {
                if let Some(loc) = self.grid.location_of(site) {
                    self.old_locations.insert(cell.id, loc);
                }
            }
        }

        let cluster_roots: Vec<PnrCellId> = self.clusters.ids().map(|id| self.clusters.get(id).root).collect();
        for root in cluster_roots {
            if !self.legalise_cell(netlist, root)? {
                return Err(PlacerError::Infeasible {
                    subsystem: "ConstraintLegaliser",
                    message: format!("failed to place chain starting at cell {root}"),
                });
            }
        }

        let ripped: Vec<PnrCellId> = self.ripped_cells.iter().copied().collect();
        for cell in ripped {
            if self.ripped_cells.contains(&cell) {
                self.place_single_cell(netlist, cell, rng)?;
            }
        }

        let mut moved = 0usize;
        for (cell, old_loc) in self.old_locations.clone() {
            match netlist.cell(cell).placement.and_then(|s| self.grid.location_of(s)) {
                Some(new_loc) if new_loc != old_loc => moved += 1,
                None => moved += 1,
                _ => {}
            }
        }
        Ok(moved)
    }
}
