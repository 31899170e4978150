//! Simulated-annealing placement refinement.
//!
//! Starting from a legal placement (seeded, solved, spread and legalised),
//! repeatedly proposes swapping one free cell onto a randomly chosen bel
//! within a shrinking search window and accepts or rejects the move with
//! the Metropolis criterion. The window diameter and temperature both
//! adapt to the recent acceptance rate, the same feedback loop the
//! teacher's SA placer uses to taper exploration as the design converges.

use crate::data::PnrNetlist;
use crate::ids::{PnrCellId, PnrPinId};
use crate::placement::cluster::{ClusterOracle, ClusterTable, GridClusterOracle};
use crate::placement::cost::CostModel;
use crate::placement::fast_bel_index::FastBelIndex;
use crate::placement::grid::{ArchBindings, BelBucket, BindStrength, PlacementGrid};
use crate::placement::options::PlacementOptions;
use rand::Rng;

/// Moves attempted per cell, per outer iteration, before the schedule is
/// re-evaluated.
const MOVES_PER_CELL_PER_ITER: u32 = 15;

/// Consecutive non-improving iterations tolerated once temperature has
/// bottomed out before the annealer stops.
const MAX_ITERS_WITHOUT_PROGRESS: u32 = 5;

/// Runs simulated annealing over every unlocked cluster root (or singleton
/// cell) in `netlist`, mutating placements and bindings in place, until the
/// temperature has cooled and stopped improving the cost.
#[allow(clippy::too_many_arguments)]
pub fn refine(
    netlist: &mut PnrNetlist,
    grid: &PlacementGrid,
    bindings: &ArchBindings,
    clusters: &ClusterTable,
    fast_bels: &FastBelIndex,
    cost: &mut CostModel,
    options: &PlacementOptions,
    criticality: Option<&dyn Fn(PnrPinId) -> f64>,
    rng: &mut impl Rng,
) {
    let movable: Vec<PnrCellId> = netlist
        .cells
        .iter()
        .map(|c| c.id)
        .filter(|&id| {
            !netlist.cell(id).is_fixed
                && clusters.is_root(id)
                && bindings.bel_of(id).map(|s| bindings.strength_at(s) <= BindStrength::Weak).unwrap_or(true)
        })
        .collect();
    if movable.len() < 2 {
        return;
    }

    let oracle = GridClusterOracle::new(grid);
    cost.refresh_baselines(netlist, grid, options, criticality);

    let (max_x, max_y) = grid.dimensions();
    let mut diameter = max_x.max(max_y).max(1);
    let mut temp = options.start_temp;
    let mut no_progress = 0u32;
    let mut best_cost = cost.total_cost(netlist, grid, clusters, &oracle, options, criticality);

    loop {
        let mut moves = 0u32;
        let mut accepted = 0u32;

        for _ in 0..MOVES_PER_CELL_PER_ITER {
            for &cell in &movable {
                let Some(old_site) = netlist.cell(cell).placement else {
                    continue;
                };
                let Some((cx, cy, _)) = grid.location_of(old_site) else {
                    continue;
                };
                let bucket = BelBucket::for_cell_type(&netlist.cell(cell).cell_type);
                let Some(new_site) = fast_bels.sample_in_window(grid, bucket, cx, cy, diameter, rng, |s| {
                    bindings.check_bel_avail(s) || bindings.cell_at(s).map(|c| c == cell).unwrap_or(false)
                }) else {
                    continue;
                };
                if new_site == old_site {
                    continue;
                }
                moves += 1;
                if try_swap(
                    netlist, grid, bindings, clusters, &oracle, cost, options, criticality, cell, old_site, new_site,
                    temp, rng,
                ) {
                    accepted += 1;
                }
            }
        }

        let current_cost = cost.total_cost(netlist, grid, clusters, &oracle, options, criticality);
        if current_cost < best_cost {
            best_cost = current_cost;
            no_progress = 0;
        } else {
            no_progress += 1;
        }

        if temp <= 1e-7 && no_progress >= MAX_ITERS_WITHOUT_PROGRESS {
            break;
        }

        let accept_rate = if moves > 0 { accepted as f64 / moves as f64 } else { 0.0 };
        let window_span = max_x.max(max_y) + 1;
        let next_diameter = (diameter as f64 * (1.0 - 0.44 + accept_rate)).round().max(1.0) as u32;
        diameter = next_diameter.clamp(1, window_span);

        if accept_rate > 0.96 {
            temp *= 0.5;
        } else if accept_rate > 0.8 {
            temp *= 0.9;
        } else if accept_rate > 0.15 && diameter > 1 {
            temp *= 0.95;
        } else {
            temp *= 0.8;
        }
    }
}

/// Attempts swapping `cell` (currently at `old_site`) onto `new_site`,
/// displacing whatever occupies it if anything, accepting under the
/// Metropolis criterion. Returns whether the swap was kept.
#[allow(clippy::too_many_arguments)]
fn try_swap(
    netlist: &mut PnrNetlist,
    grid: &PlacementGrid,
    bindings: &ArchBindings,
    clusters: &ClusterTable,
    oracle: &dyn ClusterOracle,
    cost: &mut CostModel,
    options: &PlacementOptions,
    criticality: Option<&dyn Fn(PnrPinId) -> f64>,
    cell: PnrCellId,
    old_site: aion_arch::ids::SiteId,
    new_site: aion_arch::ids::SiteId,
    temp: f64,
    rng: &mut impl Rng,
) -> bool {
    let other_cell = bindings.cell_at(new_site);
    if let Some(other) = other_cell {
        if other == cell {
            return false;
        }
        if bindings.strength_at(new_site) > BindStrength::Weak {
            return false;
        }
        if !grid.is_valid_bel_for_cell_type(&netlist.cell(other).cell_type, old_site) {
            return false;
        }
    }
    if !grid.is_valid_bel_for_cell_type(&netlist.cell(cell).cell_type, new_site) {
        return false;
    }

    let before = cost.total_cost(netlist, grid, clusters, oracle, options, criticality);

    bindings.unbind_bel(old_site);
    if other_cell.is_some() {
        bindings.unbind_bel(new_site);
    }
    // Both sites were just vacated by us, so binding the swap can only fail
    // on an internal bookkeeping bug, not contention.
    bindings.bind_bel(new_site, cell, BindStrength::Weak).expect("swap target just vacated");
    netlist.cell_mut(cell).placement = Some(new_site);
    cost.move_cell(cell, Some(old_site), Some(new_site), netlist, grid);

    if let Some(other) = other_cell {
        bindings.bind_bel(old_site, other, BindStrength::Weak).expect("swap source just vacated");
        netlist.cell_mut(other).placement = Some(old_site);
        cost.move_cell(other, Some(new_site), Some(old_site), netlist, grid);
    }

    let after = cost.total_cost(netlist, grid, clusters, oracle, options, criticality);
    let delta = after - before;

    let accept = delta < 0.0 || (temp > 1e-8 && rng.gen::<f64>() < (-delta / temp).exp());
    if accept {
        cost.refresh_baselines(netlist, grid, options, criticality);
        return true;
    }

    // Reject: undo by replaying the same swap in reverse.
    bindings.unbind_bel(new_site);
    if other_cell.is_some() {
        bindings.unbind_bel(old_site);
    }
    bindings.bind_bel(old_site, cell, BindStrength::Weak).expect("swap target just vacated");
    netlist.cell_mut(cell).placement = Some(old_site);
    cost.move_cell(cell, Some(new_site), Some(old_site), netlist, grid);

    if let Some(other) = other_cell {
        bindings.bind_bel(new_site, other, BindStrength::Weak).expect("swap source just vacated");
        netlist.cell_mut(other).placement = Some(new_site);
        cost.move_cell(other, Some(old_site), Some(new_site), netlist, grid);
    }
    false
}
