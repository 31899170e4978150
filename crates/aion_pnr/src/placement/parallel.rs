//! Partitioned parallel refinement.
//!
//! Splits the placed design into disjoint grid regions by recursive
//! alternating-axis median cuts (mirroring the teacher's `Partition::split`),
//! then runs one OS thread per region via `std::thread::scope`, joined at
//! the end of every round — the same barrier-between-iterations structure
//! the teacher's thread pool uses. Unlike the teacher's shared-memory
//! threads mutating one binding table directly under a lock, each worker
//! here only *proposes* moves by reading its own region's cells; every
//! accepted move is committed back on the calling thread through
//! [`ArchBindings`] once every worker has joined, so the shared mutable
//! state (bindings, cost accounting) is only ever touched sequentially.
//! This keeps the round-barrier structure the teacher uses while staying
//! inside Rust's aliasing rules.

use crate::data::PnrNetlist;
use crate::ids::{PnrCellId, PnrPinId};
use crate::placement::cluster::{ClusterOracle, ClusterTable, GridClusterOracle};
use crate::placement::cost::CostModel;
use crate::placement::fast_bel_index::FastBelIndex;
use crate::placement::grid::{ArchBindings, BelBucket, BindStrength, PlacementGrid};
use crate::placement::options::PlacementOptions;
use aion_arch::ids::SiteId;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// A rectangular grid region and the cells whose current position falls
/// inside it.
#[derive(Debug, Clone)]
struct Partition {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
    cells: Vec<PnrCellId>,
}

/// Splits `cells` into up to `target` leaf partitions by recursively
/// bisecting the bounding box along alternating axes at the cell-count
/// median, matching the teacher's region split.
fn partition_cells(netlist: &PnrNetlist, grid: &PlacementGrid, cells: Vec<PnrCellId>, target: usize) -> Vec<Partition> {
    let (max_x, max_y) = grid.dimensions();
    let root = Partition {
        x0: 0,
        y0: 0,
        x1: max_x.saturating_sub(1),
        y1: max_y.saturating_sub(1),
        cells,
    };
    let mut leaves = vec![root];
    let mut yaxis = false;
    while leaves.len() < target {
        let Some((idx, _)) = leaves.iter().enumerate().filter(|(_, p)| p.cells.len() >= 2).max_by_key(|(_, p)| p.cells.len()) else {
            break;
        };
        let part = leaves.remove(idx);
        let (left, right) = split(netlist, grid, part, yaxis);
        yaxis = !yaxis;
        leaves.push(left);
        leaves.push(right);
    }
    leaves.into_iter().filter(|p| !p.cells.is_empty()).collect()
}

fn split(netlist: &PnrNetlist, grid: &PlacementGrid, mut part: Partition, yaxis: bool) -> (Partition, Partition) {
    part.cells.sort_by_key(|&c| {
        let site = netlist.cell(c).placement;
        let pos = site.and_then(|s| grid.location_of(s));
        if yaxis {
            pos.map(|(_, y, _)| y).unwrap_or(0)
        } else {
            pos.map(|(x, _, _)| x).unwrap_or(0)
        }
    });
    let pivot_idx = part.cells.len() / 2;
    let pivot_coord = {
        let site = netlist.cell(part.cells[pivot_idx.saturating_sub(1).max(0)]).placement;
        let pos = site.and_then(|s| grid.location_of(s));
        if yaxis {
            pos.map(|(_, y, _)| y).unwrap_or(part.y0)
        } else {
            pos.map(|(x, _, _)| x).unwrap_or(part.x0)
        }
    };
    let (left_cells, right_cells) = part.cells.split_at(pivot_idx.max(1).min(part.cells.len()));
    let (mut left, mut right) = (
        Partition {
            x0: part.x0,
            y0: part.y0,
            x1: part.x1,
            y1: part.y1,
            cells: left_cells.to_vec(),
        },
        Partition {
            x0: part.x0,
            y0: part.y0,
            x1: part.x1,
            y1: part.y1,
            cells: right_cells.to_vec(),
        },
    );
    if yaxis {
        left.y1 = pivot_coord;
        right.y0 = (pivot_coord + 1).min(part.y1);
    } else {
        left.x1 = pivot_coord;
        right.x0 = (pivot_coord + 1).min(part.x1);
    }
    (left, right)
}

/// A proposed, not-yet-committed relocation of a single cell.
struct Proposal {
    cell: PnrCellId,
    old_site: SiteId,
    new_site: SiteId,
}

/// Consecutive non-improving rounds tolerated before stopping early, the
/// same stall-detection idea as [`crate::placement::anneal`]'s
/// `MAX_ITERS_WITHOUT_PROGRESS`, but applied per-round since the parallel
/// refiner has no temperature schedule of its own to taper.
const MAX_ROUNDS_WITHOUT_PROGRESS: u32 = 2;

/// Runs up to `rounds` batches of partitioned parallel refinement over
/// every unlocked cluster root, committing accepted swaps sequentially
/// after each batch's proposals are gathered concurrently. Stops early once
/// [`MAX_ROUNDS_WITHOUT_PROGRESS`] consecutive rounds fail to improve total
/// cost.
#[allow(clippy::too_many_arguments)]
pub fn parallel_refine(
    netlist: &mut PnrNetlist,
    grid: &PlacementGrid,
    bindings: &ArchBindings,
    clusters: &ClusterTable,
    fast_bels: &FastBelIndex,
    cost: &mut CostModel,
    options: &PlacementOptions,
    criticality: Option<&dyn Fn(PnrPinId) -> f64>,
    rounds: u32,
    seed: u64,
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

    let n_partitions = options.threads.max(1) as usize;
    let oracle = GridClusterOracle::new(grid);
    cost.refresh_baselines(netlist, grid, options, criticality);
    let mut best_cost = cost.total_cost(netlist, grid, clusters, &oracle, options, criticality);
    let mut no_progress = 0u32;

    for round in 0..rounds {
        let partitions = partition_cells(netlist, grid, movable.clone(), n_partitions);
        // Reborrow as shared so each worker closure can copy the reference
        // into its own `move` capture instead of fighting over the unique
        // `&mut` (which only `apply_if_beneficial` needs, after the join).
        let netlist_shared: &PnrNetlist = netlist;
        let proposals: Vec<Proposal> = std::thread::scope(|scope| {
            let handles: Vec<_> = partitions
                .iter()
                .enumerate()
                .map(|(i, partition)| {
                    let partition_seed = seed.wrapping_add(round as u64 * 1000 + i as u64);
                    scope.spawn(move || propose_partition_moves(netlist_shared, grid, fast_bels, bindings, partition, partition_seed))
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().expect("partition worker panicked")).collect()
        });

        for proposal in proposals {
            apply_if_beneficial(netlist, grid, bindings, clusters, &oracle, cost, options, criticality, &proposal);
        }

        let current_cost = cost.total_cost(netlist, grid, clusters, &oracle, options, criticality);
        if current_cost < best_cost {
            best_cost = current_cost;
            no_progress = 0;
        } else {
            no_progress += 1;
            if no_progress >= MAX_ROUNDS_WITHOUT_PROGRESS {
                break;
            }
        }
    }
}

/// Proposes a batch of candidate swaps for cells local to `partition`,
/// reading netlist/bindings state but never mutating it. Runs on its own
/// scoped worker thread, one per partition, joined before any proposal is
/// committed.
fn propose_partition_moves(
    netlist: &PnrNetlist,
    grid: &PlacementGrid,
    fast_bels: &FastBelIndex,
    bindings: &ArchBindings,
    partition: &Partition,
    seed: u64,
) -> Vec<Proposal> {
    let mut rng = StdRng::seed_from_u64(seed);
    let diameter = (partition.x1 - partition.x0).max(partition.y1 - partition.y0).max(1);
    let mut out = Vec::new();
    for &cell in &partition.cells {
        let Some(old_site) = netlist.cell(cell).placement else {
            continue;
        };
        let Some((cx, cy, _)) = grid.location_of(old_site) else {
            continue;
        };
        if cx < partition.x0 || cx > partition.x1 || cy < partition.y0 || cy > partition.y1 {
            continue;
        }
        let bucket = BelBucket::for_cell_type(&netlist.cell(cell).cell_type);
        let cx_clamped = cx.clamp(partition.x0, partition.x1);
        let cy_clamped = cy.clamp(partition.y0, partition.y1);
        let Some(new_site) = fast_bels.sample_in_window(grid, bucket, cx_clamped, cy_clamped, diameter, &mut rng, |s| {
            bindings.check_bel_avail(s)
        }) else {
            continue;
        };
        if new_site == old_site {
            continue;
        }
        if let Some((nx, ny, _)) = grid.location_of(new_site) {
            if nx < partition.x0 || nx > partition.x1 || ny < partition.y0 || ny > partition.y1 {
                continue;
            }
        }
        out.push(Proposal { cell, old_site, new_site });
    }
    out
}

/// Commits `proposal` into `new_site` if still free and the swap does not
/// worsen total cost, using the same incremental accounting as the
/// sequential annealer.
#[allow(clippy::too_many_arguments)]
fn apply_if_beneficial(
    netlist: &mut PnrNetlist,
    grid: &PlacementGrid,
    bindings: &ArchBindings,
    clusters: &ClusterTable,
    oracle: &dyn ClusterOracle,
    cost: &mut CostModel,
    options: &PlacementOptions,
    criticality: Option<&dyn Fn(PnrPinId) -> f64>,
    proposal: &Proposal,
) {
    if netlist.cell(proposal.cell).placement != Some(proposal.old_site) {
        return; // stale proposal: cell already moved by an earlier commit this round.
    }
    if !bindings.check_bel_avail(proposal.new_site) {
        return;
    }
    if !grid.is_valid_bel_for_cell_type(&netlist.cell(proposal.cell).cell_type, proposal.new_site) {
        return;
    }

    let before = cost.total_cost(netlist, grid, clusters, oracle, options, criticality);
    bindings.unbind_bel(proposal.old_site);
    bindings
        .bind_bel(proposal.new_site, proposal.cell, BindStrength::Weak)
        .expect("target just checked available");
    netlist.cell_mut(proposal.cell).placement = Some(proposal.new_site);
    cost.move_cell(proposal.cell, Some(proposal.old_site), Some(proposal.new_site), netlist, grid);

    let after = cost.total_cost(netlist, grid, clusters, oracle, options, criticality);
    if after > before {
        bindings.unbind_bel(proposal.new_site);
        bindings
            .bind_bel(proposal.old_site, proposal.cell, BindStrength::Weak)
            .expect("source just vacated");
        netlist.cell_mut(proposal.cell).placement = Some(proposal.old_site);
        cost.move_cell(proposal.cell, Some(proposal.new_site), Some(proposal.old_site), netlist, grid);
    } else {
        cost.refresh_baselines(netlist, grid, options, criticality);
    }
}
