//! Top-level placement orchestration.
//!
//! Runs the full pipeline in the order the teacher's `HeAPPlacer::place`
//! uses: seed a legal starting point, alternate analytic solve rounds with
//! cut-based spreading until the solved wirelength tracks the legalised
//! one closely enough, snap every cell onto a concrete device site, settle
//! relative placement constraints, then hand off to whichever refinement
//! core the caller asked for.

use crate::data::PnrNetlist;
use crate::ids::{PnrCellId, PnrPinId};
use crate::placement::cluster::{ClusterTable, GridClusterOracle};
use crate::placement::constraint_legaliser::ConstraintLegaliser;
use crate::placement::cost::CostModel;
use crate::placement::cut_spreader;
use crate::placement::fast_bel_index::FastBelIndex;
use crate::placement::grid::{ArchBindings, BelBucket, BindStrength, PlacementGrid};
use crate::placement::options::{PlacementOptions, PlacerError};
use crate::placement::seed::seed_placement;
use crate::placement::solver::{build_solve_direction, update_all_chains, SolveState};
use crate::placement::{anneal, parallel};
use aion_arch::Architecture;
use rand::Rng;

/// Consecutive non-improving solve/spread rounds tolerated before the
/// analytic phase is considered converged.
const MAX_STALLED_ROUNDS: u32 = 5;

/// Round cap for [`parallel::parallel_refine`]. The parallel refiner has no
/// temperature schedule of its own to taper exploration, so this is a
/// generous safety cap alongside its own stall-detection early exit.
const MAX_PARALLEL_REFINE_ROUNDS: u32 = 64;

/// Outcome of the analytic + legalisation phase, reported for diagnostics
/// and regression tracking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaceReport {
    /// Solved (pre-legalisation) half-perimeter wirelength at convergence.
    pub solved_hpwl: f64,
    /// Half-perimeter wirelength once every cell sits on a real site.
    pub legal_hpwl: f64,
    /// Number of solve/spread rounds run.
    pub rounds: u32,
    /// Cells moved or re-homed by the final constraint legalisation pass.
    pub constraints_moved: usize,
}

/// Runs analytic placement, legalisation, and refinement over every cell in
/// `netlist`, binding each to a concrete site in `bindings`.
///
/// `criticality`, when timing-driven placement is enabled, supplies a
/// per-pin criticality in `[0, 1]`; it must be safe to call from multiple
/// threads at once since the analytic solver runs the X and Y axes
/// concurrently.
#[allow(clippy::too_many_arguments)]
pub fn place(
    netlist: &mut PnrNetlist,
    arch: &dyn Architecture,
    grid: &PlacementGrid,
    bindings: &ArchBindings,
    options: &PlacementOptions,
    criticality: Option<&(dyn Fn(PnrPinId) -> f64 + Sync)>,
    rng: &mut impl Rng,
) -> Result<PlaceReport, PlacerError> {
    for cell in &netlist.cells {
        if cell.is_fixed {
            if let Some(site) = cell.placement {
                bindings.bind_bel(site, cell.id, BindStrength::Locked)?;
            }
        }
    }

    let clusters = ClusterTable::trivial_for(netlist);
    let fast_bels = FastBelIndex::new(options.min_bels_for_grid_pick);

    seed_placement(netlist, grid, bindings, &clusters, &fast_bels, rng)?;

    let solve_cells: Vec<PnrCellId> = netlist
        .cells
        .iter()
        .map(|c| c.id)
        .filter(|&id| !netlist.cell(id).is_fixed && clusters.is_root(id))
        .collect();

    let mut state = SolveState::from_netlist(netlist, grid);
    update_all_chains(&mut state, &clusters, grid);

    let sequential = criticality.map(|f| f as &dyn Fn(PnrPinId) -> f64);

    // A handful of unanchored rounds to pull cells together before the
    // legalisation anchor starts mattering.
    for _ in 0..2 {
        build_solve_direction(netlist, grid, &clusters, options, &mut state, &solve_cells, None, criticality);
        update_all_chains(&mut state, &clusters, grid);
    }

    let mut solved_hpwl = analytic_hpwl(netlist, &solve_cells, &state, options, true);
    let mut legal_hpwl = solved_hpwl;
    let mut stalled = 0u32;
    let mut rounds = 0u32;

    loop {
        rounds += 1;
        build_solve_direction(netlist, grid, &clusters, options, &mut state, &solve_cells, Some(rounds), criticality);
        update_all_chains(&mut state, &clusters, grid);

        let new_solved = analytic_hpwl(netlist, &solve_cells, &state, options, true);

        cut_spreader::spread(netlist, grid, &clusters, &mut state, &solve_cells, options.beta);
        update_all_chains(&mut state, &clusters, grid);
        state.commit_legal_positions();

        let new_legal = analytic_hpwl(netlist, &solve_cells, &state, options, false);

        if new_solved >= solved_hpwl {
            stalled += 1;
        } else {
            stalled = 0;
        }
        solved_hpwl = new_solved;
        legal_hpwl = new_legal;

        if stalled >= MAX_STALLED_ROUNDS || solved_hpwl > legal_hpwl * 0.8 {
            break;
        }
    }

    snap_to_sites(netlist, grid, bindings, &fast_bels, &clusters, &state, &solve_cells, rng)?;

    let oracle = GridClusterOracle::new(grid);
    let mut legaliser = ConstraintLegaliser::new(grid, bindings, &clusters, &oracle, &fast_bels, options);
    let constraints_moved = legaliser.legalise_constraints(netlist, rng)?;

    let mut cost = CostModel::new(netlist, grid, options);
    if options.parallel_refine {
        parallel::parallel_refine(
            netlist, grid, bindings, &clusters, &fast_bels, &mut cost, options, sequential, MAX_PARALLEL_REFINE_ROUNDS,
            rng.gen(),
        );
    } else {
        anneal::refine(netlist, grid, bindings, &clusters, &fast_bels, &mut cost, options, sequential, rng);
    }

    Ok(PlaceReport {
        solved_hpwl,
        legal_hpwl,
        rounds,
        constraints_moved,
    })
}

/// Half-perimeter wirelength read directly off `state` rather than actual
/// site bindings — used only to judge solve/spread convergence, never
/// reported as the final cost. `use_raw` selects the solver's continuous
/// position (`true`, pre-spread) or its rounded legal position (`false`,
/// post-spread), so callers can compare the two phases of one round.
fn analytic_hpwl(
    netlist: &PnrNetlist,
    solve_cells: &[PnrCellId],
    state: &SolveState,
    options: &PlacementOptions,
    use_raw: bool,
) -> f64 {
    let mut total = 0.0;
    for net in &netlist.nets {
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        let mut any = false;
        for pin in std::iter::once(net.driver).chain(net.sinks.iter().copied()) {
            let cell = netlist.pin(pin).cell;
            if !solve_cells.contains(&cell) && !netlist.cell(cell).placement.is_some() {
                continue;
            }
            let loc = state.get(cell);
            any = true;
            let (x, y) = if use_raw { (loc.raw_x, loc.raw_y) } else { (loc.x as f64, loc.y as f64) };
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
        if any {
            total += (max_x - min_x) * options.hpwl_scale_x + (max_y - min_y) * options.hpwl_scale_y;
        }
    }
    total
}

/// Binds every solved cluster root onto the nearest available, type-valid
/// site to its solved position, growing the search window as needed — the
/// same increasing-window technique the single-cell ripple legaliser uses,
/// just seeded from the solver's target instead of a displaced cell's
/// previous home.
#[allow(clippy::too_many_arguments)]
fn snap_to_sites(
    netlist: &mut PnrNetlist,
    grid: &PlacementGrid,
    bindings: &ArchBindings,
    fast_bels: &FastBelIndex,
    clusters: &ClusterTable,
    state: &SolveState,
    solve_cells: &[PnrCellId],
    rng: &mut impl Rng,
) -> Result<(), PlacerError> {
    let (max_x, max_y) = grid.dimensions();
    let max_diameter = max_x.max(max_y).max(1);

    for &cell in solve_cells {
        if let Some(site) = bindings.bel_of(cell) {
            bindings.unbind_bel(site);
        }
        let loc = state.get(cell);
        let bucket = BelBucket::for_cell_type(&netlist.cell(cell).cell_type);

        let mut diameter = 1u32;
        let site = loop {
            if let Some(site) = fast_bels.sample_in_window(grid, bucket, loc.x, loc.y, diameter, rng, |s| bindings.check_bel_avail(s)) {
                break site;
            }
            if diameter >= max_diameter {
                return Err(PlacerError::Infeasible {
                    subsystem: "AnalyticPlacerDriver",
                    message: format!("no legal bel found snapping cell {cell} to its solved position"),
                });
            }
            diameter += 1;
        };

        bindings.bind_bel(site, cell, BindStrength::Weak)?;
        netlist.cell_mut(cell).placement = Some(site);

        if let Some(cluster_id) = clusters.cluster_of(cell) {
            let cluster = clusters.get(cluster_id).clone();
            for &(member, offset) in &cluster.members {
                if let Some((x, y, z)) = grid.location_of(site) {
                    let mx = (x as i64 + offset.dx as i64).clamp(0, max_x as i64 - 1) as u32;
                    let my = (y as i64 + offset.dy as i64).clamp(0, max_y as i64 - 1) as u32;
                    let member_bucket = BelBucket::for_cell_type(&netlist.cell(member).cell_type);
                    if let Some(member_site) = grid.site_at(member_bucket, mx, my, z) {
                        if bindings.check_bel_avail(member_site) {
                            bindings.bind_bel(member_site, member, BindStrength::Weak)?;
                            netlist.cell_mut(member).placement = Some(member_site);
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
