//! Analytic (HeAP-style) placement solver.
//!
//! Builds a bound2bound quadratic wirelength model per net — each net
//! contributes weighted springs between its two extreme pins and every
//! other pin on it — and solves the resulting sparse system of equations
//! with conjugate gradient, independently per axis. A legalisation-anchor
//! term pulls cells toward their last legal position once `iter > 0`, so
//! repeated solve/spread/legalise rounds converge instead of oscillating.
//!
//! Cluster members are never solved directly: only a cluster's root
//! appears as a free variable, and non-root members contribute their fixed
//! offset from the root as a constant term on the root's equation (see
//! [`stamp_equation`]'s offset handling).

use crate::data::PnrNetlist;
use crate::ids::{PnrCellId, PnrPinId};
use crate::placement::cluster::ClusterTable;
use crate::placement::grid::PlacementGrid;
use crate::placement::options::PlacementOptions;
use std::collections::HashMap;

/// A cell's current continuous position plus its last strictly-legal grid
/// position, mirroring the teacher's `cell_locs` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellLocation {
    /// Current (possibly fractional, possibly out-of-bounds during solve)
    /// raw X position.
    pub raw_x: f64,
    /// Current raw Y position.
    pub raw_y: f64,
    /// Rounded, grid-clamped current X.
    pub x: u32,
    /// Rounded, grid-clamped current Y.
    pub y: u32,
    /// X from the most recent strict legalisation pass.
    pub legal_x: u32,
    /// Y from the most recent strict legalisation pass.
    pub legal_y: u32,
}

/// The solver's continuous position state across outer HeAP iterations,
/// keyed by cell. Only cluster roots (and unclustered cells) are ever
/// solved directly; [`update_all_chains`] derives member positions.
#[derive(Debug, Clone, Default)]
pub struct SolveState {
    locations: HashMap<PnrCellId, CellLocation>,
}

impl SolveState {
    /// Builds solver state from each cell's currently-bound site, or
    /// `(0, 0)` for cells with no site yet.
    pub fn from_netlist(netlist: &PnrNetlist, grid: &PlacementGrid) -> Self {
        let mut locations = HashMap::new();
        for cell in &netlist.cells {
            let (x, y) = cell
                .placement
                .and_then(|s| grid.location_of(s))
                .map(|(x, y, _)| (x, y))
                .unwrap_or((0, 0));
            locations.insert(
                cell.id,
                CellLocation {
                    raw_x: x as f64,
                    raw_y: y as f64,
                    x,
                    y,
                    legal_x: x,
                    legal_y: y,
                },
            );
        }
        Self { locations }
    }

    /// Returns the location of `cell`, or the grid origin if never seen.
    pub fn get(&self, cell: PnrCellId) -> CellLocation {
        self.locations.get(&cell).copied().unwrap_or_default()
    }

    /// Inserts or overwrites `cell`'s location.
    pub fn set(&mut self, cell: PnrCellId, loc: CellLocation) {
        self.locations.insert(cell, loc);
    }

    /// Marks every solved cell's current rounded position as its legal
    /// position, called once a strict legalisation pass completes.
    pub fn commit_legal_positions(&mut self) {
        for loc in self.locations.values_mut() {
            loc.legal_x = loc.x;
            loc.legal_y = loc.y;
        }
    }
}

/// Propagates every cluster root's position to its members via their fixed
/// offset, clamped to the grid. Must run after every solve, spread, or
/// legalise step that could have moved a root.
pub fn update_all_chains(state: &mut SolveState, clusters: &ClusterTable, grid: &PlacementGrid) {
    let (max_x, max_y) = grid.dimensions();
    for cluster_id in clusters.ids() {
        let cluster = clusters.get(cluster_id);
        if cluster.members.is_empty() {
            continue;
        }
        let base = state.get(cluster.root);
        for &(member, offset) in &cluster.members {
            let mx = (base.x as i64 + offset.dx as i64).clamp(0, max_x as i64 - 1) as u32;
            let my = (base.y as i64 + offset.dy as i64).clamp(0, max_y as i64 - 1) as u32;
            let mut loc = state.get(member);
            loc.x = mx;
            loc.y = my;
            loc.raw_x = mx as f64;
            loc.raw_y = my as f64;
            state.set(member, loc);
        }
    }
}

/// Sparse symmetric positive-semidefinite system `A x = rhs`, built one
/// axis at a time and solved with conjugate gradient.
///
/// `coeffs[col]` holds `(row, value)` pairs sorted by row, matching the
/// teacher's sparse-column representation — kept sorted so repeated
/// `add_coeff` calls for the same `(row, col)` can use a binary search
/// instead of a hash lookup.
struct EquationSystem {
    coeffs: Vec<Vec<(usize, f64)>>,
    rhs: Vec<f64>,
}

impl EquationSystem {
    fn new(n: usize) -> Self {
        Self {
            coeffs: vec![Vec::new(); n],
            rhs: vec![0.0; n],
        }
    }

    fn add_coeff(&mut self, row: usize, col: usize, val: f64) {
        let column = &mut self.coeffs[col];
        match column.binary_search_by_key(&row, |&(r, _)| r) {
            Ok(i) => column[i].1 += val,
            Err(i) => column.insert(i, (row, val)),
        }
    }

    fn add_rhs(&mut self, row: usize, val: f64) {
        self.rhs[row] += val;
    }

    /// Matrix-vector product `A * x`, reading `coeffs` column-major (`A` is
    /// symmetric by construction, since every stamped arc adds a mirrored
    /// coefficient for both endpoints).
    fn matvec(&self, x: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; x.len()];
        for (col, entries) in self.coeffs.iter().enumerate() {
            for &(row, val) in entries {
                out[row] += val * x[col];
            }
        }
        out
    }

    /// Solves `A x = rhs` in place with conjugate gradient, starting from
    /// `x`'s current values as the initial guess (as the teacher's Eigen
    /// `solveWithGuess` does, since a HeAP cell's last position is usually
    /// close to its next one).
    fn solve(&self, x: &mut [f64], tolerance: f64, max_iters: usize) {
        let n = x.len();
        if n == 0 {
            return;
        }
        let mut r: Vec<f64> = self
            .matvec(x)
            .iter()
            .zip(&self.rhs)
            .map(|(ax, b)| b - ax)
            .collect();
        let rhs_norm = self.rhs.iter().map(|v| v * v).sum::<f64>().sqrt().max(1e-12);
        let mut p = r.clone();
        let mut rs_old: f64 = r.iter().map(|v| v * v).sum();

        for _ in 0..max_iters {
            if rs_old.sqrt() / rhs_norm < tolerance {
                break;
            }
            let ap = self.matvec(&p);
            let pap: f64 = p.iter().zip(&ap).map(|(pi, api)| pi * api).sum();
            if pap.abs() < 1e-15 {
                break;
            }
            let alpha = rs_old / pap;
            for i in 0..n {
                x[i] += alpha * p[i];
                r[i] -= alpha * ap[i];
            }
            let rs_new: f64 = r.iter().map(|v| v * v).sum();
            let beta = rs_new / rs_old.max(1e-30);
            for i in 0..n {
                p[i] = r[i] + beta * p[i];
            }
            rs_old = rs_new;
        }
    }
}

/// Builds and solves the connectivity system for one axis over `solve_cells`,
/// running 5 build/solve rounds as the teacher's `build_solve_direction` does
/// (re-stamping the system after each solve lets the bound2bound weights,
/// which depend on the current positions, adapt to the improved placement).
#[allow(clippy::too_many_arguments)]
pub fn solve_axis(
    netlist: &PnrNetlist,
    grid: &PlacementGrid,
    clusters: &ClusterTable,
    options: &PlacementOptions,
    state: &mut SolveState,
    solve_cells: &[PnrCellId],
    yaxis: bool,
    iter: Option<u32>,
    criticality: Option<&(dyn Fn(PnrPinId) -> f64 + Sync)>,
) {
    if solve_cells.is_empty() {
        return;
    }
    let row_of: HashMap<PnrCellId, usize> = solve_cells.iter().enumerate().map(|(i, &c)| (c, i)).collect();

    for _ in 0..5 {
        let mut es = EquationSystem::new(solve_cells.len());
        build_equations(netlist, clusters, options, state, &row_of, yaxis, iter, criticality, &mut es);

        let mut vals: Vec<f64> = solve_cells
            .iter()
            .map(|&c| {
                let loc = state.get(c);
                if yaxis {
                    loc.raw_y
                } else {
                    loc.raw_x
                }
            })
            .collect();
        es.solve(&mut vals, PlacementOptions::CG_TOLERANCE, 100);

        let (max_x, max_y) = grid.dimensions();
        for (i, &cell) in solve_cells.iter().enumerate() {
            let mut loc = state.get(cell);
            if yaxis {
                loc.raw_y = vals[i];
                loc.y = (vals[i].round() as i64).clamp(0, max_y as i64 - 1) as u32;
            } else {
                loc.raw_x = vals[i];
                loc.x = (vals[i].round() as i64).clamp(0, max_x as i64 - 1) as u32;
            }
            state.set(cell, loc);
        }
    }
}

/// Solves both axes, in parallel when the crate is built with threading
/// support, matching the teacher's `xaxis` worker thread.
pub fn build_solve_direction(
    netlist: &PnrNetlist,
    grid: &PlacementGrid,
    clusters: &ClusterTable,
    options: &PlacementOptions,
    state: &mut SolveState,
    solve_cells: &[PnrCellId],
    iter: Option<u32>,
    criticality: Option<&(dyn Fn(PnrPinId) -> f64 + Sync)>,
) {
    let mut x_state = state.clone();
    let mut y_state = state.clone();
    rayon::join(
        || solve_axis(netlist, grid, clusters, options, &mut x_state, solve_cells, false, iter, criticality),
        || solve_axis(netlist, grid, clusters, options, &mut y_state, solve_cells, true, iter, criticality),
    );
    for &cell in solve_cells {
        let mut merged = x_state.get(cell);
        let y_loc = y_state.get(cell);
        merged.y = y_loc.y;
        merged.raw_y = y_loc.raw_y;
        state.set(cell, merged);
    }
}

/// Adds `val`'s contribution to `var`'s position onto `eqn`'s equation row,
/// including the constant offset term when `var` is a non-root cluster member.
fn stamp_equation(
    clusters: &ClusterTable,
    state: &SolveState,
    row_of: &HashMap<PnrCellId, usize>,
    es: &mut EquationSystem,
    var: PnrCellId,
    eqn: PnrCellId,
    yaxis: bool,
    weight: f64,
) {
    let Some(&row) = row_of.get(&eqn) else {
        return;
    };
    let var_root = clusters.cluster_of(var).map(|id| clusters.get(id).root).unwrap_or(var);
    if let Some(&col) = row_of.get(&var_root) {
        es.add_coeff(row, col, weight);
    } else {
        let loc = state.get(var_root);
        let pos = if yaxis { loc.raw_y } else { loc.raw_x };
        es.add_rhs(row, -pos * weight);
    }
    if let Some(cluster_id) = clusters.cluster_of(var) {
        let cluster = clusters.get(cluster_id);
        if let Some((_, offset)) = cluster.members.iter().find(|(m, _)| *m == var) {
            let delta = if yaxis { offset.dy } else { offset.dx };
            es.add_rhs(row, -(delta as f64) * weight);
        }
    }
}

/// Builds the bound2bound system for one axis: every net contributes a
/// spring between its two extreme pins and every other pin on it, weighted
/// by `1 / (fanout * max(1, |delta|))` and, when timing-driven,
/// multiplied by `1 + timingWeight * criticality^critExp`.
#[allow(clippy::too_many_arguments)]
fn build_equations(
    netlist: &PnrNetlist,
    clusters: &ClusterTable,
    options: &PlacementOptions,
    state: &SolveState,
    row_of: &HashMap<PnrCellId, usize>,
    yaxis: bool,
    iter: Option<u32>,
    criticality: Option<&(dyn Fn(PnrPinId) -> f64 + Sync)>,
    es: &mut EquationSystem,
) {
    let pos_of = |cell: PnrCellId| {
        let root = clusters.cluster_of(cell).map(|id| clusters.get(id).root).unwrap_or(cell);
        let loc = state.get(root);
        if yaxis {
            loc.raw_y
        } else {
            loc.raw_x
        }
    };

    for net in &netlist.nets {
        if net.sinks.is_empty() {
            continue;
        }
        let ports: Vec<PnrPinId> = std::iter::once(net.driver).chain(net.sinks.iter().copied()).collect();
        let (mut lb, mut ub) = (ports[0], ports[0]);
        let (mut lb_pos, mut ub_pos) = (f64::MAX, f64::MIN);
        for &pin in &ports {
            let pos = pos_of(netlist.pin(pin).cell);
            if pos < lb_pos {
                lb_pos = pos;
                lb = pin;
            }
            if pos > ub_pos {
                ub_pos = pos;
                ub = pin;
            }
        }

        for &port in &ports {
            let this_cell = netlist.pin(port).cell;
            let this_pos = pos_of(this_cell);
            for &other_pin in [lb, ub].iter() {
                if other_pin == port {
                    continue;
                }
                let other_cell = netlist.pin(other_pin).cell;
                let other_pos = pos_of(other_cell);
                let delta = (other_pos - this_pos).abs();
                let mut weight = 1.0 / (ports.len() as f64 * delta.max(1.0));
                if let Some(crit_fn) = criticality {
                    let crit = crit_fn(port).clamp(0.0, 1.0);
                    weight *= 1.0 + options.lambda * crit.powi(options.crit_exp);
                }
                stamp_equation(clusters, state, row_of, es, this_cell, this_cell, yaxis, weight);
                stamp_equation(clusters, state, row_of, es, other_cell, this_cell, yaxis, -weight);
                stamp_equation(clusters, state, row_of, es, other_cell, other_cell, yaxis, weight);
                stamp_equation(clusters, state, row_of, es, this_cell, other_cell, yaxis, -weight);
            }
        }
    }

    if let Some(iter) = iter {
        if iter > 0 {
            for (&cell, &row) in row_of {
                let loc = state.get(cell);
                let (legal, cur) = if yaxis {
                    (loc.legal_y, loc.raw_y)
                } else {
                    (loc.legal_x, loc.raw_x)
                };
                let delta = (legal as f64 - cur).abs();
                let weight = options.alpha * iter as f64 / delta.max(1.0);
                es.add_coeff(row, row, weight);
                es.add_rhs(row, weight * legal as f64);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PnrCell, PnrCellType, PnrNet, PnrPin};
    use crate::ids::{PnrCellId, PnrNetId, PnrPinId};
    use aion_arch::load_architecture;
    use aion_common::LogicVec;
    use aion_ir::PortDirection;

    fn lut_cell(nl: &mut PnrNetlist, name: &str) -> PnrCellId {
        nl.add_cell(PnrCell {
            id: PnrCellId::from_raw(0),
            name: name.into(),
            cell_type: PnrCellType::Lut {
                inputs: 4,
                init: LogicVec::from_bool(false),
            },
            placement: None,
            is_fixed: false,
        })
    }

    fn chain_netlist() -> PnrNetlist {
        let mut nl = PnrNetlist::new();
        let a = lut_cell(&mut nl, "a");
        let b = lut_cell(&mut nl, "b");
        let p0 = nl.add_pin(PnrPin {
            id: PnrPinId::from_raw(0),
            name: "O".into(),
            direction: PortDirection::Output,
            cell: a,
            net: Some(PnrNetId::from_raw(0)),
        });
        let p1 = nl.add_pin(PnrPin {
            id: PnrPinId::from_raw(0),
            name: "I0".into(),
            direction: PortDirection::Input,
            cell: b,
            net: Some(PnrNetId::from_raw(0)),
        });
        nl.add_net(PnrNet {
            id: PnrNetId::from_raw(0),
            name: "n".into(),
            driver: p0,
            sinks: vec![p1],
            routing: None,
            timing_critical: false,
        });
        nl
    }

    #[test]
    fn equation_system_solves_simple_spring() {
        // Two unknowns coupled by a unit spring and one pulled by an anchor.
        let mut es = EquationSystem::new(2);
        es.add_coeff(0, 0, 1.0);
        es.add_coeff(0, 1, -1.0);
        es.add_coeff(1, 0, -1.0);
        es.add_coeff(1, 1, 1.0);
        es.add_coeff(1, 1, 1.0); // anchor on row 1
        es.add_rhs(1, 10.0); // anchor pulls toward 10
        let mut x = vec![0.0, 0.0];
        es.solve(&mut x, 1e-8, 200);
        assert!((x[1] - 5.0).abs() < 1e-3);
        assert!((x[0] - 5.0).abs() < 1e-3);
    }

    #[test]
    fn solve_axis_pulls_cells_toward_each_other() {
        let arch = load_architecture("cyclone_iv", "EP4CE22F17C6N").unwrap();
        let grid = PlacementGrid::from_architecture(&*arch);
        let nl = chain_netlist();
        let clusters = ClusterTable::trivial_for(&nl);
        let options = PlacementOptions::default();
        let mut state = SolveState::from_netlist(&nl, &grid);

        let a = nl.cell_by_name["a"];
        let b = nl.cell_by_name["b"];
        let mut loc_a = state.get(a);
        loc_a.raw_x = 0.0;
        state.set(a, loc_a);
        let mut loc_b = state.get(b);
        loc_b.raw_x = 10.0;
        state.set(b, loc_b);

        let solve_cells = vec![a, b];
        solve_axis(&nl, &grid, &clusters, &options, &mut state, &solve_cells, false, None, None);

        let dist = (state.get(a).raw_x - state.get(b).raw_x).abs();
        assert!(dist < 10.0);
    }

    #[test]
    fn update_all_chains_applies_offsets() {
        let arch = load_architecture("cyclone_iv", "EP4CE22F17C6N").unwrap();
        let grid = PlacementGrid::from_architecture(&*arch);
        let mut nl = PnrNetlist::new();
        let root = lut_cell(&mut nl, "root");
        let leaf = lut_cell(&mut nl, "leaf");
        let mut clusters = ClusterTable::new();
        clusters.add_cluster(
            root,
            vec![(leaf, crate::placement::cluster::Offset { dx: 1, dy: 0, dz: 0 })],
        );
        let mut state = SolveState::from_netlist(&nl, &grid);
        let mut root_loc = state.get(root);
        root_loc.x = 3;
        root_loc.y = 4;
        state.set(root, root_loc);

        update_all_chains(&mut state, &clusters, &grid);

        let leaf_loc = state.get(leaf);
        assert_eq!((leaf_loc.x, leaf_loc.y), (4, 4));
    }
}
