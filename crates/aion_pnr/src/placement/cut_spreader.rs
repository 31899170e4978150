//! Recursive cut-based spreading.
//!
//! Finds regions of the grid where cell occupancy exceeds available bels of
//! some bucket, grows each region until it is no longer overused, then
//! recursively bipartitions it along alternating axes — redistributing
//! cells within the region by linear interpolation so the halves balance
//! utilisation. This turns the analytic solver's frequently-overlapping
//! continuous solution into one with at most `beta` occupancy per bel,
//! ready for strict legalisation.

use crate::data::PnrNetlist;
use crate::ids::PnrCellId;
use crate::placement::cluster::ClusterTable;
use crate::placement::grid::{BelBucket, PlacementGrid};
use crate::placement::solver::SolveState;
use std::collections::VecDeque;

const BUCKETS: [BelBucket; 6] = [
    BelBucket::Lut,
    BelBucket::Ff,
    BelBucket::Bram,
    BelBucket::Dsp,
    BelBucket::Io,
    BelBucket::Pll,
];

/// A rectangular region of the grid along with its per-bucket cell and bel
/// counts, used to decide whether it still needs spreading.
#[derive(Debug, Clone)]
struct SpreaderRegion {
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    cells: Vec<u32>,
    bels: Vec<u32>,
}

impl SpreaderRegion {
    /// A region with fewer than 4 bels of a bucket is overused as soon as it
    /// holds more cells than bels at all; otherwise it tolerates up to
    /// `beta` times its bel count, giving larger regions slack to settle.
    fn overused(&self, beta: f64) -> bool {
        self.cells.iter().zip(&self.bels).any(|(&c, &b)| {
            if b < 4 {
                c > b
            } else {
                c as f64 > beta * b as f64
            }
        })
    }

    fn width(&self, dir: bool) -> i32 {
        if dir {
            self.y1 - self.y0 + 1
        } else {
            self.x1 - self.x0 + 1
        }
    }
}

/// Spreads overutilised cells across `grid`, mutating `state`'s raw and
/// rounded positions so every grid cell holds no more than roughly `beta`
/// times its bel count of any bucket.
pub fn spread(
    netlist: &PnrNetlist,
    grid: &PlacementGrid,
    clusters: &ClusterTable,
    state: &mut SolveState,
    solve_cells: &[PnrCellId],
    beta: f64,
) {
    let (max_x, max_y) = grid.dimensions();
    let (w, h) = (max_x as usize, max_y as usize);
    let mut occupancy = vec![vec![vec![0u32; BUCKETS.len()]; h]; w];
    let mut bels = vec![vec![vec![0u32; BUCKETS.len()]; h]; w];
    let tile_count = (w * h).max(1) as u32;
    let per_tile_bels: Vec<u32> = BUCKETS.iter().map(|&b| grid.capacity(b) / tile_count).collect();
    for x in 0..w {
        for y in 0..h {
            for (t, &bucket) in BUCKETS.iter().enumerate() {
                bels[x][y][t] = if grid.site_at(bucket, x as u32, y as u32, 0).is_some() {
                    per_tile_bels[t]
                } else {
                    0
                };
            }
        }
    }

    let mut cells_at: Vec<Vec<Vec<PnrCellId>>> = vec![vec![Vec::new(); h]; w];
    for &cell in solve_cells {
        if !clusters.is_root(cell) {
            continue;
        }
        let loc = state.get(cell);
        let (x, y) = (loc.x as usize, loc.y as usize);
        if x >= w || y >= h {
            continue;
        }
        let bucket = BelBucket::for_cell_type(&netlist.cell(cell).cell_type);
        let t = BUCKETS.iter().position(|&b| b == bucket).unwrap_or(0);
        occupancy[x][y][t] += 1;
        cells_at[x][y].push(cell);
    }

    let mut groups = vec![vec![-1i32; h]; w];
    let mut regions: Vec<SpreaderRegion> = Vec::new();

    find_overused_regions(&occupancy, &bels, &mut groups, &mut regions, w, h);
    expand_regions(&occupancy, &bels, &mut groups, &mut regions, w, h, beta);

    let mut queue: VecDeque<(usize, bool)> = regions.iter().enumerate().map(|(i, _)| (i, false)).collect();
    while let Some((rid, dir)) = queue.pop_front() {
        let region = regions[rid].clone();
        if let Some((left, right)) = cut_region(&region, &mut cells_at, state, dir) {
            let next_l = regions.len();
            regions.push(left);
            queue.push_back((next_l, !dir));
            let next_r = regions.len();
            regions.push(right);
            queue.push_back((next_r, !dir));
        }
    }
}

fn find_overused_regions(
    occupancy: &[Vec<Vec<u32>>],
    bels: &[Vec<Vec<u32>>],
    groups: &mut [Vec<i32>],
    regions: &mut Vec<SpreaderRegion>,
    w: usize,
    h: usize,
) {
    for x in 0..w {
        for y in 0..h {
            if groups[x][y] != -1 {
                continue;
            }
            let overutilised = (0..BUCKETS.len()).any(|t| occupancy[x][y][t] > bels[x][y][t]);
            if !overutilised {
                continue;
            }
            let id = regions.len() as i32;
            groups[x][y] = id;
            regions.push(SpreaderRegion {
                x0: x as i32,
                y0: y as i32,
                x1: x as i32,
                y1: y as i32,
                cells: occupancy[x][y].clone(),
                bels: bels[x][y].clone(),
            });
        }
    }
}

/// Grows every overused region outward by one row/column at a time,
/// alternating X and Y, until it is no longer overused or hits the grid
/// edge. Distinct regions are allowed to touch without merging: this is a
/// simplification of the chain-aware union-growth in the original spreader,
/// acceptable here since cluster members are never solved directly and
/// therefore never independently occupy a grid cell (see
/// [`crate::placement::solver::update_all_chains`]).
#[allow(clippy::too_many_arguments)]
fn expand_regions(
    occupancy: &[Vec<Vec<u32>>],
    bels: &[Vec<Vec<u32>>],
    groups: &mut [Vec<i32>],
    regions: &mut [SpreaderRegion],
    w: usize,
    h: usize,
    beta: f64,
) {
    let max_x = w as i32 - 1;
    let max_y = h as i32 - 1;
    for rid in 0..regions.len() {
        while regions[rid].overused(beta) {
            let mut changed = false;
            if regions[rid].x0 > 0 {
                grow(occupancy, bels, groups, regions, rid, regions[rid].x0 - 1, regions[rid].y0, regions[rid].x1, regions[rid].y1);
                changed = true;
            }
            if !regions[rid].overused(beta) {
                break;
            }
            if regions[rid].x1 < max_x {
                grow(occupancy, bels, groups, regions, rid, regions[rid].x0, regions[rid].y0, regions[rid].x1 + 1, regions[rid].y1);
                changed = true;
            }
            if !regions[rid].overused(beta) {
                break;
            }
            if regions[rid].y0 > 0 {
                grow(occupancy, bels, groups, regions, rid, regions[rid].x0, regions[rid].y0 - 1, regions[rid].x1, regions[rid].y1);
                changed = true;
            }
            if !regions[rid].overused(beta) {
                break;
            }
            if regions[rid].y1 < max_y {
                grow(occupancy, bels, groups, regions, rid, regions[rid].x0, regions[rid].y0, regions[rid].x1, regions[rid].y1 + 1);
                changed = true;
            }
            if !changed {
                break;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn grow(
    occupancy: &[Vec<Vec<u32>>],
    bels: &[Vec<Vec<u32>>],
    groups: &mut [Vec<i32>],
    regions: &mut [SpreaderRegion],
    rid: usize,
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
) {
    let old = regions[rid].clone();
    regions[rid].x0 = x0.min(old.x0);
    regions[rid].y0 = y0.min(old.y0);
    regions[rid].x1 = x1.max(old.x1);
    regions[rid].y1 = y1.max(old.y1);
    for x in regions[rid].x0..=regions[rid].x1 {
        for y in regions[rid].y0..=regions[rid].y1 {
            if x >= old.x0 && x <= old.x1 && y >= old.y0 && y <= old.y1 {
                continue;
            }
            if groups[x as usize][y as usize] == rid as i32 {
                continue;
            }
            groups[x as usize][y as usize] = rid as i32;
            for t in 0..BUCKETS.len() {
                regions[rid].cells[t] += occupancy[x as usize][y as usize][t];
                regions[rid].bels[t] += bels[x as usize][y as usize][t];
            }
        }
    }
}

/// Bipartitions `region` along `dir` (`true` = Y axis, `false` = X axis),
/// spreading cells by linear interpolation into the two halves. Returns the
/// two child regions, or `None` if the region holds too few cells to split
/// further.
fn cut_region(
    region: &SpreaderRegion,
    cells_at: &mut [Vec<Vec<PnrCellId>>],
    state: &mut SolveState,
    dir: bool,
) -> Option<(SpreaderRegion, SpreaderRegion)> {
    let mut cut_cells: Vec<PnrCellId> = Vec::new();
    for x in region.x0..=region.x1 {
        for y in region.y0..=region.y1 {
            cut_cells.extend(cells_at[x as usize][y as usize].drain(..));
        }
    }
    if cut_cells.len() < 2 {
        for x in region.x0..=region.x1 {
            for y in region.y0..=region.y1 {
                // already drained; nothing to restore for < 2 cells.
                let _ = (x, y);
            }
        }
        return None;
    }

    cut_cells.sort_by(|&a, &b| {
        let (pa, pb) = (state.get(a), state.get(b));
        let (va, vb) = if dir { (pa.raw_y, pb.raw_y) } else { (pa.raw_x, pb.raw_x) };
        va.partial_cmp(&vb).unwrap_or(std::cmp::Ordering::Equal)
    });

    let total_cells = cut_cells.len();
    let pivot = total_cells / 2;

    let trimmed_l = region.x0.min(region.y0).max(if dir { region.y0 } else { region.x0 });
    let (lo, hi) = if dir { (region.y0, region.y1) } else { (region.x0, region.x1) };
    if region.width(dir) < 2 {
        return None;
    }
    let _ = trimmed_l;

    let best_cut = lo + (hi - lo) * pivot as i32 / total_cells.max(1) as i32;
    let best_cut = best_cut.clamp(lo, hi.saturating_sub(1).max(lo));

    let left_span = (best_cut - lo + 1).max(1) as f64;
    let right_span = (hi - best_cut - 1 + 1).max(1) as f64;

    let left_area = (lo as f64, (best_cut as f64 + 0.999));
    let right_area = (best_cut as f64 + 1.0, hi as f64 + 0.999);

    for (i, &cell) in cut_cells.iter().enumerate().take(pivot) {
        let pos = left_area.0 + (i as f64) * (left_span / pivot.max(1) as f64);
        write_axis_pos(state, cell, dir, pos);
    }
    for (i, &cell) in cut_cells.iter().enumerate().skip(pivot) {
        let j = i - pivot;
        let count = total_cells - pivot;
        let pos = right_area.0 + (j as f64) * (right_span / count.max(1) as f64);
        write_axis_pos(state, cell, dir, pos);
    }

    for &cell in &cut_cells {
        let mut loc = state.get(cell);
        loc.x = loc.raw_x.round().clamp(region.x0 as f64, region.x1 as f64) as u32;
        loc.y = loc.raw_y.round().clamp(region.y0 as f64, region.y1 as f64) as u32;
        state.set(cell, loc);
        cells_at[loc.x as usize][loc.y as usize].push(cell);
    }

    let (split_x, split_y) = if dir {
        ((region.x0, region.x1), (region.y0, best_cut))
    } else {
        ((region.x0, best_cut), (region.y0, region.y1))
    };
    let left = SpreaderRegion {
        x0: split_x.0,
        y0: split_y.0,
        x1: split_x.1,
        y1: split_y.1,
        cells: vec![0; BUCKETS.len()],
        bels: vec![0; BUCKETS.len()],
    };
    let (split_x2, split_y2) = if dir {
        ((region.x0, region.x1), (best_cut + 1, region.y1))
    } else {
        ((best_cut + 1, region.x1), (region.y0, region.y1))
    };
    let right = SpreaderRegion {
        x0: split_x2.0,
        y0: split_y2.0,
        x1: split_x2.1,
        y1: split_y2.1,
        cells: vec![0; BUCKETS.len()],
        bels: vec![0; BUCKETS.len()],
    };
    if left.x0 > left.x1 || left.y0 > left.y1 || right.x0 > right.x1 || right.y0 > right.y1 {
        return None;
    }
    Some((left, right))
}

fn write_axis_pos(state: &mut SolveState, cell: PnrCellId, dir: bool, pos: f64) {
    let mut loc = state.get(cell);
    if dir {
        loc.raw_y = pos;
    } else {
        loc.raw_x = pos;
    }
    state.set(cell, loc);
}
