//! FastBelIndex: O(1) expected-time random bel sampling.
//!
//! For each observed bel bucket, lazily builds a 2D array indexed by
//! `(x, y)` of candidate bel lists. Buckets with very few total bels
//! collapse their grid to a single cell at `(0, 0)` — random window
//! sampling would otherwise waste most of its attempts on empty cells.

use crate::placement::grid::{BelBucket, PlacementGrid};
use aion_arch::ids::SiteId;
use rand::Rng;
use std::collections::HashMap;
use std::sync::RwLock;

/// `(x, y)`-indexed lists of bels for one bucket, or a single collapsed
/// list when the bucket has too few bels for grid-based sampling to help.
enum BucketIndex {
    Grid(Vec<Vec<Vec<SiteId>>>),
    Collapsed(Vec<SiteId>),
}

/// Lazily-populated, per-bucket grid of candidate bels.
pub struct FastBelIndex {
    min_bels_for_grid_pick: u32,
    cache: RwLock<HashMap<BelBucket, BucketIndex>>,
}

impl FastBelIndex {
    /// Creates an empty index. `min_bels_for_grid_pick` is the
    /// `min_bels_for_grid_pick` configuration option.
    pub fn new(min_bels_for_grid_pick: u32) -> Self {
        Self {
            min_bels_for_grid_pick,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the total number of bels available for `bucket`, lazily
    /// populating the index on first query.
    pub fn total_count(&self, grid: &PlacementGrid, bucket: BelBucket) -> u32 {
        self.ensure_populated(grid, bucket);
        let cache = self.cache.read().expect("fast bel index cache lock poisoned");
        match &cache[&bucket] {
            BucketIndex::Grid(g) => g.iter().flatten().map(|l| l.len() as u32).sum(),
            BucketIndex::Collapsed(l) => l.len() as u32,
        }
    }

    fn ensure_populated(&self, grid: &PlacementGrid, bucket: BelBucket) {
        if self.cache.read().expect("fast bel index cache lock poisoned").contains_key(&bucket) {
            return;
        }
        let (width, height) = grid.dimensions();
        let capacity = grid.capacity(bucket);

        let index = if capacity < self.min_bels_for_grid_pick {
            let mut all = Vec::new();
            for y in 0..height {
                for x in 0..width {
                    let mut z = 0;
                    while let Some(site) = grid.site_at(bucket, x, y, z) {
                        all.push(site);
                        z += 1;
                    }
                }
            }
            BucketIndex::Collapsed(all)
        } else {
            let mut cells = vec![vec![Vec::new(); width as usize]; height as usize];
            for y in 0..height {
                for x in 0..width {
                    let mut z = 0;
                    while let Some(site) = grid.site_at(bucket, x, y, z) {
                        cells[y as usize][x as usize].push(site);
                        z += 1;
                    }
                }
            }
            BucketIndex::Grid(cells)
        };

        self.cache.write().expect("fast bel index cache lock poisoned").insert(bucket, index);
    }

    /// Samples a random available bel for `bucket` within a window of
    /// `diameter` tiles around `(cx, cy)`, using `is_available` to filter
    /// candidates. Retries up to a budget proportional to window area;
    /// returns `None` if no candidate was found.
    pub fn sample_in_window(
        &self,
        grid: &PlacementGrid,
        bucket: BelBucket,
        cx: u32,
        cy: u32,
        diameter: u32,
        rng: &mut impl Rng,
        is_available: impl Fn(SiteId) -> bool,
    ) -> Option<SiteId> {
        self.ensure_populated(grid, bucket);
        let cache = self.cache.read().expect("fast bel index cache lock poisoned");
        let index = &cache[&bucket];

        match index {
            BucketIndex::Collapsed(list) => {
                if list.is_empty() {
                    return None;
                }
                let budget = (list.len() * 4).max(16);
                for _ in 0..budget {
                    let site = list[rng.gen_range(0..list.len())];
                    if is_available(site) {
                        return Some(site);
                    }
                }
                None
            }
            BucketIndex::Grid(cells) => {
                let (width, height) = grid.dimensions();
                let radius = diameter.max(1);
                let budget = ((radius * 2 + 1) * (radius * 2 + 1) * 4).max(16);
                for _ in 0..budget {
                    let dx = rng.gen_range(0..=radius * 2) as i64 - radius as i64;
                    let dy = rng.gen_range(0..=radius * 2) as i64 - radius as i64;
                    let x = cx as i64 + dx;
                    let y = cy as i64 + dy;
                    if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                        continue;
                    }
                    let list = &cells[y as usize][x as usize];
                    if list.is_empty() {
                        continue;
                    }
                    let site = list[rng.gen_range(0..list.len())];
                    if is_available(site) {
                        return Some(site);
                    }
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aion_arch::load_architecture;

    #[test]
    fn lut_bucket_populates_as_grid() {
        let arch = load_architecture("cyclone_iv", "EP4CE22F17C6N").unwrap();
        let grid = PlacementGrid::from_architecture(&*arch);
        let index = FastBelIndex::new(64);
        let total = index.total_count(&grid, BelBucket::Lut);
        assert!(total >= arch.total_luts());
    }

    #[test]
    fn small_bucket_collapses() {
        let arch = load_architecture("cyclone_iv", "EP4CE22F17C6N").unwrap();
        let grid = PlacementGrid::from_architecture(&*arch);
        // min threshold above the real PLL count forces collapse
        let index = FastBelIndex::new(u32::MAX);
        let total = index.total_count(&grid, BelBucket::Pll);
        assert_eq!(total, grid.capacity(BelBucket::Pll));
    }

    #[test]
    fn sample_in_window_finds_available_site() {
        let arch = load_architecture("artix7", "xc7a100tcsg324-1").unwrap();
        let grid = PlacementGrid::from_architecture(&*arch);
        let index = FastBelIndex::new(64);
        let mut rng = rand::thread_rng();
        let site = index.sample_in_window(&grid, BelBucket::Lut, 0, 0, 4, &mut rng, |_| true);
        assert!(site.is_some());
        assert_eq!(grid.bucket_of(site.unwrap()), Some(BelBucket::Lut));
    }

    #[test]
    fn sample_respects_availability_predicate() {
        let arch = load_architecture("cyclone_v", "5CSEMA5F31C6").unwrap();
        let grid = PlacementGrid::from_architecture(&*arch);
        let index = FastBelIndex::new(64);
        let mut rng = rand::thread_rng();
        let site = index.sample_in_window(&grid, BelBucket::Lut, 0, 0, 4, &mut rng, |_| false);
        assert!(site.is_none());
    }

    #[test]
    fn zero_capacity_bucket_never_samples() {
        let arch = load_architecture("cyclone_iv", "EP4CE22F17C6N").unwrap();
        let grid = PlacementGrid::from_architecture(&*arch);
        if grid.capacity(BelBucket::Pll) == 0 {
            let index = FastBelIndex::new(64);
            let mut rng = rand::thread_rng();
            let site = index.sample_in_window(&grid, BelBucket::Pll, 0, 0, 4, &mut rng, |_| true);
            assert!(site.is_none());
        }
    }
}
