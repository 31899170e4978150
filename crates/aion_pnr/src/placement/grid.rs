//! Synthetic architecture-oracle adapter.
//!
//! `aion_arch::Architecture`'s grid-shaped methods (`grid_dimensions`,
//! `get_tile`, `get_site`, ...) are default-stubbed for every family
//! currently loaded by `load_architecture` — populating them is explicitly
//! out of scope (architecture-specific device database parsing). This
//! module derives a real `(x, y, z)` coordinate space from the
//! architecture's existing resource-count accessors instead, generalizing
//! the synthetic `SiteId`-range idiom previously used by the random
//! placer and the timing bridge into a genuine 2D grid shared by every
//! cell type, plus the shared mutable bel/cell binding table every
//! placement subsystem reads and writes.

use crate::data::PnrCellType;
use crate::ids::PnrCellId;
use crate::placement::options::PlacerError;
use aion_arch::ids::SiteId;
use aion_arch::Architecture;
use std::collections::HashMap;
use std::sync::RwLock;

/// Packing equivalence class for a cell type, a "bel bucket".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BelBucket {
    /// LUTs and carry-chain cells (both occupy logic-tile bels).
    Lut,
    /// D flip-flops.
    Ff,
    /// Block RAM primitives.
    Bram,
    /// DSP multiply-accumulate primitives.
    Dsp,
    /// I/O buffers.
    Io,
    /// PLL/MMCM clock primitives.
    Pll,
}

/// The fixed iteration order buckets are laid out in within the synthetic
/// site-index space.
const BUCKET_ORDER: [BelBucket; 6] = [
    BelBucket::Lut,
    BelBucket::Ff,
    BelBucket::Bram,
    BelBucket::Dsp,
    BelBucket::Io,
    BelBucket::Pll,
];

impl BelBucket {
    /// Returns the bucket a cell type packs into.
    pub fn for_cell_type(cell_type: &PnrCellType) -> Self {
        match cell_type {
            PnrCellType::Lut { .. } | PnrCellType::Carry => BelBucket::Lut,
            PnrCellType::Dff => BelBucket::Ff,
            PnrCellType::Bram(_) => BelBucket::Bram,
            PnrCellType::Dsp(_) => BelBucket::Dsp,
            PnrCellType::Iobuf { .. } => BelBucket::Io,
            PnrCellType::Pll(_) => BelBucket::Pll,
        }
    }

    fn capacity(self, arch: &dyn Architecture) -> u32 {
        match self {
            BelBucket::Lut => arch.total_luts(),
            BelBucket::Ff => arch.total_ffs(),
            BelBucket::Bram => arch.total_bram(),
            BelBucket::Dsp => arch.total_dsp(),
            BelBucket::Io => arch.total_io(),
            BelBucket::Pll => arch.total_pll(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BucketLayout {
    bucket: BelBucket,
    base: u32,
    depth: u32,
}

/// A synthetic `(x, y, z)` device grid shared by every bel bucket.
///
/// All buckets share the same `(x, y)` tile plane (sized to the largest
/// resource count, conventionally LUTs) and are distinguished by `z`-depth
/// layers sized to their own capacity — mirroring how a real device stacks
/// several bels of different kinds on one tile.
#[derive(Debug, Clone)]
pub struct PlacementGrid {
    width: u32,
    height: u32,
    layouts: Vec<BucketLayout>,
}

impl PlacementGrid {
    /// Builds a grid from an architecture's resource-count accessors.
    pub fn from_architecture(arch: &dyn Architecture) -> Self {
        let reference = arch.total_luts().max(1);
        let side = (reference as f64).sqrt().ceil() as u32;
        let width = side.max(1);
        let height = side.max(1);
        let tile_count = (width * height).max(1);

        let mut base = 0u32;
        let mut layouts = Vec::with_capacity(BUCKET_ORDER.len());
        for bucket in BUCKET_ORDER {
            let capacity = bucket.capacity(arch);
            let depth = if capacity == 0 {
                0
            } else {
                capacity.div_ceil(tile_count).max(1)
            };
            layouts.push(BucketLayout {
                bucket,
                base,
                depth,
            });
            base += depth * tile_count;
        }

        Self {
            width,
            height,
            layouts,
        }
    }

    /// Returns the shared `(width, height)` tile-plane dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns the total number of bels reserved for `bucket`.
    pub fn capacity(&self, bucket: BelBucket) -> u32 {
        self.layout(bucket)
            .map(|l| l.depth * self.width * self.height)
            .unwrap_or(0)
    }

    /// Returns the total number of synthetic sites across every bucket.
    pub fn total_sites(&self) -> u32 {
        self.layouts
            .last()
            .map(|l| l.base + l.depth * self.width * self.height)
            .unwrap_or(0)
    }

    fn layout(&self, bucket: BelBucket) -> Option<&BucketLayout> {
        self.layouts.iter().find(|l| l.bucket == bucket)
    }

    /// Returns the bel at `(bucket, x, y, z)`, if that bucket has that many
    /// bels reserved.
    pub fn site_at(&self, bucket: BelBucket, x: u32, y: u32, z: u32) -> Option<SiteId> {
        let layout = self.layout(bucket)?;
        if x >= self.width || y >= self.height || z >= layout.depth {
            return None;
        }
        let tile_count = self.width * self.height;
        Some(SiteId::from_raw(
            layout.base + z * tile_count + y * self.width + x,
        ))
    }

    /// Returns the bel bucket a site belongs to.
    pub fn bucket_of(&self, site: SiteId) -> Option<BelBucket> {
        let raw = site.as_raw();
        self.layouts
            .iter()
            .find(|l| {
                let tile_count = self.width * self.height;
                raw >= l.base && raw < l.base + l.depth * tile_count
            })
            .map(|l| l.bucket)
    }

    /// Returns the `(x, y, z)` grid location of a site.
    pub fn location_of(&self, site: SiteId) -> Option<(u32, u32, u32)> {
        let layout = self
            .layouts
            .iter()
            .find(|l| self.bucket_of(site) == Some(l.bucket))?;
        let tile_count = self.width * self.height;
        let offset = site.as_raw() - layout.base;
        let z = offset / tile_count;
        let rem = offset % tile_count;
        let y = rem / self.width;
        let x = rem % self.width;
        Some((x, y, z))
    }

    /// Chebyshev (grid) distance between two sites' `(x, y)` positions.
    pub fn distance(&self, a: SiteId, b: SiteId) -> u32 {
        let (ax, ay, _) = self.location_of(a).unwrap_or((0, 0, 0));
        let (bx, by, _) = self.location_of(b).unwrap_or((0, 0, 0));
        ax.abs_diff(bx).max(ay.abs_diff(by))
    }

    /// Manhattan distance between two sites' `(x, y)` positions, used for
    /// the synthetic wire-delay estimate consumed by the solver and
    /// annealer's timing cost term.
    pub fn manhattan_distance(&self, a: SiteId, b: SiteId) -> u32 {
        let (ax, ay, _) = self.location_of(a).unwrap_or((0, 0, 0));
        let (bx, by, _) = self.location_of(b).unwrap_or((0, 0, 0));
        ax.abs_diff(bx) + ay.abs_diff(by)
    }

    /// Estimated wire delay (nanoseconds) between two sites, used by the
    /// solver's criticality weighting and the annealer's timing cost term.
    pub fn predict_delay_ns(&self, a: SiteId, b: SiteId) -> f64 {
        const DELAY_PER_TILE_NS: f64 = 0.05;
        self.manhattan_distance(a, b) as f64 * DELAY_PER_TILE_NS
    }

    /// Returns whether `site` is valid for cells of `cell_type`.
    pub fn is_valid_bel_for_cell_type(&self, cell_type: &PnrCellType, site: SiteId) -> bool {
        self.bucket_of(site) == Some(BelBucket::for_cell_type(cell_type))
    }

    /// Returns whether `site` is a global-clock-capable driver bel, which
    /// the cost model skips.
    pub fn is_global_buf(&self, site: SiteId) -> bool {
        self.bucket_of(site) == Some(BelBucket::Pll)
    }
}

/// Binding strength, monotone non-decreasing during an invocation except
/// through explicit unbind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BindStrength {
    /// No binding.
    Unbound,
    /// Placed tentatively by the annealer or single-cell placer; may be
    /// ripped up by a later legalisation pass.
    Weak,
    /// Placed durably by the constraint legaliser.
    Strong,
    /// Placed via an explicit user placement constraint.
    User,
    /// Placed via an explicit user placement constraint and never moved.
    Locked,
}

struct BindingState {
    bel_to_cell: Vec<Option<(PnrCellId, BindStrength)>>,
    cell_to_bel: HashMap<PnrCellId, SiteId>,
}

/// The shared, reader/writer-lock-guarded bel/cell binding table.
///
/// Reader locks guard `check_bel_avail`/`is_bel_location_valid`; the writer
/// lock guards `bind_bel`/`unbind_bel`. This is the single authority for
/// every bind/unbind in the placement pipeline, matching the data-model
/// invariant that a bel is bound to at most one cell at a time.
pub struct ArchBindings {
    state: RwLock<BindingState>,
}

impl ArchBindings {
    /// Creates an empty binding table sized to `total_sites` bels.
    pub fn new(total_sites: u32) -> Self {
        Self {
            state: RwLock::new(BindingState {
                bel_to_cell: vec![None; total_sites as usize],
                cell_to_bel: HashMap::new(),
            }),
        }
    }

    /// Returns whether `site` currently holds no cell.
    pub fn check_bel_avail(&self, site: SiteId) -> bool {
        let state = self.state.read().expect("bindings lock poisoned");
        state.bel_to_cell[site.as_raw() as usize].is_none()
    }

    /// Returns the binding strength at `site` (`Unbound` if empty).
    pub fn strength_at(&self, site: SiteId) -> BindStrength {
        let state = self.state.read().expect("bindings lock poisoned");
        state.bel_to_cell[site.as_raw() as usize]
            .map(|(_, s)| s)
            .unwrap_or(BindStrength::Unbound)
    }

    /// Returns the cell bound at `site`, if any.
    pub fn cell_at(&self, site: SiteId) -> Option<PnrCellId> {
        let state = self.state.read().expect("bindings lock poisoned");
        state.bel_to_cell[site.as_raw() as usize].map(|(c, _)| c)
    }

    /// Returns the bel `cell` is bound to, if any.
    pub fn bel_of(&self, cell: PnrCellId) -> Option<SiteId> {
        let state = self.state.read().expect("bindings lock poisoned");
        state.cell_to_bel.get(&cell).copied()
    }

    /// Binds `cell` to `site` at the given strength.
    ///
    /// Returns `PlacerError::Internal` if the site is already occupied;
    /// callers must `unbind_bel` (ripping up the occupant) first.
    pub fn bind_bel(
        &self,
        site: SiteId,
        cell: PnrCellId,
        strength: BindStrength,
    ) -> Result<(), PlacerError> {
        let mut state = self.state.write().expect("bindings lock poisoned");
        let slot = &mut state.bel_to_cell[site.as_raw() as usize];
        if slot.is_some() {
            return Err(PlacerError::Internal {
                message: format!("bel {site} is already bound while binding cell {cell}"),
            });
        }
        *slot = Some((cell, strength));
        state.cell_to_bel.insert(cell, site);
        Ok(())
    }

    /// Unbinds whatever cell occupies `site`, returning it.
    pub fn unbind_bel(&self, site: SiteId) -> Option<PnrCellId> {
        let mut state = self.state.write().expect("bindings lock poisoned");
        let removed = state.bel_to_cell[site.as_raw() as usize].take();
        if let Some((cell, _)) = removed {
            state.cell_to_bel.remove(&cell);
        }
        removed.map(|(cell, _)| cell)
    }

    /// Always valid: dedicated-routing invalidation is a routing-fabric
    /// concern, out of scope for this core.
    pub fn is_bel_location_valid(&self, _site: SiteId) -> bool {
        true
    }
}
