//! Cluster / macro side tables and the cluster legaliser interface.
//!
//! Clusters are represented as a side table keyed by root cell, never as
//! parent pointers stored on cells. Resolving "place this
//! cluster's root at bel B" into a concrete per-member mapping is the
//! architecture oracle's `getClusterPlacement`; the core only consumes it
//! through [`ClusterOracle`].

use crate::data::PnrNetlist;
use crate::ids::PnrCellId;
use crate::placement::grid::{BelBucket, PlacementGrid};
use aion_arch::ids::SiteId;
use std::collections::HashMap;

/// A relative `(dx, dy, dz)` offset from a cluster root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Offset {
    /// X offset from the root.
    pub dx: i32,
    /// Y offset from the root.
    pub dy: i32,
    /// Z offset from the root.
    pub dz: i32,
}

/// Opaque ID for a cluster in a [`ClusterTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterId(u32);

/// A cluster: a root cell plus its member cells at fixed offsets.
#[derive(Debug, Clone)]
pub struct ClusterInfo {
    /// The cluster's designated root cell.
    pub root: PnrCellId,
    /// Non-root member cells and their offset from the root.
    pub members: Vec<(PnrCellId, Offset)>,
}

impl ClusterInfo {
    /// Returns whether this cluster has any members beyond the root.
    pub fn is_singleton(&self) -> bool {
        self.members.is_empty()
    }
}

/// Side table mapping cells to the cluster they belong to: leaves are an
/// array of `(CellId, offset)` pairs owned by the root entry, rather than
/// parent pointers stored on cells.
#[derive(Debug, Clone, Default)]
pub struct ClusterTable {
    clusters: Vec<ClusterInfo>,
    cell_cluster: HashMap<PnrCellId, ClusterId>,
}

impl ClusterTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table where every cell is its own singleton cluster.
    ///
    /// This is the table used when no packer (L10, out of scope for this
    /// core) has formed multi-cell macros: the constraint legaliser and
    /// annealer still operate uniformly over "cluster roots", they just
    /// never find member offsets to satisfy.
    pub fn trivial_for(netlist: &PnrNetlist) -> Self {
        let mut table = Self::new();
        for cell in &netlist.cells {
            table.add_cluster(cell.id, Vec::new());
        }
        table
    }

    /// Registers a cluster with the given root and members, returning its ID.
    pub fn add_cluster(&mut self, root: PnrCellId, members: Vec<(PnrCellId, Offset)>) -> ClusterId {
        let id = ClusterId(self.clusters.len() as u32);
        self.cell_cluster.insert(root, id);
        for (member, _) in &members {
            self.cell_cluster.insert(*member, id);
        }
        self.clusters.push(ClusterInfo { root, members });
        id
    }

    /// Returns the cluster a cell belongs to, if any.
    pub fn cluster_of(&self, cell: PnrCellId) -> Option<ClusterId> {
        self.cell_cluster.get(&cell).copied()
    }

    /// Returns whether `cell` is the root of its cluster.
    pub fn is_root(&self, cell: PnrCellId) -> bool {
        self.cluster_of(cell)
            .map(|id| self.get(id).root == cell)
            .unwrap_or(true)
    }

    /// Returns cluster data by ID.
    pub fn get(&self, id: ClusterId) -> &ClusterInfo {
        &self.clusters[id.0 as usize]
    }

    /// Returns an iterator over every registered cluster ID.
    pub fn ids(&self) -> impl Iterator<Item = ClusterId> + '_ {
        (0..self.clusters.len() as u32).map(ClusterId)
    }

    /// Returns the number of registered clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Returns whether the table has no registered clusters.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// The architecture oracle's cluster-placement resolver. The core consumes
/// this; it does not implement
/// device-specific placement legality beyond grid-bucket membership.
///
/// `netlist` is passed per call rather than captured at construction, since
/// callers (the constraint legaliser in particular) need to hold a mutable
/// borrow of the netlist to commit placements while still consulting the
/// oracle for the next candidate.
pub trait ClusterOracle {
    /// Resolves placing `cluster`'s root at `root_site`, returning the
    /// concrete `(cell, site)` mapping for every member, or `None` if
    /// infeasible (e.g. an offset would leave the grid or collide with a
    /// bucket mismatch).
    fn get_cluster_placement(
        &self,
        netlist: &PnrNetlist,
        cluster: &ClusterInfo,
        root_site: SiteId,
    ) -> Option<Vec<(PnrCellId, SiteId)>>;
}

/// A [`ClusterOracle`] that resolves member placements purely from grid
/// geometry: apply each member's offset to the root's `(x, y, z)` and
/// require the destination bel to exist and accept the member's bucket.
pub struct GridClusterOracle<'a> {
    grid: &'a PlacementGrid,
}

impl<'a> GridClusterOracle<'a> {
    /// Creates an oracle over `grid`.
    pub fn new(grid: &'a PlacementGrid) -> Self {
        Self { grid }
    }
}

impl ClusterOracle for GridClusterOracle<'_> {
    fn get_cluster_placement(
        &self,
        netlist: &PnrNetlist,
        cluster: &ClusterInfo,
        root_site: SiteId,
    ) -> Option<Vec<(PnrCellId, SiteId)>> {
        let (rx, ry, rz) = self.grid.location_of(root_site)?;
        let root_bucket = BelBucket::for_cell_type(&netlist.cell(cluster.root).cell_type);
        if self.grid.bucket_of(root_site) != Some(root_bucket) {
            return None;
        }

        let mut mapping = vec![(cluster.root, root_site)];
        for (member, offset) in &cluster.members {
            let mx = rx.checked_add_signed(offset.dx)?;
            let my = ry.checked_add_signed(offset.dy)?;
            let mz = rz.checked_add_signed(offset.dz)?;
            let member_bucket = BelBucket::for_cell_type(&netlist.cell(*member).cell_type);
            let site = self.grid.site_at(member_bucket, mx, my, mz)?;
            mapping.push((*member, site));
        }
        Some(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PnrCell, PnrCellType};
    use aion_arch::load_architecture;
    use aion_common::LogicVec;

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

    #[test]
    fn trivial_table_every_cell_is_its_own_root() {
        let mut nl = PnrNetlist::new();
        let a = lut_cell(&mut nl, "a");
        let b = lut_cell(&mut nl, "b");
        let table = ClusterTable::trivial_for(&nl);
        assert!(table.is_root(a));
        assert!(table.is_root(b));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn cluster_with_members_tracks_membership() {
        let mut nl = PnrNetlist::new();
        let root = lut_cell(&mut nl, "root");
        let leaf = lut_cell(&mut nl, "leaf");
        let mut table = ClusterTable::new();
        let id = table.add_cluster(root, vec![(leaf, Offset { dx: 0, dy: 1, dz: 0 })]);
        assert!(table.is_root(root));
        assert!(!table.is_root(leaf));
        assert_eq!(table.cluster_of(leaf), Some(id));
        assert_eq!(table.get(id).members.len(), 1);
    }

    #[test]
    fn singleton_cluster_has_no_members() {
        let mut nl = PnrNetlist::new();
        let a = lut_cell(&mut nl, "a");
        let table = ClusterTable::trivial_for(&nl);
        let id = table.cluster_of(a).unwrap();
        assert!(table.get(id).is_singleton());
    }

    #[test]
    fn grid_cluster_oracle_resolves_offsets() {
        let arch = load_architecture("artix7", "xc7a100tcsg324-1").unwrap();
        let grid = PlacementGrid::from_architecture(&*arch);
        let mut nl = PnrNetlist::new();
        let root = lut_cell(&mut nl, "root");
        let leaf = lut_cell(&mut nl, "leaf");

        let info = ClusterInfo {
            root,
            members: vec![(leaf, Offset { dx: 1, dy: 0, dz: 0 })],
        };
        let oracle = GridClusterOracle::new(&grid);
        let root_site = grid.site_at(BelBucket::Lut, 2, 2, 0).unwrap();
        let mapping = oracle.get_cluster_placement(&nl, &info, root_site).unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping[0], (root, root_site));
        let leaf_site = mapping[1].1;
        assert_eq!(grid.location_of(leaf_site).unwrap(), (3, 2, 0));
    }

    #[test]
    fn grid_cluster_oracle_rejects_out_of_bounds_offset() {
        let arch = load_architecture("cyclone_iv", "EP4CE22F17C6N").unwrap();
        let grid = PlacementGrid::from_architecture(&*arch);
        let mut nl = PnrNetlist::new();
        let root = lut_cell(&mut nl, "root");
        let leaf = lut_cell(&mut nl, "leaf");

        let (w, _h) = grid.dimensions();
        let info = ClusterInfo {
            root,
            members: vec![(
                leaf,
                Offset {
                    dx: w as i32 + 10,
                    dy: 0,
                    dz: 0,
                },
            )],
        };
        let oracle = GridClusterOracle::new(&grid);
        let root_site = grid.site_at(BelBucket::Lut, 0, 0, 0).unwrap();
        assert!(oracle.get_cluster_placement(&nl, &info, root_site).is_none());
    }
}
