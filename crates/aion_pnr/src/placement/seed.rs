//! Initial placement seeding.
//!
//! Assigns every unconstrained cluster root (or singleton cell) a random
//! compatible bel, without regard to wirelength quality — the analytic
//! solver's job is to improve on this starting point, not this pass's.
//! Cells already bound (by a user `BEL` constraint, applied before this
//! runs) are left untouched. Cluster members are never bound directly;
//! their location is always derived from their root plus offset.

use crate::data::PnrNetlist;
use crate::ids::PnrCellId;
use crate::placement::cluster::ClusterTable;
use crate::placement::fast_bel_index::FastBelIndex;
use crate::placement::grid::{ArchBindings, BelBucket, BindStrength, PlacementGrid};
use crate::placement::options::PlacerError;
use rand::Rng;

/// Seeds every unbound cluster root (and singleton cell) with a random
/// compatible bel, binding it at [`BindStrength::Weak`] so later passes may
/// freely displace it.
pub fn seed_placement(
    netlist: &mut PnrNetlist,
    grid: &PlacementGrid,
    bindings: &ArchBindings,
    clusters: &ClusterTable,
    fast_bels: &FastBelIndex,
    rng: &mut impl Rng,
) -> Result<(), PlacerError> {
    let roots: Vec<PnrCellId> = netlist
        .cells
        .iter()
        .map(|c| c.id)
        .filter(|&id| clusters.is_root(id))
        .collect();

    for cell in roots {
        if netlist.cell(cell).placement.is_some() {
            continue;
        }
        let bucket = BelBucket::for_cell_type(&netlist.cell(cell).cell_type);
        let (width, height) = grid.dimensions();
        let cx = rng.gen_range(0..width.max(1));
        let cy = rng.gen_range(0..height.max(1));
        let diameter = width.max(height).max(1);
        let site = fast_bels
            .sample_in_window(grid, bucket, cx, cy, diameter, rng, |s| {
                bindings.check_bel_avail(s)
            })
            .ok_or_else(|| PlacerError::Infeasible {
                subsystem: "seed_placement",
                message: format!("no bel available for cell {cell} (bucket {bucket:?})"),
            })?;
        bindings.bind_bel(site, cell, BindStrength::Weak)?;
        netlist.cell_mut(cell).placement = Some(site);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PnrCell, PnrCellType};
    use aion_arch::load_architecture;
    use aion_common::LogicVec;
    use rand::SeedableRng;

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
    fn seeds_every_unbound_cell() {
        let arch = load_architecture("cyclone_iv", "EP4CE22F17C6N").unwrap();
        let grid = PlacementGrid::from_architecture(&*arch);
        let bindings = ArchBindings::new(grid.total_sites());
        let mut nl = PnrNetlist::new();
        for i in 0..5 {
            lut_cell(&mut nl, &format!("c{i}"));
        }
        let clusters = ClusterTable::trivial_for(&nl);
        let fast_bels = FastBelIndex::new(64);
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);

        seed_placement(&mut nl, &grid, &bindings, &clusters, &fast_bels, &mut rng).unwrap();

        assert!(nl.cells.iter().all(|c| c.placement.is_some()));
        let sites: std::collections::HashSet<_> = nl.cells.iter().map(|c| c.placement.unwrap()).collect();
        assert_eq!(sites.len(), 5);
    }

    #[test]
    fn preexisting_placement_is_left_untouched() {
        let arch = load_architecture("cyclone_iv", "EP4CE22F17C6N").unwrap();
        let grid = PlacementGrid::from_architecture(&*arch);
        let bindings = ArchBindings::new(grid.total_sites());
        let mut nl = PnrNetlist::new();
        let fixed_site = grid.site_at(BelBucket::Lut, 2, 2, 0).unwrap();
        let cell = lut_cell(&mut nl, "pinned");
        nl.cell_mut(cell).placement = Some(fixed_site);
        bindings.bind_bel(fixed_site, cell, BindStrength::User).unwrap();

        let clusters = ClusterTable::trivial_for(&nl);
        let fast_bels = FastBelIndex::new(64);
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        seed_placement(&mut nl, &grid, &bindings, &clusters, &fast_bels, &mut rng).unwrap();

        assert_eq!(nl.cell(cell).placement, Some(fixed_site));
    }

    #[test]
    fn cluster_members_are_never_bound_directly() {
        let arch = load_architecture("cyclone_iv", "EP4CE22F17C6N").unwrap();
        let grid = PlacementGrid::from_architecture(&*arch);
        let bindings = ArchBindings::new(grid.total_sites());
        let mut nl = PnrNetlist::new();
        let root = lut_cell(&mut nl, "root");
        let leaf = lut_cell(&mut nl, "leaf");
        let mut clusters = ClusterTable::new();
        clusters.add_cluster(root, vec![(leaf, crate::placement::cluster::Offset::default())]);
        let fast_bels = FastBelIndex::new(64);
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);

        seed_placement(&mut nl, &grid, &bindings, &clusters, &fast_bels, &mut rng).unwrap();

        assert!(nl.cell(root).placement.is_some());
        assert!(nl.cell(leaf).placement.is_none());
    }
}
