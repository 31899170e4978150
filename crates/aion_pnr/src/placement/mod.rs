//! Placement engine for the PnR pipeline.
//!
//! Assigns each cell in the netlist to a physical site on the FPGA device.
//! A bound2bound analytic solver and recursive cut-spreader produce a
//! legal starting layout, a relative-constraint legaliser settles chain and
//! cluster offsets, and either a partitioned parallel refiner or a
//! single-threaded simulated annealer polishes the result.

mod anneal;
mod cluster;
mod constraint_legaliser;
mod cost;
mod cut_spreader;
mod driver;
mod fast_bel_index;
mod grid;
mod options;
mod parallel;
mod seed;
mod solver;
mod timing;

use crate::data::PnrNetlist;
use crate::ids::PnrPinId;
use aion_arch::Architecture;
use aion_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use aion_source::Span;
use rand::SeedableRng;

pub use cost::CostModel;
pub use driver::PlaceReport;
pub use grid::{ArchBindings, BelBucket, BindStrength, PlacementGrid};
pub use options::{PlacementOptions, PlacerError};
pub use timing::TimingOracle;

/// Places every cell in `netlist` onto a concrete site of `arch`, using a
/// fixed seed so runs are reproducible; callers needing timing feedback or
/// a caller-supplied RNG should call [`driver::place`] directly.
pub fn place(netlist: &mut PnrNetlist, arch: &dyn Architecture, sink: &DiagnosticSink) {
    let grid = PlacementGrid::from_architecture(arch);
    let bindings = ArchBindings::new(grid.total_sites());
    let options = PlacementOptions::default();
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);

    let criticality: Option<&(dyn Fn(PnrPinId) -> f64 + Sync)> = None;
    if let Err(err) = driver::place(netlist, arch, &grid, &bindings, &options, criticality, &mut rng) {
        sink.emit(Diagnostic::error(
            DiagnosticCode::new(Category::Error, 1),
            format!("placement failed: {err}"),
            Span::DUMMY,
        ));
    }
}
