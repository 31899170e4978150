//! Optimization pass runner and pass trait.
//!
//! Provides the [`OptPass`] trait for implementing optimization passes and
//! the [`run_passes`] function that orchestrates them in the correct order.

use crate::netlist::Netlist;
use aion_diagnostics::DiagnosticSink;

/// Trait for a single optimization pass.
///
/// Each pass inspects and modifies the netlist, returning `true` if
/// any changes were made (which may enable further optimization).
pub(crate) trait OptPass {
    /// Runs the pass on the netlist, returning `true` if it made changes.
    fn run(&self, netlist: &mut Netlist, sink: &DiagnosticSink) -> bool;
}

/// Runs all optimization passes on the netlist in the standard order.
///
/// The order is: constant propagation, DCE, CSE, then final DCE cleanup.
/// Each pass is run once (future: iterate until fixpoint for aggressive optimization).
pub(crate) fn run_passes(netlist: &mut Netlist, sink: &DiagnosticSink) {
    let passes: Vec<Box<dyn OptPass>> = vec![
        Box::new(crate::const_prop::ConstPropPass),
        Box::new(crate::dce::DcePass),
        Box::new(crate::cse::CsePass),
        Box::new(crate::dce::DcePass), // Final cleanup
    ];

    for pass in &passes {
        pass.run(netlist, sink);
    }
}
