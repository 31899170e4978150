//! Timing-driven placement adapter over `aion_timing`'s static timing analysis.
//!
//! Wraps one completed [`TimingReport`] into a per-pin criticality lookup,
//! consumed by [`crate::placement::cost::CostModel::total_cost`] and the
//! annealer's timing-driven move acceptance. The mapping from timing graph
//! node names back to [`PnrPinId`] mirrors the naming convention
//! [`crate::timing_bridge::build_timing_graph`] uses to build those nodes
//! (`"{cell_name}/{pin_name}"`, or a bare cell name for single-pin I/O cells).

use crate::data::PnrNetlist;
use crate::ids::PnrPinId;
use aion_common::{AionResult, Interner};
use aion_diagnostics::DiagnosticSink;
use aion_timing::constraints::TimingConstraints;
use aion_timing::graph::TimingGraph;
use aion_timing::report::TimingReport;
use aion_timing::sta::analyze_timing;
use std::collections::HashMap;

/// Per-pin criticality derived from one completed timing analysis run.
///
/// Criticality is only known precisely for pins that land on one of the
/// report's retained critical paths; every other pin is treated as `0.0`.
/// This is a placement-time approximation, not a full per-node slack table —
/// the analytic and annealing cost functions only need a pull signal toward
/// the worst-offending nets, not exact slack everywhere.
pub struct TimingOracle {
    report: TimingReport,
    criticality: HashMap<PnrPinId, f64>,
}

impl TimingOracle {
    /// Runs static timing analysis over `graph` and indexes per-pin
    /// criticality from the reported critical paths.
    pub fn analyze(
        graph: &TimingGraph,
        constraints: &TimingConstraints,
        interner: &Interner,
        sink: &DiagnosticSink,
        netlist: &PnrNetlist,
    ) -> AionResult<Self> {
        let report = analyze_timing(graph, constraints, interner, sink)?;
        let criticality = index_criticality(&report, netlist);
        Ok(Self { report, criticality })
    }

    /// The underlying timing report this oracle was built from.
    pub fn report(&self) -> &TimingReport {
        &self.report
    }

    /// Criticality of `pin` in `[0, 1]`, or `0.0` if `pin` never appeared on
    /// a retained critical path.
    pub fn criticality(&self, pin: PnrPinId) -> f64 {
        self.criticality.get(&pin).copied().unwrap_or(0.0)
    }

    /// A closure form of [`Self::criticality`], suitable for
    /// [`crate::placement::cost::CostModel::total_cost`] and
    /// [`crate::placement::cost::timing_cost`].
    pub fn criticality_fn(&self) -> impl Fn(PnrPinId) -> f64 + '_ {
        move |pin| self.criticality(pin)
    }
}

/// Builds the pin criticality table from a report's critical paths.
///
/// Each path's criticality is normalized against the report's worst slack
/// (a path at the worst slack scores `1.0`; a path that meets timing scores
/// `0.0`), and every pin on the path is credited with the maximum
/// criticality of any path it appears on.
fn index_criticality(report: &TimingReport, netlist: &PnrNetlist) -> HashMap<PnrPinId, f64> {
    let worst = report.worst_slack_ns;
    let mut out = HashMap::new();
    if worst >= 0.0 {
        return out;
    }
    for path in &report.critical_paths {
        let path_criticality = (path.slack_ns / worst).clamp(0.0, 1.0);
        for element in &path.elements {
            if let Some(pin) = resolve_pin(&element.node_name, netlist) {
                let entry = out.entry(pin).or_insert(0.0);
                if path_criticality > *entry {
                    *entry = path_criticality;
                }
            }
        }
    }
    out
}

/// Resolves a timing graph node name back to the pin it was built from.
fn resolve_pin(node_name: &str, netlist: &PnrNetlist) -> Option<PnrPinId> {
    let (cell_name, pin_name) = match node_name.split_once('/') {
        Some((c, p)) => (c, Some(p)),
        None => (node_name, None),
    };
    let cell_id = *netlist.cell_by_name.get(cell_name)?;
    netlist
        .pins
        .iter()
        .find(|pin| pin.cell == cell_id && pin_name.is_none_or(|p| pin.name == p))
        .map(|pin| pin.id)
}
