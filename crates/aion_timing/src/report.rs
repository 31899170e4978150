//! Timing report types: critical paths, endpoints, and per-domain summaries.
//!
//! These are the output types of [`crate::sta::analyze_timing`] — a
//! snapshot of slack and critical-path data for one completed STA run.

use aion_common::Ident;
use aion_source::Span;
use serde::{Deserialize, Serialize};

/// One node visited along a critical path, in source-to-sink order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathElement {
    /// Display name of the timing node (cell pin, primary I/O, or clock source).
    pub node_name: String,
    /// Debug-formatted node type (`CellPin`, `PrimaryInput`, ...).
    pub node_type: String,
    /// Delay contributed by the edge arriving at this node, in nanoseconds.
    pub delay_ns: f64,
    /// Cumulative path delay up to and including this node, in nanoseconds.
    pub cumulative_ns: f64,
    /// Physical location of this node, once placed.
    pub location: Option<String>,
    /// Source span this node traces back to, if known.
    pub source_span: Option<Span>,
}

/// A named endpoint of a critical path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingEndpoint {
    /// Interned name of the node.
    pub node: Ident,
    /// Interned pin name, if the endpoint names a specific cell pin.
    pub pin: Option<Ident>,
}

/// One reported critical path from a source endpoint to a sink endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticalPath {
    /// The path's source endpoint.
    pub from: TimingEndpoint,
    /// The path's sink endpoint.
    pub to: TimingEndpoint,
    /// Total path delay, in nanoseconds.
    pub delay_ns: f64,
    /// Slack at the sink endpoint, in nanoseconds (negative means violated).
    pub slack_ns: f64,
    /// Nodes visited along the path, source to sink.
    pub elements: Vec<PathElement>,
}

/// Per-clock-domain timing summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockDomainTiming {
    /// Interned clock name.
    pub clock_name: Ident,
    /// Clock period, in nanoseconds.
    pub period_ns: f64,
    /// Worst slack observed among this domain's critical paths, in nanoseconds.
    pub worst_slack_ns: f64,
    /// Number of critical paths attributed to this domain.
    pub critical_path_count: usize,
    /// Number of distinct endpoints attributed to this domain.
    pub endpoint_count: usize,
    /// Whether every path in this domain meets timing.
    pub met: bool,
}

/// The result of a completed static timing analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingReport {
    /// Per-clock-domain summaries.
    pub clock_domains: Vec<ClockDomainTiming>,
    /// Worst-slack critical paths, sorted worst-first.
    pub critical_paths: Vec<CriticalPath>,
    /// Worst slack across every endpoint, in nanoseconds.
    pub worst_slack_ns: f64,
    /// Estimated achieved frequency, in MHz.
    pub achieved_frequency_mhz: f64,
    /// Target frequency from the primary clock constraint, in MHz.
    pub target_frequency_mhz: f64,
    /// Whether every constraint is met (`worst_slack_ns >= 0`).
    pub met: bool,
}

impl TimingReport {
    /// An empty report for a graph with no timing nodes.
    pub fn empty() -> Self {
        Self {
            clock_domains: Vec::new(),
            critical_paths: Vec::new(),
            worst_slack_ns: 0.0,
            achieved_frequency_mhz: 0.0,
            target_frequency_mhz: 0.0,
            met: true,
        }
    }

    /// Number of critical paths with negative slack.
    pub fn violation_count(&self) -> usize {
        self.critical_paths
            .iter()
            .filter(|p| p.slack_ns < 0.0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_met() {
        let report = TimingReport::empty();
        assert!(report.met);
        assert_eq!(report.violation_count(), 0);
    }

    #[test]
    fn violation_count_counts_negative_slack_paths() {
        let interner = aion_common::Interner::new();
        let endpoint = TimingEndpoint {
            node: interner.get_or_intern("n"),
            pin: None,
        };
        let mut report = TimingReport::empty();
        report.critical_paths.push(CriticalPath {
            from: endpoint,
            to: endpoint,
            delay_ns: 5.0,
            slack_ns: -1.0,
            elements: vec![],
        });
        report.critical_paths.push(CriticalPath {
            from: endpoint,
            to: endpoint,
            delay_ns: 2.0,
            slack_ns: 3.0,
            elements: vec![],
        });
        assert_eq!(report.violation_count(), 1);
    }
}
