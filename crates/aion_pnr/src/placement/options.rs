//! Runtime tuning knobs and structured errors for the placement pipeline.
//!
//! [`PlacementOptions`] is the authoritative struct the placement algorithms
//! read from; [`aion_config::types::PlaceConfig`] is its TOML-facing mirror,
//! converted via `PlacementOptions::from(&place_config)`.

use thiserror::Error;

/// Runtime options controlling the analytic placer, annealer, and legalisers.
///
/// Mirrors the option surface in `aion_config::types::PlaceConfig`, clamped
/// and resolved to concrete values (e.g. `threads` rounded to a power of two).
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementOptions {
    /// Target worker thread count for [`crate::placement::parallel`], rounded
    /// down to a power of two.
    pub threads: u32,
    /// Whether timing cost and criticality-weighted pulls are enabled.
    pub timing_driven: bool,
    /// Weight between timing and wirelength cost, in `[0, 1]`.
    pub lambda: f64,
    /// Exponent applied to criticality when weighting timing cost.
    pub crit_exp: i32,
    /// Wirelength weighting on the X axis.
    pub hpwl_scale_x: f64,
    /// Wirelength weighting on the Y axis.
    pub hpwl_scale_y: f64,
    /// Weight of the net-sharing cost term.
    pub net_share_weight: f64,
    /// Penalty weight for unsatisfied relative constraints.
    pub constraint_weight: f64,
    /// Below this candidate-bel count, [`crate::placement::fast_bel_index`]
    /// collapses a type's grid to a single cell at `(0, 0)`.
    pub min_bels_for_grid_pick: u32,
    /// Initial annealer temperature.
    pub start_temp: f64,
    /// Per-cell legalisation attempt cap in the single-cell placer (`0` = no
    /// cap beyond the global iteration budget).
    pub cell_placement_timeout: u32,
    /// Solver legalisation-anchor strength per iteration.
    pub alpha: f64,
    /// Cut-spreader over-utilisation threshold fraction.
    pub beta: f64,
    /// Whether the post-HeAP refinement pass runs as [`crate::placement::parallel`]
    /// or a single serial [`crate::placement::anneal`] core.
    pub parallel_refine: bool,
}

impl PlacementOptions {
    /// Solver convergence tolerance for the conjugate-gradient solve.
    pub const CG_TOLERANCE: f64 = 1e-5;
}

impl From<&aion_config::PlaceConfig> for PlacementOptions {
    /// Resolves a [`PlaceConfig`](aion_config::PlaceConfig) against the
    /// defaults, overriding only the fields the project set, and rounding
    /// `threads` down to a power of two.
    fn from(cfg: &aion_config::PlaceConfig) -> Self {
        let defaults = Self::default();
        Self {
            threads: cfg.threads.map(round_down_to_power_of_two).unwrap_or(defaults.threads),
            timing_driven: cfg.timing_driven.unwrap_or(defaults.timing_driven),
            lambda: cfg.lambda.unwrap_or(defaults.lambda),
            crit_exp: cfg.crit_exp.unwrap_or(defaults.crit_exp),
            hpwl_scale_x: cfg.hpwl_scale_x.unwrap_or(defaults.hpwl_scale_x),
            hpwl_scale_y: cfg.hpwl_scale_y.unwrap_or(defaults.hpwl_scale_y),
            net_share_weight: cfg.net_share_weight.unwrap_or(defaults.net_share_weight),
            constraint_weight: cfg.constraint_weight.unwrap_or(defaults.constraint_weight),
            min_bels_for_grid_pick: cfg.min_bels_for_grid_pick.unwrap_or(defaults.min_bels_for_grid_pick),
            start_temp: cfg.start_temp.unwrap_or(defaults.start_temp),
            cell_placement_timeout: cfg.cell_placement_timeout.unwrap_or(defaults.cell_placement_timeout),
            beta: cfg.beta.unwrap_or(defaults.beta),
            parallel_refine: cfg.parallel_refine.unwrap_or(defaults.parallel_refine),
            ..defaults
        }
    }
}

impl Default for PlacementOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            timing_driven: true,
            lambda: 0.5,
            crit_exp: 8,
            hpwl_scale_x: 1.0,
            hpwl_scale_y: 1.0,
            net_share_weight: 0.0,
            constraint_weight: 1.0,
            min_bels_for_grid_pick: 64,
            start_temp: 10_000.0,
            cell_placement_timeout: 0,
            alpha: 0.1,
            beta: 0.9,
            parallel_refine: true,
        }
    }
}

/// Rounds `n` down to the nearest power of two, with a floor of 1.
pub fn round_down_to_power_of_two(n: u32) -> u32 {
    if n == 0 {
        1
    } else {
        1 << (31 - n.leading_zeros())
    }
}

/// Structured errors from the placement pipeline.
///
/// All local move rejections inside the annealer are silent and reverted;
/// they never surface as a `PlacerError`. Only configuration mistakes,
/// confirmed infeasibility, and architecture-oracle inconsistencies abort
/// the placer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlacerError {
    /// An unknown cell type, bel name, or invalid option value in a user
    /// constraint. No partial placement is committed.
    #[error("placement configuration error: {message}")]
    ConfigError {
        /// Human-readable description naming the offending option or cell.
        message: String,
    },
    /// A legaliser exhausted its retry budget, a cluster mapping was
    /// impossible, or the cut-spreader confirmed over-utilisation.
    #[error("placement infeasible in {subsystem}: {message}")]
    Infeasible {
        /// The subsystem that reported infeasibility (e.g. `"ConstraintLegaliser"`).
        subsystem: &'static str,
        /// Human-readable description naming the offending cell, cluster, or region.
        message: String,
    },
    /// The architecture oracle returned contradictory results (e.g. a bound
    /// cell mismatched with its own stored bel). Indicates a bug.
    #[error("internal placement inconsistency: {message}")]
    Internal {
        /// Description of the inconsistency observed.
        message: String,
    },
}

impl From<PlacerError> for aion_common::InternalError {
    fn from(err: PlacerError) -> Self {
        aion_common::InternalError::new(err.to_string())
    }
}
