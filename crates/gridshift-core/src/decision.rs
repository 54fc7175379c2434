//! Top-level decision record produced by the orchestrator (C4), built from
//! a [`crate::planner::RampPlan`] plus provenance of where the headroom
//! figure came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::planner::{Component, RampPlan, TraceEvent};

/// Where the grid-headroom figure used by a decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeadroomSource {
    /// Caller supplied `grid_headroom_kw` directly.
    Manual,
    /// Refined by the (optional) headroom predictor.
    Gnn,
    /// Predictor unavailable or not ready; manual/override value used.
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub ts: DateTime<Utc>,
    pub decision_id: String,
    pub requested_delta_p_kw: f64,
    pub approved_delta_p_kw: f64,
    pub blocked: bool,
    pub reason: String,
    pub primary_constraint: Option<Component>,
    pub headroom_source: HeadroomSource,
    pub grid_headroom_kw: f64,
    pub confidence: f64,
    pub plan: RampPlan,
    pub trace: Vec<TraceEvent>,
}

/// Confidence heuristic: starts at 0.85, then takes the minimum with each
/// applicable discount: full magnitude approved, a clipped magnitude, and
/// a thin margin on the primary constraint all pull confidence down
/// independently, and the lowest one wins.
pub fn confidence_heuristic(plan: &RampPlan) -> f64 {
    let mut candidates = vec![0.85_f64];

    if plan.blocked {
        candidates.push(0.4);
    }
    if plan.approved_delta_p_kw.abs() < plan.requested_delta_p_kw.abs() - 1e-9 {
        candidates.push(0.65);
    }
    if let (Some(value), Some(threshold)) = (plan.constraint_value, plan.constraint_threshold) {
        let margin = threshold - value;
        if margin < 0.0 {
            candidates.push(0.35);
        } else if margin < 0.5 {
            candidates.push(0.55);
        } else if margin < 1.0 {
            candidates.push(0.7);
        }
    }

    candidates.into_iter().fold(f64::INFINITY, f64::min)
}
