//! Decision orchestrator (C4): validates a request, resolves headroom,
//! invokes the planner, commits the winning step to live state, and
//! persists the result.

use std::sync::Arc;

use chrono::Utc;
use gridshift_core::contracts::CarbonPriceSample;
use gridshift_core::decision::{confidence_heuristic, DecisionRecord, HeadroomSource};
use gridshift_core::planner::{plan_ramp, Component, Phase, Severity, Status, TraceEvent};
use gridshift_core::topology::GridPrediction;
use gridshift_core::GridShiftError;
use uuid::Uuid;

use crate::state::{ActiveOverlay, AppState, MAX_RECENT_DECISIONS};

const FALLBACK_HEADROOM_KW: f64 = 1500.0;

#[derive(Debug, Clone, Copy)]
pub struct DecisionRequest {
    pub delta_p_request_kw: f64,
    pub p_site_kw: f64,
    pub grid_headroom_kw: Option<f64>,
    pub horizon_s: f64,
    pub dt_s: f64,
    pub ramp_rate_kw_per_s: f64,
}

fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

/// Step 1: validation and range clamping. Non-finite inputs are rejected
/// outright; in-range-but-out-of-bounds inputs are clamped rather than
/// rejected.
fn validate_and_clamp(req: DecisionRequest, cfg: &gridshift_core::ThermalConfig) -> Result<DecisionRequest, GridShiftError> {
    if !req.delta_p_request_kw.is_finite() {
        return Err(GridShiftError::input("deltaP_request_kw must be finite"));
    }
    if !req.p_site_kw.is_finite() {
        return Err(GridShiftError::input("P_site_kw must be finite"));
    }
    if let Some(h) = req.grid_headroom_kw {
        if !h.is_finite() {
            return Err(GridShiftError::input("grid_headroom_kw must be finite"));
        }
    }
    if !req.horizon_s.is_finite() || !req.dt_s.is_finite() || !req.ramp_rate_kw_per_s.is_finite() {
        return Err(GridShiftError::input("horizon_s/dt_s/ramp_rate_kw_per_s must be finite"));
    }

    Ok(DecisionRequest {
        delta_p_request_kw: clamp(req.delta_p_request_kw, -cfg.max_import_kw, cfg.max_export_kw),
        p_site_kw: clamp(req.p_site_kw, 0.0, 100_000.0),
        grid_headroom_kw: req.grid_headroom_kw.map(|h| clamp(h, 0.0, 100_000.0)),
        horizon_s: clamp(req.horizon_s, 10.0, 300.0),
        dt_s: clamp(req.dt_s, 1.0, 10.0),
        ramp_rate_kw_per_s: clamp(req.ramp_rate_kw_per_s, 1.0, 1000.0),
    })
}

/// Runs the full `decide()` pipeline against live state and returns the
/// committed decision record.
pub async fn decide(state: &Arc<AppState>, req: DecisionRequest) -> Result<DecisionRecord, GridShiftError> {
    let req = validate_and_clamp(req, &state.thermal_cfg)?;
    let decision_id = Uuid::new_v4().to_string();
    let ts = Utc::now();
    let mut trace: Vec<TraceEvent> = Vec::new();

    // Step 2/3: resolve headroom.
    let (grid_headroom_kw, headroom_source) = match req.grid_headroom_kw {
        Some(manual) => {
            if state.predictor.ready() {
                if let Ok(GridPrediction { grid_headroom_kw: predicted, .. }) =
                    state.predictor.predict(req.p_site_kw, req.delta_p_request_kw)
                {
                    if predicted < manual {
                        trace.push(gnn_cap_event(&decision_id, predicted, manual));
                        (predicted, HeadroomSource::Gnn)
                    } else {
                        (manual, HeadroomSource::Manual)
                    }
                } else {
                    (manual, HeadroomSource::Manual)
                }
            } else {
                (manual, HeadroomSource::Manual)
            }
        }
        None => {
            if state.predictor.ready() {
                match state.predictor.predict(req.p_site_kw, req.delta_p_request_kw) {
                    Ok(pred) => (pred.grid_headroom_kw, HeadroomSource::Gnn),
                    Err(_) => (FALLBACK_HEADROOM_KW, HeadroomSource::Fallback),
                }
            } else {
                (FALLBACK_HEADROOM_KW, HeadroomSource::Fallback)
            }
        }
    };
    trace.push(headroom_source_event(&decision_id, headroom_source, grid_headroom_kw));

    // Step 5: invoke the planner on a snapshot of live thermal state.
    let snapshot = *state.thermal_state.lock().await;
    let (_approved_signed, plan, planner_trace) = plan_ramp(
        req.p_site_kw,
        grid_headroom_kw,
        &state.thermal_cfg,
        &state.aging_cfg,
        &snapshot,
        req.delta_p_request_kw,
        req.horizon_s,
        req.dt_s,
        req.ramp_rate_kw_per_s,
        &decision_id,
    );
    trace.extend(planner_trace);

    // Step 6: commit the first step, if any and not blocked.
    if !plan.blocked {
        if let Some(step) = plan.steps.first() {
            let mut live = state.thermal_state.lock().await;
            live.t_c = step.rack_temp_c;
            live.p_cool_kw = step.cooling_kw;
        }
    }

    // Step 7: confidence heuristic, purely a function of the plan.
    let confidence = confidence_heuristic(&plan);

    let record = DecisionRecord {
        ts,
        decision_id: decision_id.clone(),
        requested_delta_p_kw: plan.requested_delta_p_kw,
        approved_delta_p_kw: plan.approved_delta_p_kw,
        blocked: plan.blocked,
        reason: plan.reason.clone(),
        primary_constraint: plan.primary_constraint,
        headroom_source,
        grid_headroom_kw,
        confidence,
        plan: plan.clone(),
        trace: trace.clone(),
    };

    // Step 8: persist; failures are logged, never propagated.
    match serde_json::to_string(&record) {
        Ok(json) => {
            if let Err(e) = state.persistence.record_decision(&json) {
                tracing::warn!(error = %e, decision_id = %decision_id, "persistence failed for decision");
            }
        }
        Err(e) => tracing::warn!(error = %e, "failed to serialize decision record"),
    }

    // Step 9: publish final-phase trace into the ring; KPIs are rolled up
    // on demand from these events rather than tracked separately.
    {
        let mut ring = state.trace_ring.lock().await;
        ring.push_all(trace.iter().filter(|e| e.phase == Phase::Final).cloned());
    }
    {
        let mut recent = state.recent_decisions.lock().await;
        recent.push_back(record.clone());
        while recent.len() > MAX_RECENT_DECISIONS {
            recent.pop_front();
        }
    }

    Ok(record)
}

fn headroom_source_event(decision_id: &str, source: HeadroomSource, value: f64) -> TraceEvent {
    let message = match source {
        HeadroomSource::Manual => format!("headroom {:.2} kW from caller override", value),
        HeadroomSource::Gnn => format!("headroom {:.2} kW from predictor", value),
        HeadroomSource::Fallback => format!("headroom {:.2} kW fallback (predictor unavailable)", value),
    };
    TraceEvent {
        ts: Utc::now(),
        decision_id: decision_id.to_string(),
        phase: Phase::Final,
        component: Some(Component::Grid),
        rule_id: "HEADROOM_SOURCE".to_string(),
        status: Status::Info,
        severity: Severity::Low,
        message,
        value: Some(value),
        threshold: None,
        units: Some("kW".to_string()),
        proposed_delta_p_kw: None,
        approved_delta_p_kw: None,
        rack_temp_c: None,
    }
}

fn gnn_cap_event(decision_id: &str, predicted: f64, manual: f64) -> TraceEvent {
    TraceEvent {
        ts: Utc::now(),
        decision_id: decision_id.to_string(),
        phase: Phase::Final,
        component: Some(Component::Gnn),
        rule_id: "GNN_HEADROOM_CAP".to_string(),
        status: Status::Info,
        severity: Severity::Low,
        message: format!("predictor capped override {:.2} kW to {:.2} kW", manual, predicted),
        value: Some(predicted),
        threshold: Some(manual),
        units: Some("kW".to_string()),
        proposed_delta_p_kw: None,
        approved_delta_p_kw: None,
        rack_temp_c: None,
    }
}

/// Samples the armed carbon/price signal for a given timestamp.
pub fn carbon_sample(state: &AppState, at: chrono::DateTime<Utc>) -> CarbonPriceSample {
    state.carbon_source.sample(at)
}

/// Arms a demo overlay; returns the prior one, if any.
pub async fn arm_overlay(state: &AppState, overlay: gridshift_core::scenario::ScenarioOverlay) -> Option<ActiveOverlay> {
    let mut slot = state.active_overlay.lock().await;
    slot.replace(ActiveOverlay {
        overlay,
        armed_at: Utc::now(),
    })
}

pub async fn clear_overlay(state: &AppState) {
    let mut slot = state.active_overlay.lock().await;
    *slot = None;
}
