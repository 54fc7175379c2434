//! Short-horizon ramp planner / safety gate (C3).
//!
//! Given a requested ΔP, searches for the largest magnitude that satisfies
//! grid-headroom, thermal, ramp-rate, and battery-aging constraints across
//! every step of a short forward-simulated horizon, emitting an ordered
//! trace of each rule evaluation. Never mutates the caller's live thermal
//! state: `plan_ramp` works on a local copy throughout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aging::{self, BatteryAgingConfig};
use crate::thermal::{self, ThermalConfig, ThermalState};

/// Closed sum type for which subsystem shaped a blocked outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Component {
    Grid,
    Thermal,
    Ramp,
    Policy,
    Gnn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Info,
    Allowed,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Candidate,
    Final,
}

/// One rule evaluation with evidence, emitted by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub ts: DateTime<Utc>,
    pub decision_id: String,
    pub phase: Phase,
    pub component: Option<Component>,
    pub rule_id: String,
    pub status: Status,
    pub severity: Severity,
    pub message: String,
    pub value: Option<f64>,
    pub threshold: Option<f64>,
    pub units: Option<String>,
    pub proposed_delta_p_kw: Option<f64>,
    pub approved_delta_p_kw: Option<f64>,
    pub rack_temp_c: Option<f64>,
}

#[allow(clippy::too_many_arguments)]
impl TraceEvent {
    fn new(
        decision_id: &str,
        phase: Phase,
        component: Option<Component>,
        rule_id: &str,
        status: Status,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            ts: Utc::now(),
            decision_id: decision_id.to_string(),
            phase,
            component,
            rule_id: rule_id.to_string(),
            status,
            severity,
            message: message.into(),
            value: None,
            threshold: None,
            units: None,
            proposed_delta_p_kw: None,
            approved_delta_p_kw: None,
            rack_temp_c: None,
        }
    }

    fn with_evidence(mut self, value: Option<f64>, threshold: Option<f64>, units: &str) -> Self {
        self.value = value;
        self.threshold = threshold;
        self.units = Some(units.to_string());
        self
    }

    fn with_step_evidence(mut self, proposed: f64, approved: Option<f64>, rack_temp_c: f64) -> Self {
        self.proposed_delta_p_kw = Some(proposed);
        self.approved_delta_p_kw = approved;
        self.rack_temp_c = Some(rack_temp_c);
        self
    }
}

/// Rule id constants: stable strings used across trace events and tests.
pub mod rule_ids {
    pub const GRID_HEADROOM_CLAMP: &str = "GRID_HEADROOM_CLAMP";
    pub const GRID_HEADROOM_REDUCED_ACTION: &str = "GRID_HEADROOM_REDUCED_ACTION";
    pub const GRID_HEADROOM_ZERO: &str = "GRID_HEADROOM_ZERO";
    pub const RAMP_RATE_LIMIT: &str = "RAMP_RATE_LIMIT";
    pub const BATTERY_AGING_STEP: &str = "BATTERY_AGING_STEP";
    pub const THERMAL_MARGIN_TOO_THIN: &str = "THERMAL_MARGIN_TOO_THIN";
    pub const THERMAL_OVER_TEMP: &str = "THERMAL_OVER_TEMP";
    pub const BATTERY_WEAR_BLOCKED: &str = "BATTERY_WEAR_BLOCKED";
    pub const THERMAL_PREDICT_STEP: &str = "THERMAL_PREDICT_STEP";
    pub const APPROVED_DELTA_SELECTED: &str = "APPROVED_DELTA_SELECTED";
    pub const THERMAL_BLOCKED: &str = "THERMAL_BLOCKED";
}
use rule_ids::*;

/// Evidence for one horizon step of a [`RampPlan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RampPlanStep {
    pub t_offset_s: f64,
    pub proposed_delta_p_kw: f64,
    pub rack_temp_c: f64,
    pub cooling_kw: f64,
    pub thermal_ok: bool,
    pub thermal_headroom_kw: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RampPlan {
    pub requested_delta_p_kw: f64,
    pub approved_delta_p_kw: f64,
    pub blocked: bool,
    pub reason: String,
    pub primary_constraint: Option<Component>,
    pub constraint_value: Option<f64>,
    pub constraint_threshold: Option<f64>,
    pub steps: Vec<RampPlanStep>,
}

/// Why a candidate magnitude simulation failed, if it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureReason {
    None,
    ThermalMarginTooThin,
    ThermalOverTemp,
    BatteryWearBlocked,
}

struct SimOutcome {
    ok: bool,
    failure: FailureReason,
    steps: Vec<RampPlanStep>,
    cap_loss_accum: f64,
}

/// Runs one candidate forward simulation of `desired_mag_kw` (a non-negative
/// magnitude) over the horizon, optionally emitting trace events.
#[allow(clippy::too_many_arguments)]
fn simulate(
    p_site_kw: f64,
    sign: f64,
    thermal_cfg: &ThermalConfig,
    aging_cfg: &BatteryAgingConfig,
    thermal_state: &ThermalState,
    desired_mag_kw: f64,
    n_steps: u32,
    dt_s: f64,
    ramp_rate_kw_per_s: f64,
    decision_id: &str,
    emit: bool,
    events: &mut Vec<TraceEvent>,
) -> SimOutcome {
    let mut local_state = *thermal_state;
    let mut current_mag = 0.0_f64;
    let mut cap_loss_accum = 0.0_f64;
    let mut steps = Vec::with_capacity(n_steps as usize);
    let max_step = ramp_rate_kw_per_s * dt_s;

    for i in 0..n_steps {
        let t_offset_s = (i + 1) as f64 * dt_s;
        let wanted_delta = desired_mag_kw - current_mag;
        let delta_step = wanted_delta.max(-max_step).min(max_step);
        let next_mag = current_mag + delta_step;
        let rate_limited = (wanted_delta.abs() - delta_step.abs()) > 1e-9;

        if rate_limited && emit {
            events.push(
                TraceEvent::new(
                    decision_id,
                    Phase::Final,
                    Some(Component::Ramp),
                    RAMP_RATE_LIMIT,
                    Status::Info,
                    Severity::Low,
                    format!(
                        "ramp-limited step to {:.2} kW/s toward {:.2} kW",
                        max_step, desired_mag_kw
                    ),
                )
                .with_evidence(Some(next_mag - current_mag), Some(max_step), "kW"),
            );
        }

        let signed_delta = sign * next_mag;
        let pred = thermal::predict(thermal_cfg, &local_state, p_site_kw + signed_delta, dt_s);

        let throughput_kw = next_mag.abs() + (pred.p_cool_kw_next - local_state.p_cool_kw).abs();
        cap_loss_accum += aging::increment(aging_cfg, pred.t_c_next, throughput_kw, dt_s);

        if emit {
            events.push(
                TraceEvent::new(
                    decision_id,
                    Phase::Final,
                    Some(Component::Policy),
                    BATTERY_AGING_STEP,
                    Status::Info,
                    Severity::Low,
                    format!("accumulated capacity loss {:.6}", cap_loss_accum),
                )
                .with_evidence(
                    Some(cap_loss_accum),
                    Some(aging_cfg.max_cap_loss_frac_per_decision),
                    "frac",
                ),
            );
        }

        let margin = thermal_cfg.t_max_c - pred.t_c_next;

        // Gate A: margin.
        if margin < 0.5 {
            if emit {
                events.push(
                    TraceEvent::new(
                        decision_id,
                        Phase::Final,
                        Some(Component::Thermal),
                        THERMAL_MARGIN_TOO_THIN,
                        Status::Blocked,
                        Severity::Medium,
                        format!("thermal margin {:.3}C below 0.5C floor", margin),
                    )
                    .with_evidence(Some(pred.t_c_next), Some(thermal_cfg.t_max_c), "C")
                    .with_step_evidence(signed_delta, None, pred.t_c_next),
                );
            }
            steps.push(RampPlanStep {
                t_offset_s,
                proposed_delta_p_kw: signed_delta,
                rack_temp_c: pred.t_c_next,
                cooling_kw: pred.p_cool_kw_next,
                thermal_ok: false,
                thermal_headroom_kw: pred.thermal_headroom_kw,
                reason: THERMAL_MARGIN_TOO_THIN.to_string(),
            });
            return SimOutcome {
                ok: false,
                failure: FailureReason::ThermalMarginTooThin,
                steps,
                cap_loss_accum,
            };
        }

        // Gate B: overshoot.
        if !pred.thermal_ok_next {
            if emit {
                events.push(
                    TraceEvent::new(
                        decision_id,
                        Phase::Final,
                        Some(Component::Thermal),
                        THERMAL_OVER_TEMP,
                        Status::Blocked,
                        Severity::High,
                        format!("predicted rack temp {:.2}C exceeds T_max", pred.t_c_next),
                    )
                    .with_evidence(Some(pred.t_c_next), Some(thermal_cfg.t_max_c), "C")
                    .with_step_evidence(signed_delta, None, pred.t_c_next),
                );
            }
            steps.push(RampPlanStep {
                t_offset_s,
                proposed_delta_p_kw: signed_delta,
                rack_temp_c: pred.t_c_next,
                cooling_kw: pred.p_cool_kw_next,
                thermal_ok: false,
                thermal_headroom_kw: pred.thermal_headroom_kw,
                reason: THERMAL_OVER_TEMP.to_string(),
            });
            return SimOutcome {
                ok: false,
                failure: FailureReason::ThermalOverTemp,
                steps,
                cap_loss_accum,
            };
        }

        // Gate C: aging budget.
        if cap_loss_accum > aging_cfg.max_cap_loss_frac_per_decision {
            if emit {
                events.push(
                    TraceEvent::new(
                        decision_id,
                        Phase::Final,
                        Some(Component::Policy),
                        BATTERY_WEAR_BLOCKED,
                        Status::Blocked,
                        Severity::Medium,
                        format!("capacity loss {:.6} exceeds per-decision budget", cap_loss_accum),
                    )
                    .with_evidence(
                        Some(cap_loss_accum),
                        Some(aging_cfg.max_cap_loss_frac_per_decision),
                        "frac",
                    )
                    .with_step_evidence(signed_delta, None, pred.t_c_next),
                );
            }
            steps.push(RampPlanStep {
                t_offset_s,
                proposed_delta_p_kw: signed_delta,
                rack_temp_c: pred.t_c_next,
                cooling_kw: pred.p_cool_kw_next,
                thermal_ok: true,
                thermal_headroom_kw: pred.thermal_headroom_kw,
                reason: BATTERY_WEAR_BLOCKED.to_string(),
            });
            return SimOutcome {
                ok: false,
                failure: FailureReason::BatteryWearBlocked,
                steps,
                cap_loss_accum,
            };
        }

        if emit {
            events.push(
                TraceEvent::new(
                    decision_id,
                    Phase::Final,
                    Some(Component::Thermal),
                    THERMAL_PREDICT_STEP,
                    Status::Allowed,
                    Severity::Low,
                    format!("step {} allowed at {:.2} kW", i, signed_delta),
                )
                .with_evidence(Some(pred.t_c_next), Some(thermal_cfg.t_max_c), "C")
                .with_step_evidence(signed_delta, Some(signed_delta), pred.t_c_next),
            );
        }

        steps.push(RampPlanStep {
            t_offset_s,
            proposed_delta_p_kw: signed_delta,
            rack_temp_c: pred.t_c_next,
            cooling_kw: pred.p_cool_kw_next,
            thermal_ok: true,
            thermal_headroom_kw: pred.thermal_headroom_kw,
            reason: "OK".to_string(),
        });

        local_state.t_c = pred.t_c_next;
        local_state.p_cool_kw = pred.p_cool_kw_next;
        current_mag = next_mag;
    }

    SimOutcome {
        ok: true,
        failure: FailureReason::None,
        steps,
        cap_loss_accum,
    }
}

/// Runs the full C3 pipeline and returns `(approved_signed_kw, plan)`.
#[allow(clippy::too_many_arguments)]
pub fn plan_ramp(
    p_site_kw: f64,
    grid_headroom_kw: f64,
    thermal_cfg: &ThermalConfig,
    aging_cfg: &BatteryAgingConfig,
    thermal_state: &ThermalState,
    delta_p_request_kw: f64,
    horizon_s: f64,
    dt_s: f64,
    ramp_rate_kw_per_s: f64,
    decision_id: &str,
) -> (f64, RampPlan, Vec<TraceEvent>) {
    let mut events: Vec<TraceEvent> = Vec::new();
    let sign = if delta_p_request_kw < 0.0 { -1.0 } else { 1.0 };
    let req = delta_p_request_kw.abs();
    let headroom = grid_headroom_kw.max(0.0);
    let cap = req.min(headroom);
    let n_steps = (horizon_s / dt_s).ceil().max(1.0) as u32;

    events.push(
        TraceEvent::new(
            decision_id,
            Phase::Final,
            Some(Component::Grid),
            GRID_HEADROOM_CLAMP,
            Status::Info,
            Severity::Low,
            format!("requested {:.2} kW clamped to {:.2} kW by headroom", req, cap),
        )
        .with_evidence(Some(cap), Some(headroom), "kW"),
    );

    if cap < req {
        events.push(
            TraceEvent::new(
                decision_id,
                Phase::Final,
                Some(Component::Grid),
                GRID_HEADROOM_REDUCED_ACTION,
                Status::Blocked,
                Severity::Medium,
                format!("headroom {:.2} kW below requested {:.2} kW", headroom, req),
            )
            .with_evidence(Some(headroom), Some(req), "kW"),
        );
    }

    if cap <= 1e-6 {
        events.push(
            TraceEvent::new(
                decision_id,
                Phase::Final,
                Some(Component::Grid),
                GRID_HEADROOM_ZERO,
                Status::Blocked,
                Severity::High,
                "zero grid headroom available",
            )
            .with_evidence(Some(headroom), Some(0.0), "kW"),
        );
        let plan = RampPlan {
            requested_delta_p_kw: delta_p_request_kw,
            approved_delta_p_kw: 0.0,
            blocked: true,
            reason: GRID_HEADROOM_ZERO.to_string(),
            primary_constraint: Some(Component::Grid),
            constraint_value: Some(headroom),
            constraint_threshold: Some(0.0),
            steps: Vec::new(),
        };
        return (0.0, plan, events);
    }

    // Binary search for the largest safe magnitude in [0, cap].
    let mut low = 0.0_f64;
    let mut high = cap;
    let mut best = 0.0_f64;
    let mut best_steps: Vec<RampPlanStep> = Vec::new();
    let mut best_accum = 0.0_f64;
    let mut scratch = Vec::new();

    for _ in 0..20 {
        let mid = (low + high) / 2.0;
        scratch.clear();
        let outcome = simulate(
            p_site_kw,
            sign,
            thermal_cfg,
            aging_cfg,
            thermal_state,
            mid,
            n_steps,
            dt_s,
            ramp_rate_kw_per_s,
            decision_id,
            false,
            &mut scratch,
        );
        if outcome.ok {
            best = mid;
            low = mid;
            best_steps = outcome.steps;
            best_accum = outcome.cap_loss_accum;
        } else {
            high = mid;
        }
    }
    let _ = best_accum;

    let (blocked, reason, primary_constraint, constraint_value, constraint_threshold) =
        if best <= 1e-6 {
            if cap <= 1e-6 {
                (
                    true,
                    GRID_HEADROOM_ZERO.to_string(),
                    Some(Component::Grid),
                    Some(headroom),
                    Some(0.0),
                )
            } else {
                let mut probe_events = Vec::new();
                let probe = simulate(
                    p_site_kw,
                    sign,
                    thermal_cfg,
                    aging_cfg,
                    thermal_state,
                    cap,
                    n_steps,
                    dt_s,
                    ramp_rate_kw_per_s,
                    decision_id,
                    false,
                    &mut probe_events,
                );
                match probe.failure {
                    FailureReason::BatteryWearBlocked => (
                        true,
                        BATTERY_WEAR_BLOCKED.to_string(),
                        Some(Component::Policy),
                        Some(probe.cap_loss_accum),
                        Some(aging_cfg.max_cap_loss_frac_per_decision),
                    ),
                    _ => {
                        let last_t = probe
                            .steps
                            .last()
                            .map(|s| s.rack_temp_c)
                            .unwrap_or(thermal_state.t_c);
                        (
                            true,
                            THERMAL_BLOCKED.to_string(),
                            Some(Component::Thermal),
                            Some(last_t),
                            Some(thermal_cfg.t_max_c),
                        )
                    }
                }
            }
        } else {
            (false, "APPROVED".to_string(), None, None, None)
        };

    // Finalize: re-run at `best` with trace emission on, so final-phase
    // events always describe the chosen plan. Candidate-probe events from
    // the binary search above are intentionally not emitted.
    let mut final_events = Vec::new();
    let final_outcome = simulate(
        p_site_kw,
        sign,
        thermal_cfg,
        aging_cfg,
        thermal_state,
        best,
        n_steps,
        dt_s,
        ramp_rate_kw_per_s,
        decision_id,
        true,
        &mut final_events,
    );
    events.extend(final_events);
    let approved_steps = if final_outcome.ok { final_outcome.steps } else { best_steps };

    let approved_signed_kw = sign * best;
    events.push(
        TraceEvent::new(
            decision_id,
            Phase::Final,
            primary_constraint,
            APPROVED_DELTA_SELECTED,
            if blocked { Status::Blocked } else { Status::Allowed },
            if blocked { Severity::Medium } else { Severity::Low },
            format!("selected approved delta {:.2} kW", approved_signed_kw),
        )
        .with_step_evidence(delta_p_request_kw, Some(approved_signed_kw), thermal_state.t_c),
    );

    let plan = RampPlan {
        requested_delta_p_kw: delta_p_request_kw,
        approved_delta_p_kw: approved_signed_kw,
        blocked,
        reason,
        primary_constraint,
        constraint_value,
        constraint_threshold,
        steps: approved_steps,
    };

    (approved_signed_kw, plan, events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision_id() -> String {
        "test-decision".to_string()
    }

    #[test]
    fn zero_headroom_blocks_with_single_zero_event() {
        let (approved, plan, events) = plan_ramp(
            1000.0,
            0.0,
            &ThermalConfig::default(),
            &BatteryAgingConfig::default(),
            &ThermalState::default(),
            500.0,
            30.0,
            1.0,
            50.0,
            &decision_id(),
        );
        assert_eq!(approved, 0.0);
        assert!(plan.blocked);
        assert_eq!(plan.reason, "GRID_HEADROOM_ZERO");
        assert_eq!(plan.primary_constraint, Some(Component::Grid));
        let zero_events: Vec<_> = events
            .iter()
            .filter(|e| e.rule_id == "GRID_HEADROOM_ZERO" && e.status == Status::Blocked)
            .collect();
        assert_eq!(zero_events.len(), 1);
    }

    #[test]
    fn grid_limited_clip_is_not_blocked() {
        let (approved, plan, events) = plan_ramp(
            1000.0,
            100.0,
            &ThermalConfig::default(),
            &BatteryAgingConfig::default(),
            &ThermalState::default(),
            500.0,
            30.0,
            1.0,
            50.0,
            &decision_id(),
        );
        assert!((approved - 100.0).abs() < 1e-6);
        assert!(!plan.blocked);
        assert!(events.iter().any(|e| e.rule_id == "GRID_HEADROOM_REDUCED_ACTION"));
    }

    #[test]
    fn thermal_block_on_near_limit_import() {
        let cfg = ThermalConfig::default();
        let state = ThermalState {
            t_c: 49.7,
            p_cool_kw: 400.0,
        };
        let (approved, plan, _events) = plan_ramp(
            50_000.0,
            20_000.0,
            &cfg,
            &BatteryAgingConfig::default(),
            &state,
            -2000.0,
            30.0,
            1.0,
            20.0,
            &decision_id(),
        );
        assert!(approved.abs() < 50.0, "expected a small/blocked approval, got {approved}");
        if plan.blocked {
            assert_eq!(plan.reason, "THERMAL_BLOCKED");
            assert_eq!(plan.primary_constraint, Some(Component::Thermal));
        }
    }

    #[test]
    fn ramp_rate_audit_never_exceeds_configured_rate() {
        let (_approved, plan, events) = plan_ramp(
            1000.0,
            1000.0,
            &ThermalConfig::default(),
            &BatteryAgingConfig::default(),
            &ThermalState::default(),
            500.0,
            10.0,
            1.0,
            10.0,
            &decision_id(),
        );
        for w in plan.steps.windows(2) {
            let delta = (w[1].proposed_delta_p_kw - w[0].proposed_delta_p_kw).abs();
            assert!(delta <= 10.0 + 1e-6, "step delta {delta} exceeded ramp rate");
        }
        assert!(events.iter().any(|e| e.rule_id == "RAMP_RATE_LIMIT"));
    }

    #[test]
    fn approved_never_exceeds_request_or_headroom() {
        let (approved, _plan, _events) = plan_ramp(
            2000.0,
            300.0,
            &ThermalConfig::default(),
            &BatteryAgingConfig::default(),
            &ThermalState::default(),
            5000.0,
            30.0,
            1.0,
            200.0,
            &decision_id(),
        );
        assert!(approved.abs() <= 5000.0_f64.min(300.0) + 1e-6);
    }

    #[test]
    fn blocked_plan_has_matching_trace_event() {
        let (_approved, plan, events) = plan_ramp(
            1000.0,
            0.0,
            &ThermalConfig::default(),
            &BatteryAgingConfig::default(),
            &ThermalState::default(),
            500.0,
            30.0,
            1.0,
            50.0,
            &decision_id(),
        );
        if plan.blocked {
            let matches = events.iter().any(|e| {
                e.status == Status::Blocked
                    && Some(e.component.unwrap_or(Component::Policy)) == plan.primary_constraint.map(Some).unwrap_or(None)
            });
            assert!(matches || plan.primary_constraint == Some(Component::Grid));
        }
    }
}
