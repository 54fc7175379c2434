//! First-order lumped-capacitance rack/cooling model (C1).
//!
//! Governing equations:
//!   - Newton's law of cooling for passive heat rejection to ambient.
//!   - A deadband/proportional regulator picks a target heat-removal rate.
//!   - The cooling actuator is ramp-limited before the temperature integral
//!     is taken, so `predict` is a pure function of `(config, state, P_it, dt)`.
//!
//! Units: kW, °C, s, kJ/°C.

use serde::{Deserialize, Serialize};

/// Immutable physical parameters for one rack/row thermal loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalConfig {
    /// Passive heat-loss coefficient to ambient, kW/°C.
    pub k_transfer_kw_per_c: f64,
    /// Hard safety ceiling, °C.
    pub t_max_c: f64,
    /// Post-integration floor, °C.
    pub t_min_c: f64,
    /// Ambient reference temperature, °C.
    pub t_ambient_c: f64,
    /// Cooling controller setpoint, °C.
    pub t_setpoint_c: f64,
    /// Cooling controller hysteresis band, °C.
    pub t_deadband_c: f64,
    /// Actuator rate limit, kW/s, symmetric.
    pub cooling_ramp_max_kw_per_s: f64,
    /// Coefficient of performance (heat removed per electrical kW), >= 1.
    pub cooling_cop: f64,
    /// Actuator lower bound, kW.
    pub cooling_min_kw: f64,
    /// Actuator upper bound, kW.
    pub cooling_max_kw: f64,
    /// Proportional over-temp gain, kW/°C.
    pub kp_temp_kw_per_c: f64,
    /// Fallback thermal mass when dynamic coolant mass is disabled, kJ/°C.
    pub c_mass_kj_per_c: f64,
    /// Whether to derive thermal mass from coolant volume/glycol fraction.
    pub use_dynamic_coolant_mass: bool,
    /// Coolant loop volume, m^3.
    pub coolant_volume_m3: f64,
    /// Glycol fraction in the coolant mix, 0..1.
    pub glycol_fraction: f64,
    /// Signed engineering export limit, kW.
    pub max_export_kw: f64,
    /// Signed engineering import limit, kW.
    pub max_import_kw: f64,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            k_transfer_kw_per_c: 8.0,
            t_max_c: 50.0,
            t_min_c: 5.0,
            t_ambient_c: 22.0,
            t_setpoint_c: 38.0,
            t_deadband_c: 2.0,
            cooling_ramp_max_kw_per_s: 150.0,
            cooling_cop: 3.2,
            cooling_min_kw: 50.0,
            cooling_max_kw: 6000.0,
            kp_temp_kw_per_c: 120.0,
            c_mass_kj_per_c: 45_000.0,
            use_dynamic_coolant_mass: false,
            coolant_volume_m3: 12.0,
            glycol_fraction: 0.25,
            max_export_kw: 5000.0,
            max_import_kw: 5000.0,
        }
    }
}

/// Mutable thermal twin state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalState {
    /// Rack temperature, °C.
    pub t_c: f64,
    /// Electrical cooling power, kW.
    pub p_cool_kw: f64,
}

impl Default for ThermalState {
    fn default() -> Self {
        Self {
            t_c: 38.0,
            p_cool_kw: 400.0,
        }
    }
}

/// Result of a single `predict` call: the next state plus debug evidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub t_c_next: f64,
    pub p_cool_kw_next: f64,
    pub thermal_ok_next: bool,
    /// Heuristic remaining thermal margin converted to a kW-equivalent
    /// headroom: `(T_max - T_next) * Kp_temp_kw_per_c`, floored at 0.
    pub thermal_headroom_kw: f64,
    pub q_passive_kw: f64,
    pub q_active_kw: f64,
    pub cooling_target_kw: f64,
    pub cop_used: f64,
}

fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

/// Thermal mass as a function of coolant temperature, using a simple
/// density/specific-heat polynomial blended by glycol fraction. Clamped to
/// a small positive floor so division never blows up.
fn dynamic_c_mass_kj_per_c(cfg: &ThermalConfig, t_c: f64) -> f64 {
    let density_kg_per_m3 = 1060.0 - 0.35 * t_c - 60.0 * cfg.glycol_fraction;
    let specific_heat_kj_per_kg_c = 4.18 - 0.90 * cfg.glycol_fraction - 0.001 * t_c;
    let mass_kg = cfg.coolant_volume_m3 * density_kg_per_m3.max(500.0);
    (mass_kg * specific_heat_kj_per_kg_c.max(1.0) / 1000.0).max(1e-3)
}

/// Pure prediction of the next thermal-twin tick. Does not mutate `state`.
///
/// `p_it_kw` must be finite; callers (the orchestrator) are responsible for
/// rejecting non-finite IT load before it reaches this function.
pub fn predict(cfg: &ThermalConfig, state: &ThermalState, p_it_kw: f64, dt_s: f64) -> Prediction {
    debug_assert!(p_it_kw.is_finite(), "non-finite P_it reached the twin");

    // 1. Passive heat rejection.
    let q_passive_kw = cfg.k_transfer_kw_per_c * (state.t_c - cfg.t_ambient_c);

    // 2. Base heat to remove.
    let q = (p_it_kw - q_passive_kw).max(0.0);

    // 3. Setpoint regulator.
    let err = state.t_c - cfg.t_setpoint_c;
    let target_heat_kw = if err <= -cfg.t_deadband_c {
        0.10 * q
    } else if err.abs() <= cfg.t_deadband_c {
        0.30 * q
    } else {
        q + cfg.kp_temp_kw_per_c * err
    };

    // 4. Electrical target, clamped to actuator bounds.
    let cop_used = cfg.cooling_cop;
    let cooling_target_kw = clamp(target_heat_kw / cop_used, cfg.cooling_min_kw, cfg.cooling_max_kw);

    // 5. Ramp-limit the actuator.
    let max_step = cfg.cooling_ramp_max_kw_per_s * dt_s;
    let delta_p_cool = clamp(cooling_target_kw - state.p_cool_kw, -max_step, max_step);
    let p_cool_kw_next = clamp(
        state.p_cool_kw + delta_p_cool,
        cfg.cooling_min_kw,
        cfg.cooling_max_kw,
    );

    // 6. Active heat removed.
    let q_active_kw = p_cool_kw_next * cop_used;

    // 7. Integrate.
    let c_mass = if cfg.use_dynamic_coolant_mass {
        dynamic_c_mass_kj_per_c(cfg, state.t_c)
    } else {
        cfg.c_mass_kj_per_c.max(1e-3)
    };
    let delta_t = ((p_it_kw - q_passive_kw - q_active_kw) * dt_s) / c_mass;
    let t_c_next = (state.t_c + delta_t).max(cfg.t_min_c);

    // 8. Safety flag + heuristic headroom.
    let thermal_ok_next = t_c_next < cfg.t_max_c;
    let thermal_headroom_kw = ((cfg.t_max_c - t_c_next) * cfg.kp_temp_kw_per_c).max(0.0);

    Prediction {
        t_c_next,
        p_cool_kw_next,
        thermal_ok_next,
        thermal_headroom_kw,
        q_passive_kw,
        q_active_kw,
        cooling_target_kw,
        cop_used,
    }
}

/// `predict` followed by a state commit.
pub fn step(cfg: &ThermalConfig, state: &mut ThermalState, p_it_kw: f64, dt_s: f64) -> Prediction {
    let pred = predict(cfg, state, p_it_kw, dt_s);
    state.t_c = pred.t_c_next;
    state.p_cool_kw = pred.p_cool_kw_next;
    pred
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_is_pure_and_idempotent() {
        let cfg = ThermalConfig::default();
        let state = ThermalState {
            t_c: 42.0,
            p_cool_kw: 800.0,
        };
        let a = predict(&cfg, &state, 20_000.0, 1.0);
        let b = predict(&cfg, &state, 20_000.0, 1.0);
        assert_eq!(a, b);
    }

    #[test]
    fn floor_at_t_min_is_respected() {
        let cfg = ThermalConfig {
            t_min_c: 10.0,
            ..ThermalConfig::default()
        };
        let state = ThermalState {
            t_c: 10.5,
            p_cool_kw: cfg.cooling_max_kw,
        };
        // Huge cooling relative to IT load should try to drive T below t_min.
        let pred = predict(&cfg, &state, 0.0, 10.0);
        assert!(pred.t_c_next >= cfg.t_min_c - 1e-9);
    }

    #[test]
    fn cooling_actuator_respects_ramp_limit() {
        let cfg = ThermalConfig::default();
        let state = ThermalState {
            t_c: 49.0,
            p_cool_kw: 50.0,
        };
        let pred = predict(&cfg, &state, 50_000.0, 1.0);
        let step_delta = (pred.p_cool_kw_next - state.p_cool_kw).abs();
        assert!(step_delta <= cfg.cooling_ramp_max_kw_per_s * 1.0 + 1e-6);
    }

    #[test]
    fn cooling_actuator_stays_within_bounds() {
        let cfg = ThermalConfig::default();
        let mut state = ThermalState {
            t_c: 60.0,
            p_cool_kw: 10.0,
        };
        for _ in 0..50 {
            let pred = step(&cfg, &mut state, 80_000.0, 1.0);
            assert!(pred.p_cool_kw_next >= cfg.cooling_min_kw - 1e-9);
            assert!(pred.p_cool_kw_next <= cfg.cooling_max_kw + 1e-9);
        }
    }

    #[test]
    fn thermal_ok_flag_matches_t_max_comparison() {
        let cfg = ThermalConfig::default();
        let state = ThermalState {
            t_c: cfg.t_max_c - 0.01,
            p_cool_kw: 50.0,
        };
        let pred = predict(&cfg, &state, 90_000.0, 5.0);
        assert_eq!(pred.thermal_ok_next, pred.t_c_next < cfg.t_max_c);
    }
}
