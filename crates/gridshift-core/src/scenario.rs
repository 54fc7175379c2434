//! Deterministic demo scenarios and overlay effects (C8).
//!
//! Fixed presets exercise each of the planner's three broad outcomes
//! (approved, grid-blocked, thermal-blocked) with exact numeric inputs,
//! and overlay effects let a running demo nudge the ambient/telemetry
//! baseline without touching the core physics models.

use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetryPoint;
use crate::thermal::ThermalState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemoScenario {
    Approved,
    GridBlock,
    ThermalBlock,
}

/// Fixed request parameters for one demo scenario, matching a `decide()`
/// call's signature one-for-one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPreset {
    pub thermal_state: ThermalState,
    pub delta_p_request_kw: f64,
    pub p_site_kw: f64,
    pub grid_headroom_kw: f64,
    pub horizon_s: f64,
    pub dt_s: f64,
    pub ramp_rate_kw_per_s: f64,
}

impl DemoScenario {
    pub fn preset(self) -> ScenarioPreset {
        match self {
            DemoScenario::Approved => ScenarioPreset {
                thermal_state: ThermalState {
                    t_c: 42.0,
                    p_cool_kw: 800.0,
                },
                delta_p_request_kw: 400.0,
                p_site_kw: 20_000.0,
                grid_headroom_kw: 5_000.0,
                horizon_s: 30.0,
                dt_s: 1.0,
                ramp_rate_kw_per_s: 250.0,
            },
            DemoScenario::GridBlock => ScenarioPreset {
                thermal_state: ThermalState {
                    t_c: 42.0,
                    p_cool_kw: 800.0,
                },
                delta_p_request_kw: 1_500.0,
                p_site_kw: 25_000.0,
                grid_headroom_kw: 0.0,
                horizon_s: 30.0,
                dt_s: 1.0,
                ramp_rate_kw_per_s: 250.0,
            },
            DemoScenario::ThermalBlock => ScenarioPreset {
                thermal_state: ThermalState {
                    t_c: 49.7,
                    p_cool_kw: 400.0,
                },
                delta_p_request_kw: -2_000.0,
                p_site_kw: 50_000.0,
                grid_headroom_kw: 20_000.0,
                horizon_s: 30.0,
                dt_s: 1.0,
                ramp_rate_kw_per_s: 500.0,
            },
        }
    }
}

/// Resets the shared demo thermal twin to its baseline state.
pub fn reset_thermal_state() -> ThermalState {
    ThermalState {
        t_c: 42.0,
        p_cool_kw: 800.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioOverlay {
    /// Raises ambient/rack temperature and erodes cooling efficiency over
    /// a ramp-in/peak/decay timeline.
    HeatWave,
    /// Spikes price and biases grid frequency low over a quiet/spike/decay
    /// timeline.
    PriceSpike,
}

/// The perturbation a scenario applies to site inputs at one instant, kept
/// separate from [`TelemetryPoint`] so the tick loop can fold it into
/// inputs (load, ambient) rather than outputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioEffect {
    pub load_delta_kw: f64,
    pub ambient_delta_c: f64,
    pub cooling_cop_scale: f64,
    pub price_multiplier: f64,
    pub freq_bias_hz: f64,
}

impl Default for ScenarioEffect {
    fn default() -> Self {
        Self {
            load_delta_kw: 0.0,
            ambient_delta_c: 0.0,
            cooling_cop_scale: 1.0,
            price_multiplier: 1.0,
            freq_bias_hz: 0.0,
        }
    }
}

impl ScenarioOverlay {
    /// Scenario duration, seconds of sim-time, after which it self-clears.
    pub fn duration_s(self) -> f64 {
        match self {
            ScenarioOverlay::HeatWave => 600.0,
            ScenarioOverlay::PriceSpike => 240.0,
        }
    }

    /// True once `elapsed_s` (already scaled by the scenario's `speed`)
    /// has passed the scenario's duration: the overlay should be cleared.
    pub fn is_expired(self, elapsed_s: f64) -> bool {
        elapsed_s >= self.duration_s()
    }

    /// Computes this overlay's effect bundle at `elapsed_s` of sim-time
    /// (already scaled by the scenario's `speed`). Phase boundaries and
    /// peak values follow the documented timeline table; effects are zero
    /// past `duration_s()`.
    pub fn effect(self, elapsed_s: f64) -> ScenarioEffect {
        match self {
            ScenarioOverlay::HeatWave => {
                if elapsed_s < 120.0 {
                    let ramp = (elapsed_s / 120.0).clamp(0.0, 1.0);
                    ScenarioEffect {
                        load_delta_kw: 800.0 * ramp,
                        ambient_delta_c: 10.0 * ramp,
                        cooling_cop_scale: 1.0 - 0.3 * ramp,
                        ..ScenarioEffect::default()
                    }
                } else if elapsed_s < 360.0 {
                    ScenarioEffect {
                        load_delta_kw: 800.0,
                        ambient_delta_c: 10.0,
                        cooling_cop_scale: 0.7,
                        freq_bias_hz: -0.03,
                        ..ScenarioEffect::default()
                    }
                } else if elapsed_s < 600.0 {
                    let decay = ((600.0 - elapsed_s) / 240.0).clamp(0.0, 1.0);
                    ScenarioEffect {
                        load_delta_kw: 800.0 * decay,
                        ambient_delta_c: 10.0 * decay,
                        cooling_cop_scale: 1.0 - 0.3 * decay,
                        ..ScenarioEffect::default()
                    }
                } else {
                    ScenarioEffect::default()
                }
            }
            ScenarioOverlay::PriceSpike => {
                if elapsed_s < 60.0 {
                    ScenarioEffect {
                        price_multiplier: 1.0,
                        ..ScenarioEffect::default()
                    }
                } else if elapsed_s < 180.0 {
                    ScenarioEffect {
                        load_delta_kw: 500.0,
                        price_multiplier: 6.0,
                        freq_bias_hz: -0.015,
                        ..ScenarioEffect::default()
                    }
                } else if elapsed_s < 240.0 {
                    ScenarioEffect {
                        load_delta_kw: 200.0,
                        price_multiplier: 3.0,
                        ..ScenarioEffect::default()
                    }
                } else {
                    ScenarioEffect::default()
                }
            }
        }
    }

    /// Applies this overlay's effect bundle to one telemetry sample,
    /// `elapsed_s` of sim-time after the overlay was armed. Overlays only
    /// perturb inputs; they never bypass safety gates downstream.
    pub fn apply(self, point: &mut TelemetryPoint, elapsed_s: f64) {
        let effect = self.effect(elapsed_s);
        point.p_it_kw += effect.load_delta_kw;
        point.total_load_kw += effect.load_delta_kw;
        point.rack_temp_c += effect.ambient_delta_c;
        point.price_per_kwh *= effect.price_multiplier;
        point.frequency_hz += effect.freq_bias_hz;
        if effect.cooling_cop_scale < 1.0 {
            point.grid_headroom_kw = (point.grid_headroom_kw - 1_500.0 * (1.0 - effect.cooling_cop_scale)).max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn base_point() -> TelemetryPoint {
        TelemetryPoint {
            ts: Utc::now(),
            frequency_hz: 60.0,
            rocof_hz_per_s: 0.0,
            stress_score: 0.0,
            p_it_kw: 18_000.0,
            p_site_kw: 20_000.0,
            total_load_kw: 20_000.0,
            cooling_kw: 2_000.0,
            safe_shift_kw: 1_200.0,
            grid_headroom_kw: 4_000.0,
            rack_temp_c: 38.0,
            carbon_intensity_g_co2_per_kwh: 350.0,
            price_per_kwh: 0.12,
            debug: None,
        }
    }

    #[test]
    fn approved_preset_matches_fixed_values() {
        let preset = DemoScenario::Approved.preset();
        assert_eq!(preset.delta_p_request_kw, 400.0);
        assert_eq!(preset.grid_headroom_kw, 5_000.0);
        assert_eq!(preset.thermal_state.t_c, 42.0);
    }

    #[test]
    fn grid_block_preset_has_zero_headroom() {
        let preset = DemoScenario::GridBlock.preset();
        assert_eq!(preset.grid_headroom_kw, 0.0);
    }

    #[test]
    fn thermal_block_preset_starts_near_limit() {
        let preset = DemoScenario::ThermalBlock.preset();
        assert!(preset.thermal_state.t_c > 49.0);
        assert!(preset.delta_p_request_kw < 0.0);
    }

    #[test]
    fn heat_wave_ramps_in_then_peaks_then_decays() {
        let ramp_in = ScenarioOverlay::HeatWave.effect(60.0);
        let peak = ScenarioOverlay::HeatWave.effect(240.0);
        let decay = ScenarioOverlay::HeatWave.effect(480.0);
        let cleared = ScenarioOverlay::HeatWave.effect(600.0);

        assert!(ramp_in.load_delta_kw > 0.0 && ramp_in.load_delta_kw < 800.0);
        assert_eq!(peak.load_delta_kw, 800.0);
        assert_eq!(peak.ambient_delta_c, 10.0);
        assert!((peak.cooling_cop_scale - 0.7).abs() < 1e-9);
        assert!((peak.freq_bias_hz - (-0.03)).abs() < 1e-9);
        assert!(decay.load_delta_kw > 0.0 && decay.load_delta_kw < 800.0);
        assert_eq!(cleared, ScenarioEffect::default());
    }

    #[test]
    fn heat_wave_overlay_applied_to_point_is_bounded() {
        let mut p1 = base_point();
        let mut p2 = base_point();
        ScenarioOverlay::HeatWave.apply(&mut p1, 100.0);
        ScenarioOverlay::HeatWave.apply(&mut p2, 240.0);
        assert!(p1.rack_temp_c < p2.rack_temp_c);
        assert!(p2.rack_temp_c <= 38.0 + 10.0 + 1e-9);
        assert!(p2.grid_headroom_kw >= 0.0);
    }

    #[test]
    fn price_spike_multiplies_by_six_during_spike_then_decays_to_three() {
        let quiet = ScenarioOverlay::PriceSpike.effect(30.0);
        let spike = ScenarioOverlay::PriceSpike.effect(120.0);
        let decay = ScenarioOverlay::PriceSpike.effect(200.0);
        let cleared = ScenarioOverlay::PriceSpike.effect(240.0);

        assert_eq!(quiet.price_multiplier, 1.0);
        assert_eq!(spike.price_multiplier, 6.0);
        assert!((spike.freq_bias_hz - (-0.015)).abs() < 1e-9);
        assert_eq!(decay.price_multiplier, 3.0);
        assert_eq!(cleared, ScenarioEffect::default());
    }

    #[test]
    fn price_spike_overlay_applied_multiplies_price() {
        let mut point = base_point();
        ScenarioOverlay::PriceSpike.apply(&mut point, 120.0);
        assert!((point.price_per_kwh - 0.12 * 6.0).abs() < 1e-9);
    }

    #[test]
    fn overlay_is_expired_past_duration() {
        assert!(!ScenarioOverlay::HeatWave.is_expired(599.0));
        assert!(ScenarioOverlay::HeatWave.is_expired(600.0));
        assert!(ScenarioOverlay::PriceSpike.is_expired(240.0));
    }

    #[test]
    fn reset_matches_demo_baseline() {
        let state = reset_thermal_state();
        assert_eq!(state.t_c, 42.0);
        assert_eq!(state.p_cool_kw, 800.0);
    }
}
