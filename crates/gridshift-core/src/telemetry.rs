//! Seeded synthetic telemetry series generator (C7).
//!
//! Produces deterministic, reproducible time series for demo and replay
//! modes: same `(seed, n_points)` always yields the same series, mirroring
//! the workspace's other seeded-RNG generators.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPoint {
    pub ts: DateTime<Utc>,
    pub frequency_hz: f64,
    pub rocof_hz_per_s: f64,
    /// Composite grid-stress indicator in `[0, 1]`.
    pub stress_score: f64,
    pub p_it_kw: f64,
    pub p_site_kw: f64,
    /// Total site load, IT plus cooling, kW.
    pub total_load_kw: f64,
    pub cooling_kw: f64,
    pub safe_shift_kw: f64,
    pub grid_headroom_kw: f64,
    pub rack_temp_c: f64,
    pub carbon_intensity_g_co2_per_kwh: f64,
    pub price_per_kwh: f64,
    pub debug: Option<TelemetryDebug>,
}

/// Optional thermal debug terms, mirroring [`crate::thermal::Prediction`]'s
/// own debug fields so a caller can plot one against the other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryDebug {
    pub q_passive_kw: f64,
    pub q_active_kw: f64,
    pub cooling_target_kw: f64,
    pub cop_used: f64,
}

const GRID_NOMINAL_HZ: f64 = 60.0;
const DIP_START_IDX: usize = 25;
const DIP_END_IDX: usize = 35;
const DIP_FREQ_DROP_HZ: f64 = 0.15;
const DIP_STRESS_SCORE: f64 = 0.85;
const SAFE_SHIFT_DEFAULT_KW: f64 = 1200.0;
const SAFE_SHIFT_NEAR_TMAX_KW: f64 = 800.0;
const SAFE_SHIFT_DIP_CAP_KW: f64 = 900.0;
const NEAR_TMAX_MARGIN_C: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryGenConfig {
    pub seed: u64,
    pub dt_s: f64,
    pub base_p_it_kw: f64,
    pub base_p_site_kw: f64,
    pub base_grid_headroom_kw: f64,
    pub base_rack_temp_c: f64,
    pub t_max_c: f64,
    pub base_cooling_kw: f64,
    pub base_carbon_intensity: f64,
    pub base_price_per_kwh: f64,
    pub include_debug: bool,
}

impl Default for TelemetryGenConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            dt_s: 1.0,
            base_p_it_kw: 18_000.0,
            base_p_site_kw: 20_000.0,
            base_grid_headroom_kw: 4_000.0,
            base_rack_temp_c: 38.0,
            t_max_c: 50.0,
            base_cooling_kw: 2_000.0,
            base_carbon_intensity: 350.0,
            base_price_per_kwh: 0.12,
            include_debug: false,
        }
    }
}

/// Generates `n_points` seeded samples starting at `start`. Pure with
/// respect to its inputs: the same config and `start` always produce an
/// identical series, byte for byte.
///
/// Indices `25..35` are a deterministic grid-event "dip": frequency sags by
/// `DIP_FREQ_DROP_HZ` and stress jumps to `DIP_STRESS_SCORE`, regardless of
/// the random walk, so replay and demo modes always show the same event at
/// the same point in the series.
pub fn generate_series(cfg: &TelemetryGenConfig, start: DateTime<Utc>, n_points: usize) -> Vec<TelemetryPoint> {
    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
    let mut points = Vec::with_capacity(n_points);

    let mut p_it = cfg.base_p_it_kw;
    let mut headroom = cfg.base_grid_headroom_kw;
    let mut temp = cfg.base_rack_temp_c;
    let mut cooling = cfg.base_cooling_kw;
    let mut carbon = cfg.base_carbon_intensity;
    let mut price = cfg.base_price_per_kwh;
    let mut frequency = GRID_NOMINAL_HZ;
    let mut prev_frequency = GRID_NOMINAL_HZ;

    for i in 0..n_points {
        let ts = start + ChronoDuration::milliseconds((i as f64 * cfg.dt_s * 1000.0) as i64);
        let in_dip = i >= DIP_START_IDX && i < DIP_END_IDX;

        p_it += rng.gen_range(-150.0..150.0);
        p_it = p_it.clamp(cfg.base_p_it_kw * 0.5, cfg.base_p_it_kw * 1.5);

        headroom += rng.gen_range(-200.0..200.0);
        headroom = headroom.clamp(0.0, cfg.base_grid_headroom_kw * 2.0);

        temp += rng.gen_range(-0.3..0.3);
        temp = temp.clamp(cfg.base_rack_temp_c - 5.0, cfg.base_rack_temp_c + 10.0);

        cooling += rng.gen_range(-40.0..40.0);
        cooling = cooling.clamp(cfg.base_cooling_kw * 0.5, cfg.base_cooling_kw * 1.5);

        carbon += rng.gen_range(-10.0..10.0);
        carbon = carbon.clamp(50.0, 900.0);

        price += rng.gen_range(-0.01..0.01);
        price = price.clamp(0.02, 1.0);

        prev_frequency = frequency;
        frequency = GRID_NOMINAL_HZ + rng.gen_range(-0.02..0.02);
        if in_dip {
            frequency -= DIP_FREQ_DROP_HZ;
        }
        let rocof_hz_per_s = (frequency - prev_frequency) / cfg.dt_s.max(1e-6);

        let stress_score = if in_dip {
            DIP_STRESS_SCORE
        } else {
            (1.0 - headroom / (cfg.base_grid_headroom_kw * 2.0).max(1e-6)).clamp(0.0, 1.0)
        };

        let near_tmax = cfg.t_max_c - temp < NEAR_TMAX_MARGIN_C;
        let safe_shift_kw = if in_dip {
            SAFE_SHIFT_DIP_CAP_KW.min(headroom.max(0.0))
        } else if near_tmax {
            SAFE_SHIFT_NEAR_TMAX_KW.min(headroom.max(0.0))
        } else {
            SAFE_SHIFT_DEFAULT_KW.min(headroom.max(0.0))
        };

        let debug = cfg.include_debug.then_some(TelemetryDebug {
            q_passive_kw: 0.0,
            q_active_kw: cooling,
            cooling_target_kw: cooling,
            cop_used: 1.0,
        });

        points.push(TelemetryPoint {
            ts,
            frequency_hz: frequency,
            rocof_hz_per_s,
            stress_score,
            p_it_kw: p_it,
            p_site_kw: cfg.base_p_site_kw,
            total_load_kw: p_it + cooling,
            cooling_kw: cooling,
            safe_shift_kw,
            grid_headroom_kw: headroom,
            rack_temp_c: temp,
            carbon_intensity_g_co2_per_kwh: carbon,
            price_per_kwh: price,
            debug,
        });
    }

    points
}
