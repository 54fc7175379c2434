//! Physics tick loop (C5): one background task, one wall-clock second per
//! iteration, driven by a `tokio::select! { _ = interval.tick() => ... }`
//! loop that also watches a shutdown channel.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gridshift_core::scenario::ScenarioOverlay;
use gridshift_core::telemetry::{generate_series, TelemetryGenConfig};
use gridshift_core::thermal;
use rand::Rng;
use tokio::time;

use crate::state::AppState;

const TICK_PERIOD_S: u64 = 1;
const BASE_IT_LOAD_KW: f64 = 1000.0;
const IT_LOAD_JITTER_KW: f64 = 20.0;

/// Runs until `shutdown` resolves. Tolerates per-iteration failures: a
/// panic-free tick body means "log and continue" is the only failure mode
/// left to guard, matching the loop's cancellation-at-await-boundary
/// contract.
pub async fn run(state: Arc<AppState>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut interval = time::interval(Duration::from_secs(TICK_PERIOD_S));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                tick_once(&state).await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("tick loop shutting down");
                    break;
                }
            }
        }
    }
}

async fn tick_once(state: &Arc<AppState>) {
    // 1. synthesized IT load.
    let mut rng = rand::thread_rng();
    let mut p_it_kw = BASE_IT_LOAD_KW + rng.gen_range(-IT_LOAD_JITTER_KW..IT_LOAD_JITTER_KW);

    // 2. demo-scenario overlay: compute this instant's effect bundle, clear
    // the overlay once its sim-time duration has elapsed.
    let mut cfg = state.thermal_cfg;
    let mut price_multiplier = 1.0f64;
    let mut freq_bias_hz = 0.0f64;
    {
        let mut slot = state.active_overlay.lock().await;
        if let Some(active) = *slot {
            let elapsed_s = (Utc::now() - active.armed_at).num_milliseconds() as f64 / 1000.0;
            if active.overlay.is_expired(elapsed_s) {
                *slot = None;
            } else {
                let effect = active.overlay.effect(elapsed_s);
                p_it_kw += effect.load_delta_kw;
                cfg.t_ambient_c += effect.ambient_delta_c;
                cfg.cooling_cop *= effect.cooling_cop_scale;
                price_multiplier = effect.price_multiplier;
                freq_bias_hz = effect.freq_bias_hz;
            }
        }
    }

    // 3. step the thermal twin.
    let prediction = {
        let mut twin = state.thermal_state.lock().await;
        thermal::step(&cfg, &mut twin, p_it_kw, TICK_PERIOD_S as f64)
    };

    // 4/5. fresh telemetry snapshot, cached under the latest-telemetry slot.
    let carbon = state.carbon_source.sample(Utc::now());
    let headroom_kw = if state.predictor.ready() {
        state
            .predictor
            .predict(p_it_kw, 0.0)
            .map(|p| p.grid_headroom_kw)
            .unwrap_or(1500.0)
    } else {
        1500.0
    };

    let point = gridshift_core::telemetry::TelemetryPoint {
        ts: Utc::now(),
        frequency_hz: 60.0 + freq_bias_hz,
        rocof_hz_per_s: 0.0,
        stress_score: (1.0 - headroom_kw / 8_000.0).clamp(0.0, 1.0),
        p_it_kw,
        p_site_kw: p_it_kw,
        total_load_kw: p_it_kw + prediction.p_cool_kw_next,
        cooling_kw: prediction.p_cool_kw_next,
        safe_shift_kw: headroom_kw.min(1_200.0).max(0.0),
        grid_headroom_kw: headroom_kw,
        rack_temp_c: prediction.t_c_next,
        carbon_intensity_g_co2_per_kwh: carbon.carbon_intensity_g_co2_per_kwh,
        price_per_kwh: carbon.price_per_kwh * price_multiplier,
        debug: Some(gridshift_core::telemetry::TelemetryDebug {
            q_passive_kw: prediction.q_passive_kw,
            q_active_kw: prediction.q_active_kw,
            cooling_target_kw: prediction.cooling_target_kw,
            cop_used: prediction.cop_used,
        }),
    };

    {
        let mut slot = state.latest_telemetry.write().await;
        *slot = Some(point);
    }
    let _ = state.telemetry_tx.send(point);

    if let Err(e) = state.persistence.record_telemetry(&point) {
        tracing::warn!(error = %e, "persistence failed for telemetry point");
    }
}

/// Generates a lookback telemetry series anchored on the current cached
/// thermal state, used by `/telemetry/timeseries` for both live and replay
/// modes.
pub async fn lookback_series(state: &AppState, window_s: f64, deterministic: bool, seed_override: Option<u64>) -> Vec<gridshift_core::telemetry::TelemetryPoint> {
    const N_POINTS: usize = 60;
    let seed = if deterministic {
        seed_override.unwrap_or(state.config.demo_seed) + window_s as u64
    } else {
        (Utc::now().timestamp() / 60) as u64
    };
    let twin = *state.thermal_state.lock().await;
    let cfg = TelemetryGenConfig {
        seed,
        dt_s: (window_s / N_POINTS as f64).max(1.0),
        base_rack_temp_c: twin.t_c,
        base_cooling_kw: twin.p_cool_kw,
        t_max_c: state.thermal_cfg.t_max_c,
        ..TelemetryGenConfig::default()
    };
    let start = Utc::now() - chrono::Duration::seconds(window_s as i64);
    generate_series(&cfg, start, N_POINTS)
}
