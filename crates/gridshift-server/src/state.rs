//! Shared live state behind the HTTP surface and the tick loop.
//!
//! Rust's `axum`/`tokio` runtime is multi-threaded by default, unlike the
//! single-threaded cooperative scheduler this design otherwise assumes, so
//! every mutable slot here is behind a `tokio::sync` lock: mirroring the
//! teacher's `Arc<RwLock<ApiState>>` wiring in its own API layer.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use gridshift_core::contracts::{CarbonSource, HeadroomPredictor, PersistenceSink};
use gridshift_core::decision::DecisionRecord;
use gridshift_core::scenario::ScenarioOverlay;
use gridshift_core::telemetry::TelemetryPoint;
use gridshift_core::thermal::{ThermalConfig, ThermalState};
use gridshift_core::topology::Topology;
use gridshift_core::trace::TraceRing;
use gridshift_core::aging::BatteryAgingConfig;
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::config::ServerConfig;

pub const MAX_RECENT_DECISIONS: usize = 500;

/// An armed demo overlay plus when it was armed, so effects can be
/// computed as a function of elapsed sim-time.
#[derive(Debug, Clone, Copy)]
pub struct ActiveOverlay {
    pub overlay: ScenarioOverlay,
    pub armed_at: chrono::DateTime<chrono::Utc>,
}

pub struct AppState {
    pub config: ServerConfig,
    pub thermal_cfg: ThermalConfig,
    pub aging_cfg: BatteryAgingConfig,
    pub thermal_state: Mutex<ThermalState>,
    pub trace_ring: Mutex<TraceRing>,
    pub recent_decisions: Mutex<VecDeque<DecisionRecord>>,
    pub latest_telemetry: RwLock<Option<TelemetryPoint>>,
    pub active_overlay: Mutex<Option<ActiveOverlay>>,
    pub topology: Topology,
    pub predictor: Arc<dyn HeadroomPredictor>,
    pub carbon_source: Arc<dyn CarbonSource>,
    pub persistence: Arc<dyn PersistenceSink>,
    pub telemetry_tx: broadcast::Sender<TelemetryPoint>,
    pub explain_gate: Mutex<Instant>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        predictor: Arc<dyn HeadroomPredictor>,
        carbon_source: Arc<dyn CarbonSource>,
        persistence: Arc<dyn PersistenceSink>,
        topology: Topology,
    ) -> Self {
        let (telemetry_tx, _) = broadcast::channel(64);
        Self {
            config,
            thermal_cfg: ThermalConfig::default(),
            aging_cfg: BatteryAgingConfig::default(),
            thermal_state: Mutex::new(ThermalState::default()),
            trace_ring: Mutex::new(TraceRing::default()),
            recent_decisions: Mutex::new(VecDeque::new()),
            latest_telemetry: RwLock::new(None),
            active_overlay: Mutex::new(None),
            topology,
            predictor,
            carbon_source,
            persistence,
            telemetry_tx,
            explain_gate: Mutex::new(Instant::now() - std::time::Duration::from_secs(10)),
        }
    }
}
