//! Narrow trait boundaries toward collaborators intentionally kept out of
//! this crate's scope: a learned headroom predictor, external carbon/price
//! signals, durable persistence, and topology extraction. Each trait is
//! small enough that a stub adapter satisfies it trivially, and a real
//! implementation can be swapped in without touching the planner.

use chrono::{DateTime, Utc};

use crate::error::GridShiftError;
use crate::telemetry::TelemetryPoint;
use crate::topology::GridPrediction;

/// A model (e.g. a graph neural net) that can refine the grid-headroom
/// estimate used by the planner. `ready()` must be cheap and side-effect
/// free so callers can poll it every tick without cost.
pub trait HeadroomPredictor: Send + Sync {
    fn ready(&self) -> bool;
    fn predict(&self, p_site_kw: f64, requested_delta_p_kw: f64) -> Result<GridPrediction, GridShiftError>;
}

/// Always-ready predictor that passes the engineering headroom estimate
/// through unchanged. The default when no learned predictor is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughHeadroomPredictor {
    pub grid_headroom_kw: f64,
}

impl HeadroomPredictor for PassthroughHeadroomPredictor {
    fn ready(&self) -> bool {
        true
    }

    fn predict(&self, _p_site_kw: f64, _requested_delta_p_kw: f64) -> Result<GridPrediction, GridShiftError> {
        Ok(GridPrediction {
            grid_headroom_kw: self.grid_headroom_kw,
            confidence: 1.0,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarbonPriceSample {
    pub ts: DateTime<Utc>,
    pub carbon_intensity_g_co2_per_kwh: f64,
    pub price_per_kwh: f64,
}

/// External carbon-intensity / electricity-price feed. A deterministic
/// seeded source is used by default so replay runs stay reproducible.
pub trait CarbonSource: Send + Sync {
    fn sample(&self, at: DateTime<Utc>) -> CarbonPriceSample;
}

#[derive(Debug, Clone, Copy)]
pub struct SeededCarbonSource {
    pub base_carbon: f64,
    pub base_price: f64,
}

impl Default for SeededCarbonSource {
    fn default() -> Self {
        Self {
            base_carbon: 350.0,
            base_price: 0.12,
        }
    }
}

impl CarbonSource for SeededCarbonSource {
    fn sample(&self, at: DateTime<Utc>) -> CarbonPriceSample {
        // Deterministic function of the timestamp, not wall-clock RNG, so
        // replays against recorded decisions reproduce the same signal.
        let minute_of_day = (at.timestamp() / 60) % 1440;
        let phase = (minute_of_day as f64 / 1440.0) * std::f64::consts::TAU;
        CarbonPriceSample {
            ts: at,
            carbon_intensity_g_co2_per_kwh: self.base_carbon + 80.0 * phase.sin(),
            price_per_kwh: self.base_price + 0.05 * (phase * 2.0).sin(),
        }
    }
}

/// Durable append-only sink for decision records and telemetry points. The
/// server owns the concrete file-backed implementation; this crate only
/// depends on the trait.
pub trait PersistenceSink: Send + Sync {
    fn record_decision(&self, decision_json: &str) -> Result<(), GridShiftError>;
    fn record_telemetry(&self, point: &TelemetryPoint) -> Result<(), GridShiftError>;
}

/// No-op sink, useful for tests and for running without durable storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPersistenceSink;

impl PersistenceSink for NullPersistenceSink {
    fn record_decision(&self, _decision_json: &str) -> Result<(), GridShiftError> {
        Ok(())
    }

    fn record_telemetry(&self, _point: &TelemetryPoint) -> Result<(), GridShiftError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_predictor_is_always_ready() {
        let predictor = PassthroughHeadroomPredictor {
            grid_headroom_kw: 2000.0,
        };
        assert!(predictor.ready());
        let pred = predictor.predict(10_000.0, 500.0).unwrap();
        assert_eq!(pred.grid_headroom_kw, 2000.0);
    }

    #[test]
    fn seeded_carbon_source_is_deterministic() {
        let source = SeededCarbonSource::default();
        let at = Utc::now();
        let a = source.sample(at);
        let b = source.sample(at);
        assert_eq!(a.carbon_intensity_g_co2_per_kwh, b.carbon_intensity_g_co2_per_kwh);
        assert_eq!(a.price_per_kwh, b.price_per_kwh);
    }

    #[test]
    fn null_sink_never_errors() {
        let sink = NullPersistenceSink;
        assert!(sink.record_decision("{}").is_ok());
    }
}
