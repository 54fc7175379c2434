//! File-backed append-only persistence sink: decisions and telemetry points
//! are each appended as one JSON object per line rather than rewritten as a
//! whole-file snapshot, so a crash mid-write only costs the last record.

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use gridshift_core::contracts::PersistenceSink;
use gridshift_core::telemetry::TelemetryPoint;
use gridshift_core::GridShiftError;

pub struct JsonlPersistenceSink {
    decisions_path: Mutex<std::path::PathBuf>,
    telemetry_path: Mutex<std::path::PathBuf>,
}

impl JsonlPersistenceSink {
    pub fn new(database_url: Option<&str>) -> Self {
        let base = database_url.unwrap_or("./gridshift-data");
        let _ = std::fs::create_dir_all(base);
        Self {
            decisions_path: Mutex::new(std::path::Path::new(base).join("decisions.jsonl")),
            telemetry_path: Mutex::new(std::path::Path::new(base).join("telemetry.jsonl")),
        }
    }

    fn append_line(path: &std::path::Path, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)
    }
}

impl PersistenceSink for JsonlPersistenceSink {
    fn record_decision(&self, decision_json: &str) -> Result<(), GridShiftError> {
        let path = self.decisions_path.lock().unwrap();
        Self::append_line(&path, decision_json)
            .map_err(|e| GridShiftError::dependency_missing(format!("decision log write failed: {e}")))
    }

    fn record_telemetry(&self, point: &TelemetryPoint) -> Result<(), GridShiftError> {
        let json = serde_json::to_string(point)
            .map_err(|e| GridShiftError::dependency_missing(format!("telemetry serialize failed: {e}")))?;
        let path = self.telemetry_path.lock().unwrap();
        Self::append_line(&path, &json)
            .map_err(|e| GridShiftError::dependency_missing(format!("telemetry log write failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn record_decision_appends_without_error() {
        let dir = std::env::temp_dir().join(format!("gridshift-test-{}", uuid::Uuid::new_v4()));
        let sink = JsonlPersistenceSink::new(Some(dir.to_str().unwrap()));
        assert!(sink.record_decision("{\"ok\":true}").is_ok());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn record_telemetry_appends_without_error() {
        let dir = std::env::temp_dir().join(format!("gridshift-test-{}", uuid::Uuid::new_v4()));
        let sink = JsonlPersistenceSink::new(Some(dir.to_str().unwrap()));
        let point = TelemetryPoint {
            ts: Utc::now(),
            frequency_hz: 60.0,
            rocof_hz_per_s: 0.0,
            stress_score: 0.0,
            p_it_kw: 1.0,
            p_site_kw: 1.0,
            total_load_kw: 1.0,
            cooling_kw: 0.0,
            safe_shift_kw: 1.0,
            grid_headroom_kw: 1.0,
            rack_temp_c: 1.0,
            carbon_intensity_g_co2_per_kwh: 1.0,
            price_per_kwh: 1.0,
            debug: None,
        };
        assert!(sink.record_telemetry(&point).is_ok());
        let _ = std::fs::remove_dir_all(dir);
    }
}
