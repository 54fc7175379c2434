//! HTTP/SSE/WS surface. Router assembly and handler style grounded on the
//! teacher's `axum::Router` + `CorsLayer::new().allow_origin(...)` shape in
//! its own API module, generalized from a handful of daemon-control routes
//! to this domain's decision/telemetry/trace/grid surface.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use futures::stream::Stream;
use futures::StreamExt;
use gridshift_core::decision::DecisionRecord;
use gridshift_core::scenario::{reset_thermal_state, DemoScenario, ScenarioOverlay};
use gridshift_core::trace::rollup;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::error::ApiError;
use crate::explain::explain_decision;
use crate::orchestrator::{self, DecisionRequest};
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = if state.config.allowed_origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<_> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/health", get(health))
        .route("/decision/latest", get(decision_latest))
        .route("/decision/recent", get(decision_recent))
        .route("/telemetry/timeseries", get(telemetry_timeseries))
        .route("/telemetry/latest", get(telemetry_latest))
        .route("/telemetry/stream", get(telemetry_stream))
        .route("/ws/telemetry", get(ws_telemetry))
        .route("/trace/latest", get(trace_latest))
        .route("/kpi/summary", get(kpi_summary))
        .route("/grid/topology", get(grid_topology))
        .route("/grid/predict", get(grid_predict))
        .route("/grid/gnn/health", get(grid_gnn_health))
        .route("/explain/decision", post(explain_decision_handler))
        .route("/demo/scenario/:name", post(demo_scenario))
        .route("/demo/reset", post(demo_reset))
        .route("/demo/logs/tail", get(demo_logs_tail))
        .layer(axum::middleware::from_fn(crate::middleware::access_log))
        .layer(cors)
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    ts: chrono::DateTime<Utc>,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        ts: Utc::now(),
    })
}

fn clamp_usize(value: usize, lo: usize, hi: usize) -> usize {
    value.max(lo).min(hi)
}

fn clamp_f64(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

// ---- /decision/latest ----

fn default_horizon_s() -> f64 {
    30.0
}
fn default_dt_s() -> f64 {
    1.0
}
fn default_ramp_rate() -> f64 {
    50.0
}

#[derive(Deserialize)]
struct DecisionLatestQuery {
    #[serde(rename = "deltaP_request_kw")]
    delta_p_request_kw: f64,
    #[serde(rename = "P_site_kw")]
    p_site_kw: f64,
    grid_headroom_kw: Option<f64>,
    #[serde(default = "default_horizon_s")]
    horizon_s: f64,
    #[serde(default = "default_dt_s")]
    dt_s: f64,
    #[serde(default = "default_ramp_rate")]
    ramp_rate_kw_per_s: f64,
}

async fn decision_latest(
    State(state): State<Arc<AppState>>,
    Query(q): Query<DecisionLatestQuery>,
) -> Result<Json<DecisionRecord>, ApiError> {
    if !(-5000.0..=5000.0).contains(&q.delta_p_request_kw) {
        return Err(ApiError::input_invalid("deltaP_request_kw out of range [-5000, 5000]"));
    }
    if !(0.0..=100_000.0).contains(&q.p_site_kw) {
        return Err(ApiError::input_invalid("P_site_kw out of range [0, 100000]"));
    }

    let record = orchestrator::decide(
        &state,
        DecisionRequest {
            delta_p_request_kw: q.delta_p_request_kw,
            p_site_kw: q.p_site_kw,
            grid_headroom_kw: q.grid_headroom_kw,
            horizon_s: q.horizon_s,
            dt_s: q.dt_s,
            ramp_rate_kw_per_s: q.ramp_rate_kw_per_s,
        },
    )
    .await?;

    Ok(Json(record))
}

// ---- /decision/recent ----

#[derive(Deserialize)]
struct DecisionRecentQuery {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    coalesce: bool,
    #[serde(default)]
    window_s: Option<i64>,
}

#[derive(Serialize)]
struct CoalescedDecision {
    #[serde(flatten)]
    record: DecisionRecord,
    count: usize,
}

async fn decision_recent(
    State(state): State<Arc<AppState>>,
    Query(q): Query<DecisionRecentQuery>,
) -> Json<Vec<serde_json::Value>> {
    let limit = clamp_usize(q.limit.unwrap_or(50), 1, 200);
    let window_s = q.window_s.unwrap_or(60).clamp(10, 600);

    let recent = state.recent_decisions.lock().await;
    let tail: Vec<DecisionRecord> = recent.iter().rev().take(limit).rev().cloned().collect();

    if !q.coalesce {
        let values = tail.into_iter().filter_map(|r| serde_json::to_value(r).ok()).collect();
        return Json(values);
    }

    let mut coalesced: Vec<CoalescedDecision> = Vec::new();
    for record in tail {
        if !record.blocked {
            coalesced.push(CoalescedDecision { record, count: 1 });
            continue;
        }
        if let Some(last) = coalesced.last_mut() {
            let within_window = (record.ts - last.record.ts).num_seconds().abs() <= window_s;
            let same_reason = last.record.blocked
                && last.record.reason == record.reason
                && last.record.primary_constraint == record.primary_constraint
                && (last.record.requested_delta_p_kw - record.requested_delta_p_kw).abs() < 1e-6;
            if within_window && same_reason {
                last.count += 1;
                last.record.ts = record.ts;
                continue;
            }
        }
        coalesced.push(CoalescedDecision { record, count: 1 });
    }

    let values = coalesced.into_iter().filter_map(|c| serde_json::to_value(c).ok()).collect();
    Json(values)
}

// ---- /telemetry/* ----

#[derive(Deserialize)]
struct TimeseriesQuery {
    #[serde(default)]
    window_s: Option<f64>,
    #[serde(default)]
    end_ts: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    mode: Option<String>,
}

async fn telemetry_timeseries(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TimeseriesQuery>,
) -> Json<Vec<gridshift_core::telemetry::TelemetryPoint>> {
    let window_s = clamp_f64(q.window_s.unwrap_or(3600.0), 60.0, 86_400.0);
    let replay = q.mode.as_deref() == Some("replay");
    let deterministic = replay || state.config.demo_deterministic;
    let seed_override = q.end_ts.map(|ts| (ts.timestamp() as u64) ^ state.config.demo_seed);

    let mut series = crate::tick::lookback_series(&state, window_s, deterministic, seed_override).await;
    if series.len() > 240 {
        let stride = (series.len() as f64 / 240.0).ceil() as usize;
        series = series.into_iter().step_by(stride.max(1)).collect();
    }
    Json(series)
}

async fn telemetry_latest(
    State(state): State<Arc<AppState>>,
) -> Result<Json<gridshift_core::telemetry::TelemetryPoint>, ApiError> {
    let slot = state.latest_telemetry.read().await;
    slot.map(Json).ok_or_else(|| ApiError::service_unavailable("no telemetry cached yet"))
}

async fn telemetry_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.telemetry_tx.subscribe();
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(|item| async move {
        let point = item.ok()?;
        serde_json::to_string(&point).ok().map(|json| Ok(Event::default().data(json)))
    });
    Sse::new(stream)
}

async fn ws_telemetry(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_telemetry_loop(socket, state))
}

async fn ws_telemetry_loop(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.telemetry_tx.subscribe();
    loop {
        tokio::select! {
            point = rx.recv() => {
                match point {
                    Ok(point) => {
                        let Ok(json) = serde_json::to_string(&point) else { continue };
                        if socket.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            msg = socket.recv() => {
                if msg.is_none() {
                    break;
                }
            }
        }
    }
}

// ---- /trace/latest ----

#[derive(Deserialize)]
struct TraceLatestQuery {
    #[serde(default)]
    limit: Option<usize>,
}

async fn trace_latest(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TraceLatestQuery>,
) -> Json<Vec<gridshift_core::planner::TraceEvent>> {
    let limit = clamp_usize(q.limit.unwrap_or(50), 1, 200);
    let ring = state.trace_ring.lock().await;
    Json(ring.recent(limit))
}

// ---- /kpi/summary ----

#[derive(Deserialize)]
struct KpiSummaryQuery {
    #[serde(default)]
    window_s: Option<i64>,
}

async fn kpi_summary(
    State(state): State<Arc<AppState>>,
    Query(q): Query<KpiSummaryQuery>,
) -> Json<gridshift_core::trace::KpiSummary> {
    let window_s = q.window_s.unwrap_or(300).clamp(60, 3600);
    let now = Utc::now();
    let ring = state.trace_ring.lock().await;
    Json(rollup(&ring.all(), window_s, now))
}

// ---- /grid/* ----

async fn grid_topology(State(state): State<Arc<AppState>>) -> Json<gridshift_core::topology::Topology> {
    Json(state.topology.clone())
}

#[derive(Deserialize)]
struct GridPredictQuery {
    node_id: u32,
}

#[derive(Serialize)]
struct GridPredictResponse {
    node_id: u32,
    safe_shift_kw: f64,
    confidence: f64,
    reason_code: &'static str,
}

async fn grid_predict(
    State(state): State<Arc<AppState>>,
    Query(q): Query<GridPredictQuery>,
) -> Result<Json<GridPredictResponse>, ApiError> {
    if !(1..=33).contains(&q.node_id) {
        return Err(ApiError::input_invalid("node_id out of range [1, 33]"));
    }

    let (safe_shift_kw, confidence, reason_code) = if state.predictor.ready() {
        match state.predictor.predict(20_000.0, 0.0) {
            Ok(pred) => (pred.grid_headroom_kw, pred.confidence, "GNN"),
            Err(_) if state.config.topology_fallback => (1200.0, 0.5, "FALLBACK"),
            Err(e) => return Err(e.into()),
        }
    } else if state.config.topology_fallback {
        (1200.0, 0.5, "FALLBACK")
    } else {
        return Err(ApiError::service_unavailable("predictor not ready and fallback disabled"));
    };

    Ok(Json(GridPredictResponse {
        node_id: q.node_id,
        safe_shift_kw,
        confidence,
        reason_code,
    }))
}

#[derive(Serialize)]
struct GnnHealthResponse {
    ready: bool,
    fallback_headroom_kw: Option<f64>,
}

/// Probes whether the headroom predictor is available, for callers that
/// want to distinguish a `GNN` source from a silently-active `FALLBACK`.
async fn grid_gnn_health(State(state): State<Arc<AppState>>) -> Json<GnnHealthResponse> {
    let ready = state.predictor.ready();
    Json(GnnHealthResponse {
        ready,
        fallback_headroom_kw: if ready { None } else { Some(1500.0) },
    })
}

// ---- /explain/decision ----

#[derive(Deserialize)]
struct ExplainRequest {
    decision: DecisionRecord,
}

#[derive(Serialize)]
struct ExplainResponse {
    markdown: String,
}

async fn explain_decision_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExplainRequest>,
) -> Result<Json<ExplainResponse>, ApiError> {
    if !state.config.explainer_enabled {
        return Err(ApiError::service_unavailable("explainer disabled"));
    }
    let mut gate = state.explain_gate.lock().await;
    let elapsed = gate.elapsed();
    if elapsed < Duration::from_millis(1500) {
        return Err(ApiError::too_many_requests("rate-limited to one call per 1.5s"));
    }
    *gate = Instant::now();
    drop(gate);

    Ok(Json(ExplainResponse {
        markdown: explain_decision(&body.decision),
    }))
}

// ---- /demo/* ----

fn require_demo_mode(state: &AppState) -> Result<(), ApiError> {
    if state.config.demo_mode {
        Ok(())
    } else {
        Err(ApiError::not_found("demo mode disabled"))
    }
}

async fn demo_scenario(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_demo_mode(&state)?;

    match name.as_str() {
        "approved" | "grid_block" | "thermal_block" => {
            let preset = match name.as_str() {
                "approved" => DemoScenario::Approved,
                "grid_block" => DemoScenario::GridBlock,
                _ => DemoScenario::ThermalBlock,
            }
            .preset();
            {
                let mut live = state.thermal_state.lock().await;
                *live = preset.thermal_state;
            }
            let record = orchestrator::decide(
                &state,
                DecisionRequest {
                    delta_p_request_kw: preset.delta_p_request_kw,
                    p_site_kw: preset.p_site_kw,
                    grid_headroom_kw: Some(preset.grid_headroom_kw),
                    horizon_s: preset.horizon_s,
                    dt_s: preset.dt_s,
                    ramp_rate_kw_per_s: preset.ramp_rate_kw_per_s,
                },
            )
            .await?;
            Ok(Json(serde_json::to_value(record).unwrap_or_default()))
        }
        "heat_wave" => {
            orchestrator::arm_overlay(&state, ScenarioOverlay::HeatWave).await;
            Ok(Json(serde_json::json!({"armed": "heat_wave"})))
        }
        "price_spike" => {
            orchestrator::arm_overlay(&state, ScenarioOverlay::PriceSpike).await;
            Ok(Json(serde_json::json!({"armed": "price_spike"})))
        }
        other => Err(ApiError::not_found(format!("unknown scenario '{other}'"))),
    }
}

async fn demo_reset(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    require_demo_mode(&state)?;
    {
        let mut live = state.thermal_state.lock().await;
        *live = reset_thermal_state();
    }
    orchestrator::clear_overlay(&state).await;
    Ok(Json(serde_json::json!({"reset": true})))
}

async fn demo_logs_tail(State(state): State<Arc<AppState>>) -> Result<Json<Vec<gridshift_core::planner::TraceEvent>>, ApiError> {
    require_demo_mode(&state)?;
    let ring = state.trace_ring.lock().await;
    Ok(Json(ring.recent(50)))
}
