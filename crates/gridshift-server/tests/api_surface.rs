use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use gridshift_core::contracts::{NullPersistenceSink, PassthroughHeadroomPredictor, SeededCarbonSource};
use gridshift_core::topology::Topology;
use tower::ServiceExt;

#[path = "../src/api.rs"]
mod api;
#[path = "../src/config.rs"]
mod config;
#[path = "../src/error.rs"]
mod error;
#[path = "../src/explain.rs"]
mod explain;
#[path = "../src/middleware.rs"]
mod middleware;
#[path = "../src/orchestrator.rs"]
mod orchestrator;
#[path = "../src/state.rs"]
mod state;
#[path = "../src/tick.rs"]
mod tick;

fn router_with_config(cfg: config::ServerConfig) -> axum::Router {
    let state = Arc::new(state::AppState::new(
        cfg,
        Arc::new(PassthroughHeadroomPredictor { grid_headroom_kw: 5_000.0 }),
        Arc::new(SeededCarbonSource::default()),
        Arc::new(NullPersistenceSink),
        Topology::default(),
    ));
    api::build_router(state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_returns_ok_status() {
    let app = router_with_config(config::ServerConfig::default());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn decision_latest_rejects_out_of_range_request() {
    let app = router_with_config(config::ServerConfig::default());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/decision/latest?deltaP_request_kw=999999&P_site_kw=20000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn decision_latest_approves_a_reasonable_request() {
    let app = router_with_config(config::ServerConfig::default());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/decision/latest?deltaP_request_kw=400&P_site_kw=20000&grid_headroom_kw=5000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["blocked"], false);
}

#[tokio::test]
async fn kpi_summary_is_zeroed_with_no_history() {
    let app = router_with_config(config::ServerConfig::default());
    let response = app
        .oneshot(Request::builder().uri("/kpi/summary").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["blocked_rate_pct"], 0.0);
    assert_eq!(body["jobs_on_time_pct"], 100.0);
    assert_eq!(body["total_recent"], 0);
}

#[tokio::test]
async fn demo_routes_are_404_when_demo_mode_is_off() {
    let app = router_with_config(config::ServerConfig::default());
    let response = app
        .oneshot(Request::builder().uri("/demo/reset").method("POST").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn demo_scenario_is_reachable_when_demo_mode_is_on() {
    let mut cfg = config::ServerConfig::default();
    cfg.demo_mode = true;
    let app = router_with_config(cfg);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/demo/scenario/grid_block")
                .method("POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["blocked"], true);
}

#[tokio::test]
async fn gnn_health_reports_predictor_readiness() {
    let app = router_with_config(config::ServerConfig::default());
    let response = app
        .oneshot(Request::builder().uri("/grid/gnn/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ready"], true);
}

#[tokio::test]
async fn grid_predict_rejects_node_id_out_of_range() {
    let app = router_with_config(config::ServerConfig::default());
    let response = app
        .oneshot(Request::builder().uri("/grid/predict?node_id=9000").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
