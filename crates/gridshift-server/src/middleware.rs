//! Request-ID tagging and structured JSON access logging, grounded on the
//! teacher's `tracing::info!` structured-field style and generalized to a
//! `tower` middleware layer.

use std::time::Instant;

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn access_log(mut request: Request, next: Next) -> Response {
    let req_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    request
        .headers_mut()
        .insert(REQUEST_ID_HEADER, HeaderValue::from_str(&req_id).unwrap());

    let mut response = next.run(request).await;
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    let status = response.status().as_u16();

    tracing::info!(
        evt = "api_req",
        req_id = %req_id,
        method = %method,
        path = %path,
        status = status,
        latency_ms = latency_ms,
        "handled request"
    );

    if let Ok(value) = HeaderValue::from_str(&req_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}
