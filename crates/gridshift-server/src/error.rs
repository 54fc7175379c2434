//! Maps domain errors onto HTTP responses. A domain-blocked decision is
//! never an error: only malformed input, missing demo-mode gating, and
//! absent cached state reach this module.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use gridshift_core::GridShiftError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn input_invalid(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: message.into(),
        }
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: message.into(),
        }
    }
}

impl From<GridShiftError> for ApiError {
    fn from(err: GridShiftError) -> Self {
        match err {
            GridShiftError::InputInvalid { message } => ApiError::input_invalid(message),
            GridShiftError::DependencyMissing { what } => ApiError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: format!("dependency unavailable: {what}"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}
