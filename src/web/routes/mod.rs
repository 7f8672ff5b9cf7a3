pub mod daemon;
pub mod monitoring;
pub mod targets;

use crate::error::SyncError;
use crate::supervisor::ControlResponse;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// A supervisor failure rendered as `500 {"success": false, "message": ...}`.
pub struct ApiError(SyncError);

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!("request failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ControlResponse::failed(self.0.to_string())),
        )
            .into_response()
    }
}

impl IntoResponse for ControlResponse {
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(self)).into_response()
    }
}

pub fn not_found(message: impl Into<String>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ControlResponse::failed(message)),
    )
        .into_response()
}
