use super::not_found;
use crate::supervisor::{ControlAction, StatusReport, Supervisor};
use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use std::str::FromStr;
use std::sync::Arc;

pub async fn status(State(supervisor): State<Arc<Supervisor>>) -> Json<StatusReport> {
    Json(supervisor.status())
}

pub async fn control(
    State(supervisor): State<Arc<Supervisor>>,
    Path(action): Path<String>,
) -> Response {
    match ControlAction::from_str(&action) {
        Ok(action) => supervisor.control(action).await.into_response(),
        Err(_) => not_found(format!("unknown daemon action: {action}")),
    }
}
