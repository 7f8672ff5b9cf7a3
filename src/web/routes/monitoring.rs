use super::not_found;
use crate::supervisor::{MonitorStatus, Supervisor};
use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

pub async fn status(State(supervisor): State<Arc<Supervisor>>) -> Json<MonitorStatus> {
    Json(supervisor.monitor_status())
}

pub async fn control(
    State(supervisor): State<Arc<Supervisor>>,
    Path(action): Path<String>,
) -> Response {
    match action.as_str() {
        "start" => supervisor.control_monitoring(true).await.into_response(),
        "stop" => supervisor.control_monitoring(false).await.into_response(),
        other => not_found(format!("unknown monitoring action: {other}")),
    }
}
