use super::{ApiError, not_found};
use crate::supervisor::Supervisor;
use crate::target::Target;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

pub async fn list(
    State(supervisor): State<Arc<Supervisor>>,
) -> Result<Json<Vec<Target>>, ApiError> {
    Ok(Json(supervisor.targets().await?))
}

pub async fn by_tenant(
    State(supervisor): State<Arc<Supervisor>>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Vec<Target>>, ApiError> {
    Ok(Json(supervisor.tenant_targets(&tenant_id).await?))
}

/// The scrape config the current registry contents would produce.
pub async fn config(State(supervisor): State<Arc<Supervisor>>) -> Result<Response, ApiError> {
    Ok(match supervisor.preview_config().await? {
        Some(yaml) => ([(header::CONTENT_TYPE, "application/yaml")], yaml).into_response(),
        None => not_found("no targets registered"),
    })
}
