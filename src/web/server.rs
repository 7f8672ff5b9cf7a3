use crate::Result;
use crate::supervisor::Supervisor;
use axum::{
    Router,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;

use super::routes;

pub fn router(supervisor: Arc<Supervisor>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        // Registry
        .route("/api/targets", get(routes::targets::list))
        .route(
            "/api/tenants/{tenant_id}/targets",
            get(routes::targets::by_tenant),
        )
        .route("/api/config", get(routes::targets::config))
        // Daemon
        .route("/api/status", get(routes::daemon::status))
        .route("/api/daemon/{action}", post(routes::daemon::control))
        // Monitoring
        .route("/api/monitoring/status", get(routes::monitoring::status))
        .route("/api/monitoring/{action}", post(routes::monitoring::control))
        .with_state(supervisor)
}

pub async fn serve<F>(supervisor: Arc<Supervisor>, host: &str, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| miette::miette!("Failed to bind web server to {}: {}", addr, e))?;

    info!("control API listening on http://{}", addr);

    axum::serve(listener, router(supervisor))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| miette::miette!("Web server error: {}", e))?;

    Ok(())
}
