//! Control surface: every operation answers with a success flag and a message.

use super::{DaemonSnapshot, MonitorStatus, StartOutcome, StopOutcome, Supervisor};
use crate::error::SyncError;
use crate::target::Target;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub success: bool,
    pub message: String,
}

impl ControlResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ControlAction {
    Start,
    Stop,
    Reload,
    KillPort,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub daemon: DaemonSnapshot,
    pub listen_port: u16,
    pub config_path: PathBuf,
    pub registry: String,
    pub monitor: MonitorStatus,
}

impl Supervisor {
    pub async fn control(&self, action: ControlAction) -> ControlResponse {
        debug!("control action: {action}");
        let response = match action {
            ControlAction::Start => match self.start().await {
                Ok(StartOutcome::Started { pid }) => {
                    ControlResponse::ok(format!("daemon started with pid {pid}"))
                }
                Ok(StartOutcome::AlreadyRunning { pid }) => {
                    ControlResponse::ok(format!("daemon already running with pid {pid}"))
                }
                Err(e) => ControlResponse::failed(e.detailed_message()),
            },
            ControlAction::Stop => match self.stop().await {
                Ok(StopOutcome::Stopped { pid, forced: false }) => {
                    ControlResponse::ok(format!("daemon pid {pid} stopped"))
                }
                Ok(StopOutcome::Stopped { pid, forced: true }) => {
                    ControlResponse::ok(format!("daemon pid {pid} killed after timeout"))
                }
                Ok(StopOutcome::NotRunning) => ControlResponse::ok("daemon was not running"),
                Err(e) => ControlResponse::failed(e.to_string()),
            },
            ControlAction::Reload => match self.reload().await {
                Ok(()) => ControlResponse::ok("configuration reloaded"),
                Err(e) => ControlResponse::failed(e.to_string()),
            },
            ControlAction::KillPort => {
                let port = self.settings.daemon.listen_port;
                match self.kill_port(Some(port)).await {
                    Ok(outcome) => ControlResponse::ok(outcome.message(port)),
                    Err(e) => ControlResponse::failed(e.to_string()),
                }
            }
        };
        if !response.success {
            warn!("{action} failed: {}", response.message);
        }
        response
    }

    pub async fn control_monitoring(self: &Arc<Self>, enable: bool) -> ControlResponse {
        if enable {
            if self.start_monitoring().await {
                ControlResponse::ok("monitoring started")
            } else {
                ControlResponse::ok("monitoring already active")
            }
        } else if self.stop_monitoring().await {
            ControlResponse::ok("monitoring stopped")
        } else {
            ControlResponse::ok("monitoring was not active")
        }
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            daemon: self.daemon_status(),
            listen_port: self.settings.daemon.listen_port,
            config_path: self.settings.daemon.config_path.clone(),
            registry: self.registry.describe(),
            monitor: self.monitor_status(),
        }
    }

    /// All registered targets ordered by tenant, then id.
    pub async fn targets(&self) -> Result<Vec<Target>, SyncError> {
        let targets = self.registry.fetch_targets().await?;
        Ok(targets
            .into_iter()
            .sorted_by(|a, b| (&a.tenant_id, &a.id).cmp(&(&b.tenant_id, &b.id)))
            .collect())
    }

    pub async fn tenant_targets(&self, tenant_id: &str) -> Result<Vec<Target>, SyncError> {
        Ok(self
            .targets()
            .await?
            .into_iter()
            .filter(|t| t.tenant_id == tenant_id)
            .collect())
    }

    /// The document the next write would produce, without writing it.
    pub async fn preview_config(&self) -> Result<Option<String>, SyncError> {
        let targets = self.registry.fetch_targets().await?;
        let path = &self.settings.daemon.config_path;
        self.synthesizer
            .synthesize(&targets)
            .map(|doc| doc.to_yaml())
            .transpose()
            .map_err(|e| SyncError::ConfigWrite {
                path: path.clone(),
                reason: e.to_string(),
            })
    }

    /// Synthesize and write the config now, outside of start/reload.
    pub async fn write_config_now(&self) -> Result<usize, SyncError> {
        let targets = self.registry.fetch_targets().await?;
        let _slot = self.process.lock().await;
        self.write_config(&targets)?;
        Ok(targets.len())
    }
}
