//! Supervisor module - owns the metrics daemon and the change monitor
//!
//! This module is split into focused submodules:
//! - `lifecycle`: start/stop/reload of the daemon and port reclaiming
//! - `monitor`: the background loop that follows registry changes
//! - `control`: the success/message surface used by the CLI and the web shell

mod control;
mod lifecycle;
mod monitor;

pub use control::{ControlAction, ControlResponse, StatusReport};
pub use lifecycle::{StartOutcome, StopOutcome};
pub use monitor::{CycleOutcome, MonitorStatus};

use crate::daemon_status::DaemonStatus;
use crate::port::PortReclaimer;
use crate::registry::Registry;
use crate::scrape_config::Synthesizer;
use crate::settings::Settings;
use chrono::{DateTime, Local};
use monitor::{MonitorHandle, MonitorState};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::process::Child;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Number of daemon stderr lines kept in memory for start-up diagnostics
pub(crate) const STDERR_TAIL_LINES: usize = 50;

pub(crate) type StderrTail = Arc<std::sync::Mutex<VecDeque<String>>>;

/// The daemon process we launched, while we believe it is alive.
pub(crate) struct SupervisedProcess {
    pub(crate) pid: u32,
    pub(crate) child: Child,
    pub(crate) output: JoinHandle<()>,
}

/// Point-in-time view of the daemon, readable without waiting on a running operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DaemonSnapshot {
    pub status: DaemonStatus,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Local>>,
}

pub struct Supervisor {
    pub(crate) settings: Settings,
    pub(crate) registry: Arc<dyn Registry>,
    pub(crate) synthesizer: Synthesizer,
    pub(crate) reclaimer: PortReclaimer,
    /// Held for the whole of every start/stop/reload/kill-port, which serializes them
    pub(crate) process: Mutex<Option<SupervisedProcess>>,
    pub(crate) snapshot: std::sync::Mutex<DaemonSnapshot>,
    pub(crate) monitor: std::sync::Mutex<MonitorState>,
    pub(crate) monitor_task: Mutex<Option<MonitorHandle>>,
}

impl Supervisor {
    pub fn new(settings: Settings, registry: Arc<dyn Registry>) -> Arc<Self> {
        let synthesizer = Synthesizer::new(settings.scrape.clone(), settings.daemon.listen_port);
        let reclaimer = PortReclaimer::new(settings.reclaim_grace(), settings.reclaim_settle());
        info!(
            "supervisor using registry {} and daemon {}",
            registry.describe(),
            settings.daemon.binary_path.display()
        );
        Arc::new(Self {
            synthesizer,
            reclaimer,
            registry,
            process: Mutex::new(None),
            snapshot: std::sync::Mutex::new(DaemonSnapshot::default()),
            monitor: std::sync::Mutex::new(MonitorState::default()),
            monitor_task: Mutex::new(None),
            settings,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    /// Current daemon state. Reaps an exited daemon when no operation is in flight;
    /// otherwise returns the state recorded by that operation.
    pub fn daemon_status(&self) -> DaemonSnapshot {
        if let Ok(mut slot) = self.process.try_lock() {
            self.refresh(&mut slot);
        }
        self.snapshot().clone()
    }

    pub fn is_running(&self) -> bool {
        self.daemon_status().status.is_running()
    }

    /// Drops the handle if the daemon has exited. Returns the PID while it is alive.
    pub(crate) fn refresh(&self, slot: &mut Option<SupervisedProcess>) -> Option<u32> {
        let proc = slot.as_mut()?;
        match proc.child.try_wait() {
            Ok(None) => Some(proc.pid),
            Ok(Some(status)) => {
                warn!("daemon pid {} exited on its own with {status}", proc.pid);
                *slot = None;
                self.set_state(DaemonStatus::Absent, None);
                None
            }
            Err(e) => {
                warn!("failed to check daemon pid {}: {e}", proc.pid);
                Some(proc.pid)
            }
        }
    }

    pub(crate) fn set_state(&self, status: DaemonStatus, pid: Option<u32>) {
        let mut snapshot = self.snapshot();
        snapshot.started_at = match (status, pid) {
            (DaemonStatus::Absent, _) | (_, None) => None,
            (_, Some(pid)) if snapshot.pid == Some(pid) => snapshot.started_at,
            _ => Some(Local::now()),
        };
        snapshot.status = status;
        snapshot.pid = pid;
    }

    fn snapshot(&self) -> std::sync::MutexGuard<'_, DaemonSnapshot> {
        self.snapshot.lock().unwrap_or_else(|poisoned| {
            warn!("daemon snapshot mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Stop the monitor loop, then the daemon.
    pub async fn close(&self) {
        self.stop_monitoring().await;
        if let Err(err) = self.stop().await {
            error!("failed to stop daemon: {err}");
        }
    }
}
