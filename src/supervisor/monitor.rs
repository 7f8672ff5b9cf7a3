//! Change monitor loop
//!
//! Polls the registry on a fixed interval and reloads the daemon when the target set's
//! fingerprint changes. A cycle never fails the loop: every error is logged, recorded
//! in the status and retried on the next tick.

use super::Supervisor;
use crate::error::SyncError;
use crate::fingerprint::{Fingerprint, fingerprint, has_changed};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use tokio::select;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

#[derive(Debug, Default)]
pub(crate) struct MonitorState {
    pub(crate) active: bool,
    pub(crate) last_fingerprint: Option<Fingerprint>,
    pub(crate) cycles: u64,
    pub(crate) reloads_attempted: u64,
    pub(crate) reloads_failed: u64,
    pub(crate) last_checked_at: Option<DateTime<Local>>,
    pub(crate) last_error: Option<String>,
}

pub(crate) struct MonitorHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub active: bool,
    /// Rounded up, so a sub-second interval reports 1
    pub interval_seconds: u64,
    pub interval_ms: u64,
    /// First 8 hex characters of the last observed fingerprint
    pub fingerprint: Option<String>,
    pub cycles: u64,
    pub reloads_attempted: u64,
    pub reloads_failed: u64,
    pub last_checked_at: Option<DateTime<Local>>,
    pub last_error: Option<String>,
}

/// What a single poll of the registry did.
#[derive(Debug, Clone, PartialEq, Eq, strum::EnumIs)]
pub enum CycleOutcome {
    /// First observation; recorded without reloading.
    Baseline,
    Unchanged,
    /// Changed while the daemon is down; the next start picks it up.
    ChangedNotRunning,
    Reloaded,
    ReloadFailed(String),
    RegistryUnavailable(String),
}

/// Aborts the in-flight cycle when the loop itself is aborted.
struct CycleTask(JoinHandle<CycleOutcome>);

impl Drop for CycleTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Supervisor {
    fn monitor_state(&self) -> std::sync::MutexGuard<'_, MonitorState> {
        self.monitor.lock().unwrap_or_else(|poisoned| {
            warn!("monitor state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn monitor_status(&self) -> MonitorStatus {
        let interval = self.settings.monitor_interval();
        let state = self.monitor_state();
        MonitorStatus {
            active: state.active,
            interval_seconds: interval.as_millis().div_ceil(1000) as u64,
            interval_ms: interval.as_millis() as u64,
            fingerprint: state.last_fingerprint.as_ref().map(|f| f.short().to_string()),
            cycles: state.cycles,
            reloads_attempted: state.reloads_attempted,
            reloads_failed: state.reloads_failed,
            last_checked_at: state.last_checked_at,
            last_error: state.last_error.clone(),
        }
    }

    pub fn last_fingerprint(&self) -> Option<Fingerprint> {
        self.monitor_state().last_fingerprint.clone()
    }

    /// Write the initial config and record the baseline fingerprint, so the first
    /// monitor cycle already compares against something.
    pub async fn prime(&self) -> Result<Fingerprint, SyncError> {
        let targets = self.registry.fetch_targets().await?;
        let current = fingerprint(&targets);
        if targets.is_empty() {
            warn!("registry has no targets yet, leaving the scrape config untouched");
        } else {
            let _slot = self.process.lock().await;
            self.write_config(&targets)?;
        }
        info!(
            "baseline fingerprint {} for {} targets",
            current.short(),
            targets.len()
        );
        self.monitor_state().last_fingerprint = Some(current.clone());
        Ok(current)
    }

    /// Run one monitor cycle.
    pub async fn poll_once(&self) -> CycleOutcome {
        let fetched = self.registry.fetch_targets().await;
        let checked_at = Local::now();
        let targets = match fetched {
            Ok(targets) => targets,
            Err(e) => {
                warn!("registry unavailable, skipping this cycle: {e}");
                let mut state = self.monitor_state();
                state.cycles += 1;
                state.last_checked_at = Some(checked_at);
                state.last_error = Some(e.to_string());
                return CycleOutcome::RegistryUnavailable(e.to_string());
            }
        };

        let current = fingerprint(&targets);
        let previous = {
            let mut state = self.monitor_state();
            state.cycles += 1;
            state.last_checked_at = Some(checked_at);
            // recorded before reloading so a failed reload is not retried for the same change
            state.last_fingerprint.replace(current.clone())
        };
        let Some(previous) = previous else {
            info!(
                "baseline fingerprint {} for {} targets",
                current.short(),
                targets.len()
            );
            return CycleOutcome::Baseline;
        };
        if !has_changed(Some(&previous), &current) {
            debug!("no target changes ({})", current.short());
            return CycleOutcome::Unchanged;
        }

        info!(
            "target set changed {} -> {} ({} targets)",
            previous.short(),
            current.short(),
            targets.len()
        );
        match self.reload_if_running(&targets).await {
            None => {
                info!("daemon is not running, change applies on next start");
                CycleOutcome::ChangedNotRunning
            }
            Some(Ok(())) => {
                self.monitor_state().reloads_attempted += 1;
                CycleOutcome::Reloaded
            }
            Some(Err(e)) => {
                warn!("reload after target change failed: {e}");
                let mut state = self.monitor_state();
                state.reloads_attempted += 1;
                state.reloads_failed += 1;
                state.last_error = Some(e.detailed_message());
                CycleOutcome::ReloadFailed(e.to_string())
            }
        }
    }

    /// Start the background loop. Returns `false` if it was already running.
    pub async fn start_monitoring(self: &Arc<Self>) -> bool {
        let mut task = self.monitor_task.lock().await;
        if task.as_ref().is_some_and(|t| !t.join.is_finished()) {
            debug!("monitor loop already running");
            return false;
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        let supervisor = Arc::clone(self);
        let join = tokio::spawn(async move { supervisor.monitor_loop(stop_rx).await });
        *task = Some(MonitorHandle { stop_tx, join });
        self.monitor_state().active = true;
        info!(
            "monitoring started, polling every {}",
            humantime::format_duration(self.settings.monitor_interval())
        );
        true
    }

    /// Ask the loop to stop and wait for it, up to the join timeout. Returns `false` if
    /// it was not running.
    pub async fn stop_monitoring(&self) -> bool {
        let Some(handle) = self.monitor_task.lock().await.take() else {
            return false;
        };
        let _ = handle.stop_tx.send(true);
        let mut join = handle.join;
        let timeout = self.settings.monitor_join_timeout();
        if time::timeout(timeout, &mut join).await.is_err() {
            warn!(
                "monitor loop did not stop within {}, abandoning it",
                humantime::format_duration(timeout)
            );
            join.abort();
        }
        self.monitor_state().active = false;
        info!("monitoring stopped");
        true
    }

    async fn monitor_loop(self: Arc<Self>, mut stop_rx: watch::Receiver<bool>) {
        let interval = self.settings.monitor_interval();
        loop {
            if *stop_rx.borrow() {
                break;
            }
            // a panicking cycle must not take the loop down with it
            let supervisor = Arc::clone(&self);
            let mut cycle = CycleTask(tokio::spawn(async move { supervisor.poll_once().await }));
            if let Err(e) = (&mut cycle.0).await {
                error!("monitor cycle failed: {e}");
                self.monitor_state().last_error = Some(e.to_string());
            }
            select! {
                _ = time::sleep(interval) => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        self.monitor_state().active = false;
        debug!("monitor loop exited");
    }
}
