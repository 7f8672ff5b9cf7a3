//! Daemon lifecycle management - start/stop/reload operations
//!
//! Every operation takes the process lock for its whole duration, so at most one of
//! them runs at a time whether it came from the monitor loop or the control surface.

use super::{STDERR_TAIL_LINES, StderrTail, SupervisedProcess, Supervisor};
use crate::daemon_status::DaemonStatus;
use crate::error::SyncError;
use crate::port::ReclaimOutcome;
use crate::procs::{self, Delivery, Sig};
use crate::target::Target;
use serde::Serialize;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufWriter};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tokio::select;
use tokio::time;

/// How long to wait for the output pump to drain after the daemon is gone
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    Started { pid: u32 },
    AlreadyRunning { pid: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StopOutcome {
    Stopped { pid: u32, forced: bool },
    NotRunning,
}

impl Supervisor {
    /// Start the daemon unless it is already running.
    ///
    /// The listen port is reclaimed first (best effort), then the config is regenerated
    /// from the registry and the daemon is launched as its own process group leader.
    /// The daemon must survive the startup grace period to count as started.
    pub async fn start(&self) -> Result<StartOutcome, SyncError> {
        let mut slot = self.process.lock().await;
        if let Some(pid) = self.refresh(&mut slot) {
            info!("daemon already running with pid {pid}");
            return Ok(StartOutcome::AlreadyRunning { pid });
        }

        let port = self.settings.daemon.listen_port;
        let reclaimed = self.reclaimer.reclaim(port).await;
        if reclaimed.is_free() {
            debug!("{}", reclaimed.message(port));
        } else {
            warn!("{}; starting anyway", reclaimed.message(port));
        }

        let targets = self.registry.fetch_targets().await?;
        self.write_config(&targets)?;

        let data_dir = &self.settings.daemon.data_dir;
        xx::file::mkdirp(data_dir).map_err(|e| SyncError::ProcessStartFailed {
            reason: format!("cannot create data dir {}: {e}", data_dir.display()),
            stderr: String::new(),
        })?;

        info!(
            "starting daemon {} on port {port}",
            self.settings.daemon.binary_path.display()
        );
        let mut child = self
            .daemon_command()
            .spawn()
            .map_err(|e| SyncError::ProcessStartFailed {
                reason: format!(
                    "failed to spawn {}: {e}",
                    self.settings.daemon.binary_path.display()
                ),
                stderr: String::new(),
            })?;
        let Some(pid) = child.id() else {
            return Err(SyncError::ProcessStartFailed {
                reason: "process exited before its pid could be captured".to_string(),
                stderr: String::new(),
            });
        };

        let tail: StderrTail = Arc::new(std::sync::Mutex::new(VecDeque::new()));
        let mut output = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => tokio::spawn(pump_output(
                stdout,
                stderr,
                self.settings.daemon.log_file.clone(),
                tail.clone(),
            )),
            _ => {
                warn!("failed to capture output of daemon pid {pid}");
                tokio::spawn(async {})
            }
        };

        time::sleep(self.settings.startup_grace()).await;

        let exited = match child.try_wait() {
            Ok(None) => None,
            Ok(Some(status)) => Some(format!("exited during startup with {status}")),
            Err(e) => {
                let _ = procs::signal_group(pid, Sig::Kill);
                let _ = time::timeout(OUTPUT_DRAIN_TIMEOUT, child.wait()).await;
                Some(format!("could not confirm the process is alive: {e}"))
            }
        };
        if let Some(reason) = exited {
            if time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut output).await.is_err() {
                output.abort();
            }
            let stderr = tail_text(&tail);
            error!("daemon pid {pid} {reason}");
            self.set_state(DaemonStatus::Absent, None);
            return Err(SyncError::ProcessStartFailed { reason, stderr });
        }

        info!("daemon started with pid {pid}");
        *slot = Some(SupervisedProcess { pid, child, output });
        self.set_state(DaemonStatus::Running, Some(pid));
        Ok(StartOutcome::Started { pid })
    }

    /// Stop the daemon and its whole process group.
    ///
    /// SIGTERM first, then a bounded wait, then SIGKILL. The handle is cleared in every
    /// case once the wait is over or the kill has been sent.
    pub async fn stop(&self) -> Result<StopOutcome, SyncError> {
        let mut slot = self.process.lock().await;
        if self.refresh(&mut slot).is_none() {
            debug!("stop requested but daemon is not running");
            return Ok(StopOutcome::NotRunning);
        }
        let Some(mut proc) = slot.take() else {
            return Ok(StopOutcome::NotRunning);
        };
        let pid = proc.pid;
        self.set_state(DaemonStatus::Stopping, Some(pid));
        info!("stopping daemon pid {pid}");

        match procs::signal_group(pid, Sig::Term) {
            Ok(Delivery::Sent) => {}
            Ok(Delivery::Gone) => debug!("process group {pid} already gone"),
            Err(e) => warn!("failed to send SIGTERM to process group {pid}: {e}"),
        }

        let attempts = self.settings.daemon.stop_poll_attempts;
        let interval = self.settings.stop_poll_interval();
        let mut exited = false;
        for i in 0..=attempts {
            match proc.child.try_wait() {
                Ok(Some(status)) => {
                    info!("daemon pid {pid} exited with {status}");
                    exited = true;
                    break;
                }
                Ok(None) => {}
                Err(e) => warn!("failed to check daemon pid {pid}: {e}"),
            }
            if i < attempts {
                trace!("waiting for daemon pid {pid} to exit ({}/{attempts})", i + 1);
                time::sleep(interval).await;
            }
        }

        let mut result = Ok(StopOutcome::Stopped { pid, forced: !exited });
        if !exited {
            warn!("daemon pid {pid} did not exit after SIGTERM, sending SIGKILL");
            match procs::signal_group(pid, Sig::Kill) {
                Ok(_) => {
                    if time::timeout(interval, proc.child.wait()).await.is_err() {
                        warn!("daemon pid {pid} still not reaped after SIGKILL");
                    }
                }
                Err(reason) => {
                    error!("failed to send SIGKILL to process group {pid}: {reason}");
                    result = Err(SyncError::ProcessControl { pid, reason });
                }
            }
        }

        if time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut proc.output)
            .await
            .is_err()
        {
            proc.output.abort();
        }
        self.set_state(DaemonStatus::Absent, None);
        result
    }

    /// Regenerate the config from the registry and ask the running daemon to reload it.
    pub async fn reload(&self) -> Result<(), SyncError> {
        let mut slot = self.process.lock().await;
        let Some(pid) = self.refresh(&mut slot) else {
            return Err(SyncError::NotRunning);
        };
        let targets = self.registry.fetch_targets().await?;
        self.write_config(&targets)?;
        self.signal_reload(pid, &mut slot)
    }

    /// Reload with an already fetched target set. `None` when the daemon is not running.
    pub(crate) async fn reload_if_running(
        &self,
        targets: &[Target],
    ) -> Option<Result<(), SyncError>> {
        let mut slot = self.process.lock().await;
        let pid = self.refresh(&mut slot)?;
        Some(
            self.write_config(targets)
                .and_then(|()| self.signal_reload(pid, &mut slot)),
        )
    }

    fn signal_reload(
        &self,
        pid: u32,
        slot: &mut Option<SupervisedProcess>,
    ) -> Result<(), SyncError> {
        match procs::signal_pid(pid, Sig::Hup) {
            Ok(Delivery::Sent) => {
                info!("sent SIGHUP to daemon pid {pid}");
                Ok(())
            }
            Ok(Delivery::Gone) => {
                warn!("daemon pid {pid} disappeared before reload");
                *slot = None;
                self.set_state(DaemonStatus::Absent, None);
                Err(SyncError::NotRunning)
            }
            Err(reason) => Err(SyncError::ProcessControl { pid, reason }),
        }
    }

    /// Free `port` (the daemon's listen port by default) from whatever holds it.
    pub async fn kill_port(&self, port: Option<u16>) -> Result<ReclaimOutcome, SyncError> {
        let port = port.unwrap_or(self.settings.daemon.listen_port);
        let mut slot = self.process.lock().await;
        info!("reclaiming port {port}");
        let outcome = self.reclaimer.reclaim(port).await;
        // the daemon itself may have been one of the holders
        self.refresh(&mut slot);
        if outcome.is_free() {
            info!("{}", outcome.message(port));
            Ok(outcome)
        } else {
            Err(SyncError::PortReclaimFailed {
                port,
                reason: outcome.message(port),
            })
        }
    }

    /// Write the scrape config for `targets`. An empty set leaves the existing file alone.
    pub(crate) fn write_config(&self, targets: &[Target]) -> Result<(), SyncError> {
        let path = &self.settings.daemon.config_path;
        let Some(doc) = self.synthesizer.synthesize(targets) else {
            return Err(SyncError::ConfigWrite {
                path: path.clone(),
                reason: "no targets registered, keeping the existing config".to_string(),
            });
        };
        doc.write(path)?;
        info!(
            "wrote scrape config for {} targets to {}",
            targets.len(),
            path.display()
        );
        Ok(())
    }

    fn daemon_command(&self) -> Command {
        let daemon = &self.settings.daemon;
        let mut cmd = Command::new(&daemon.binary_path);
        cmd.arg(format!("--config.file={}", daemon.config_path.display()))
            .arg(format!("--storage.tsdb.path={}", daemon.data_dir.display()))
            .arg("--web.enable-lifecycle")
            .arg(format!("--web.listen-address=0.0.0.0:{}", daemon.listen_port))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

fn tail_text(tail: &StderrTail) -> String {
    let lines = tail.lock().unwrap_or_else(|e| e.into_inner());
    lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
}

/// Drain the daemon's stdout and stderr into the log file until both close.
async fn pump_output(stdout: ChildStdout, stderr: ChildStderr, log_path: PathBuf, tail: StderrTail) {
    let mut stdout = tokio::io::BufReader::new(stdout).lines();
    let mut stderr = tokio::io::BufReader::new(stderr).lines();

    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty())
        && let Err(e) = xx::file::mkdirp(parent)
    {
        warn!("failed to create log dir {}: {e}", parent.display());
    }
    let mut log_appender = match tokio::fs::File::options()
        .append(true)
        .create(true)
        .open(&log_path)
        .await
    {
        Ok(f) => Some(BufWriter::new(f)),
        Err(e) => {
            warn!("failed to open daemon log {}: {e}", log_path.display());
            None
        }
    };

    let now = || chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let mut log_flush_interval = time::interval(Duration::from_millis(500));
    let mut stdout_done = false;
    let mut stderr_done = false;

    while !(stdout_done && stderr_done) {
        let line = select! {
            line = stdout.next_line(), if !stdout_done => match line {
                Ok(Some(line)) => Some(line),
                _ => {
                    stdout_done = true;
                    None
                }
            },
            line = stderr.next_line(), if !stderr_done => match line {
                Ok(Some(line)) => {
                    let mut tail = tail.lock().unwrap_or_else(|e| e.into_inner());
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line.clone());
                    Some(line)
                }
                _ => {
                    stderr_done = true;
                    None
                }
            },
            _ = log_flush_interval.tick() => {
                if let Some(w) = log_appender.as_mut()
                    && let Err(e) = w.flush().await
                {
                    warn!("failed to flush daemon log: {e}");
                }
                None
            }
        };
        if let (Some(line), Some(w)) = (line, log_appender.as_mut()) {
            trace!("daemon: {line}");
            if let Err(e) = w.write_all(format!("{} {line}\n", now()).as_bytes()).await {
                warn!("failed to write daemon log: {e}");
            }
        }
    }

    if let Some(w) = log_appender.as_mut()
        && let Err(e) = w.flush().await
    {
        warn!("failed to flush daemon log: {e}");
    }
}
