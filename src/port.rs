//! Freeing the daemon's listen port from whatever process holds it.
//!
//! Holders are found through the `listeners` crate, asked to exit with SIGTERM and
//! killed if they are still around after the grace period. Our own PID is never
//! signalled. When the socket table cannot be read the reclaimer falls back to a
//! bind probe, which can tell "free" from "busy" but cannot name a holder.

use crate::procs::{self, Delivery, PROCS, Sig};
use itertools::Itertools;
use listeners::Protocol;
use serde::Serialize;
use std::net::TcpListener;
use std::time::Duration;
use tokio::time;

const ALIVE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReclaimOutcome {
    /// Nobody was listening.
    AlreadyFree,
    /// Every holder was terminated and the port is free again.
    Cleared { pids: Vec<u32> },
    /// Some holders survived, or the port is still bound after the settle delay.
    StillHeld { pids: Vec<u32> },
    /// The socket table could not be read. `in_use` comes from a bind probe.
    LookupUnavailable { reason: String, in_use: bool },
}

impl ReclaimOutcome {
    pub fn is_free(&self) -> bool {
        match self {
            ReclaimOutcome::AlreadyFree | ReclaimOutcome::Cleared { .. } => true,
            ReclaimOutcome::StillHeld { .. } => false,
            ReclaimOutcome::LookupUnavailable { in_use, .. } => !in_use,
        }
    }

    pub fn message(&self, port: u16) -> String {
        match self {
            ReclaimOutcome::AlreadyFree => format!("port {port} is already free"),
            ReclaimOutcome::Cleared { pids } => {
                format!("freed port {port} (terminated pids {})", pids.iter().join(", "))
            }
            ReclaimOutcome::StillHeld { pids } if pids.is_empty() => {
                format!("port {port} is still in use")
            }
            ReclaimOutcome::StillHeld { pids } => {
                format!("port {port} is still held by pids {}", pids.iter().join(", "))
            }
            ReclaimOutcome::LookupUnavailable { reason, in_use } => {
                let state = if *in_use { "in use" } else { "free" };
                format!("could not list listeners on port {port} ({reason}); port appears {state}")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PortReclaimer {
    grace: Duration,
    settle: Duration,
}

impl PortReclaimer {
    pub fn new(grace: Duration, settle: Duration) -> Self {
        Self { grace, settle }
    }

    pub async fn reclaim(&self, port: u16) -> ReclaimOutcome {
        let holders = match holders(port).await {
            Ok(pids) => pids,
            Err(reason) => {
                warn!("cannot list listeners on port {port}: {reason}");
                let in_use = !bind_probe(port);
                return ReclaimOutcome::LookupUnavailable { reason, in_use };
            }
        };
        if holders.is_empty() {
            trace!("port {port} has no listeners");
            return ReclaimOutcome::AlreadyFree;
        }

        for pid in &holders {
            let what = PROCS.describe(*pid).unwrap_or_else(|| "unknown".to_string());
            info!("port {port} is held by pid {pid} ({what}), terminating");
            self.terminate(*pid).await;
        }
        time::sleep(self.settle).await;

        match self::holders(port).await {
            Ok(remaining) if remaining.is_empty() => ReclaimOutcome::Cleared { pids: holders },
            Ok(remaining) => {
                warn!("port {port} is still held by {remaining:?}");
                ReclaimOutcome::StillHeld { pids: remaining }
            }
            Err(reason) => {
                debug!("re-checking port {port} failed ({reason}), probing instead");
                if bind_probe(port) {
                    ReclaimOutcome::Cleared { pids: holders }
                } else {
                    ReclaimOutcome::StillHeld { pids: vec![] }
                }
            }
        }
    }

    async fn terminate(&self, pid: u32) {
        match procs::signal_pid(pid, Sig::Term) {
            Ok(Delivery::Gone) => return,
            Ok(Delivery::Sent) => {}
            Err(e) => warn!("failed to send SIGTERM to pid {pid}: {e}"),
        }
        let deadline = time::Instant::now() + self.grace;
        while time::Instant::now() < deadline {
            if !procs::is_alive(pid) {
                debug!("pid {pid} exited after SIGTERM");
                return;
            }
            time::sleep(ALIVE_POLL.min(self.grace)).await;
        }
        if !procs::is_alive(pid) {
            return;
        }
        warn!("pid {pid} ignored SIGTERM, sending SIGKILL");
        if let Err(e) = procs::signal_pid(pid, Sig::Kill) {
            warn!("failed to send SIGKILL to pid {pid}: {e}");
        }
    }
}

/// PIDs listening on `port`, sorted, without our own.
async fn holders(port: u16) -> Result<Vec<u32>, String> {
    let own = std::process::id();
    let found = tokio::task::spawn_blocking(move || {
        listeners::get_all()
            .map(|all| {
                all.into_iter()
                    .filter(|l| l.protocol == Protocol::TCP && l.socket.port() == port)
                    .map(|l| l.process.pid)
                    .collect::<Vec<_>>()
            })
            .map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| e.to_string())??;
    if found.contains(&own) {
        debug!("port {port} is held by this process, leaving it alone");
    }
    Ok(found
        .into_iter()
        .filter(|pid| *pid != own)
        .sorted()
        .dedup()
        .collect())
}

/// `true` when the port can be bound right now.
pub fn bind_probe(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_ok()
}
