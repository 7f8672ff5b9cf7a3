//! Diagnostic error types for the registry, the config writer and the supervised daemon.
//!
//! Every failure the core can surface maps onto one of the [`SyncError`] variants so the
//! control surface can report it without leaking raw OS errors.

// False positive: fields are used in #[error] format strings and miette derive macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading the target registry.
#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("failed to connect to the registry database")]
    #[diagnostic(
        code(promsync::registry::connect_failed),
        help("check DATABASE_URL and that the database is reachable")
    )]
    Connect {
        #[source]
        source: sqlx::Error,
    },

    #[error("registry query failed")]
    #[diagnostic(code(promsync::registry::query_failed))]
    Query {
        #[source]
        source: sqlx::Error,
    },

    #[error("registry did not answer within {seconds}s")]
    #[diagnostic(code(promsync::registry::timeout))]
    Timeout { seconds: u64 },

    #[error("failed to read targets file: {}", path.display())]
    #[diagnostic(code(promsync::registry::read_failed))]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse targets file: {}", path.display())]
    #[diagnostic(
        code(promsync::registry::parse_failed),
        help("each entry needs id, display_name, scrape_url and tenant_id")
    )]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{reason}")]
    #[diagnostic(code(promsync::registry::offline))]
    Offline { reason: String },

    #[error("no registry configured")]
    #[diagnostic(
        code(promsync::registry::not_configured),
        help("set DATABASE_URL or PROMSYNC_TARGETS_FILE")
    )]
    NotConfigured,
}

/// Failures of the supervisor operations (start, stop, reload, kill-port).
#[derive(Debug, Error, Diagnostic)]
pub enum SyncError {
    #[error("registry unavailable: {source}")]
    #[diagnostic(
        code(promsync::registry_unavailable),
        help("the monitor loop retries on its next cycle")
    )]
    RegistryUnavailable {
        #[source]
        source: RegistryError,
    },

    #[error("failed to write scrape config {}: {reason}", path.display())]
    #[diagnostic(code(promsync::config_write))]
    ConfigWrite { path: PathBuf, reason: String },

    #[error("daemon failed to start: {reason}")]
    #[diagnostic(
        code(promsync::process_start_failed),
        help("check the daemon binary path and the captured output")
    )]
    ProcessStartFailed {
        reason: String,
        /// Tail of the daemon's stderr at the time it exited
        stderr: String,
    },

    #[error("daemon is not running")]
    #[diagnostic(
        code(promsync::not_running),
        help("start the daemon before reloading it")
    )]
    NotRunning,

    #[error("could not free port {port}: {reason}")]
    #[diagnostic(code(promsync::port_reclaim_failed))]
    PortReclaimFailed { port: u16, reason: String },

    #[error("failed to signal daemon pid {pid}: {reason}")]
    #[diagnostic(
        code(promsync::process_control),
        help("the process may require manual intervention. Try: kill -9 <pid>")
    )]
    ProcessControl { pid: u32, reason: String },
}

impl From<RegistryError> for SyncError {
    fn from(source: RegistryError) -> Self {
        SyncError::RegistryUnavailable { source }
    }
}

impl SyncError {
    /// Human-readable message including captured daemon output, if any.
    pub fn detailed_message(&self) -> String {
        match self {
            SyncError::ProcessStartFailed { stderr, .. } if !stderr.trim().is_empty() => {
                format!("{self}\n{}", stderr.trim_end())
            }
            _ => self.to_string(),
        }
    }
}
