//! User-configurable settings for promsync.
//!
//! Settings are resolved in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. The TOML file named by `PROMSYNC_SETTINGS`
//! 3. Built-in defaults (lowest priority)
//!
//! Example settings file:
//! ```toml
//! [registry]
//! targets_file = "targets.toml"
//!
//! [daemon]
//! binary_path = "/opt/prometheus/prometheus"
//! listen_port = 9091
//!
//! [monitor]
//! interval = "1m"
//! ```
//!
//! Durations are humantime strings (`"500ms"`, `"30s"`, `"1m"`); a bare number means seconds.

use crate::error::RegistryError;
use crate::registry::{FileRegistry, PgRegistry, Registry, postgres};
use crate::{Result, env};
use miette::{IntoDiagnostic, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub registry: RegistrySettings,
    pub daemon: DaemonSettings,
    pub scrape: ScrapeSettings,
    pub reclaim: ReclaimSettings,
    pub monitor: MonitorSettings,
    pub web: WebSettings,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub database_url: Option<String>,
    pub targets_file: Option<PathBuf>,
    /// Upper bound for connecting to and querying the registry
    pub timeout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    pub binary_path: PathBuf,
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
    pub listen_port: u16,
    /// Where the daemon's stdout/stderr are appended
    pub log_file: PathBuf,
    /// How long a fresh daemon must survive before start() reports success
    pub startup_grace: String,
    pub stop_poll_attempts: u32,
    pub stop_poll_interval: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeSettings {
    pub scrape_interval: String,
    pub evaluation_interval: String,
    pub tenant_scrape_interval: String,
    pub metrics_path: String,
    pub self_job_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReclaimSettings {
    /// Wait between SIGTERM and SIGKILL for each process holding the port
    pub grace: String,
    /// Wait for the kernel to release the port after the holders are gone
    pub settle: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub interval: String,
    pub join_timeout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSettings {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Debug for RegistrySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrySettings")
            .field("database_url", &self.database_url.as_deref().map(postgres::redact))
            .field("targets_file", &self.targets_file)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            database_url: None,
            targets_file: None,
            timeout: "10s".to_string(),
        }
    }
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("prometheus"),
            config_path: PathBuf::from("./prometheus.yml"),
            data_dir: PathBuf::from("./prometheus_data"),
            listen_port: 9090,
            log_file: PathBuf::from("./prometheus.log"),
            startup_grace: "2s".to_string(),
            stop_poll_attempts: 10,
            stop_poll_interval: "1s".to_string(),
        }
    }
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            scrape_interval: "15s".to_string(),
            evaluation_interval: "15s".to_string(),
            tenant_scrape_interval: "30s".to_string(),
            metrics_path: "/metrics".to_string(),
            self_job_name: "prometheus".to_string(),
        }
    }
}

impl Default for ReclaimSettings {
    fn default() -> Self {
        Self {
            grace: "2s".to_string(),
            settle: "3s".to_string(),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval: "30s".to_string(),
            join_timeout: "5s".to_string(),
        }
    }
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Settings {
    /// Defaults, then the settings file, then environment variables.
    pub fn load() -> Result<Self> {
        let mut settings = match &*env::PROMSYNC_SETTINGS {
            Some(path) => Self::read(path)?,
            None => Self::default(),
        };
        settings.apply_env();
        debug!("settings: {settings:?}");
        Ok(settings)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read settings file {}", path.display()))?;
        toml::from_str(&raw)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to parse settings file {}", path.display()))
    }

    fn apply_env(&mut self) {
        if let Some(url) = &*env::DATABASE_URL {
            self.registry.database_url = Some(url.clone());
        }
        if let Some(path) = &*env::PROMSYNC_TARGETS_FILE {
            self.registry.targets_file = Some(path.clone());
        }
        if let Some(path) = &*env::PROMETHEUS_CONFIG_PATH {
            self.daemon.config_path = path.clone();
        }
        if let Some(path) = &*env::PROMETHEUS_BINARY_PATH {
            self.daemon.binary_path = path.clone();
        }
        if let Some(path) = &*env::PROMETHEUS_DATA_DIR {
            self.daemon.data_dir = path.clone();
        }
        if let Some(port) = *env::PROMETHEUS_PORT {
            self.daemon.listen_port = port;
        }
        if let Some(secs) = *env::MONITOR_INTERVAL {
            self.monitor.interval = format!("{secs}s");
        }
        if let Some(host) = &*env::PROMSYNC_WEB_HOST {
            self.web.host = host.clone();
        }
        if let Some(port) = *env::PROMSYNC_WEB_PORT {
            self.web.port = port;
        }
    }

    /// Build the registry reader these settings point at.
    pub fn registry(&self) -> std::result::Result<Arc<dyn Registry>, RegistryError> {
        let timeout = self.registry_timeout();
        if let Some(url) = &self.registry.database_url {
            return Ok(Arc::new(PgRegistry::new(url.clone(), timeout)));
        }
        if let Some(path) = &self.registry.targets_file {
            return Ok(Arc::new(FileRegistry::new(path.clone())));
        }
        Err(RegistryError::NotConfigured)
    }

    pub fn parse_duration(value: &str) -> Option<Duration> {
        let value = value.trim();
        if let Ok(secs) = value.parse::<u64>() {
            return Some(Duration::from_secs(secs));
        }
        humantime::parse_duration(value).ok()
    }

    fn duration_or(value: &str, name: &str, default: Duration) -> Duration {
        Self::parse_duration(value).unwrap_or_else(|| {
            warn!("invalid duration {value:?} for {name}, using {default:?}");
            default
        })
    }

    pub fn registry_timeout(&self) -> Duration {
        Self::duration_or(&self.registry.timeout, "registry.timeout", Duration::from_secs(10))
    }

    pub fn startup_grace(&self) -> Duration {
        Self::duration_or(
            &self.daemon.startup_grace,
            "daemon.startup_grace",
            Duration::from_secs(2),
        )
    }

    pub fn stop_poll_interval(&self) -> Duration {
        Self::duration_or(
            &self.daemon.stop_poll_interval,
            "daemon.stop_poll_interval",
            Duration::from_secs(1),
        )
    }

    pub fn reclaim_grace(&self) -> Duration {
        Self::duration_or(&self.reclaim.grace, "reclaim.grace", Duration::from_secs(2))
    }

    pub fn reclaim_settle(&self) -> Duration {
        Self::duration_or(&self.reclaim.settle, "reclaim.settle", Duration::from_secs(3))
    }

    /// Never zero; a zero interval would poll the registry in a tight loop.
    pub fn monitor_interval(&self) -> Duration {
        let default = Duration::from_secs(30);
        match Self::duration_or(&self.monitor.interval, "monitor.interval", default) {
            interval if interval.is_zero() => {
                warn!("monitor.interval must be greater than zero, using {default:?}");
                default
            }
            interval => interval,
        }
    }

    pub fn monitor_join_timeout(&self) -> Duration {
        Self::duration_or(
            &self.monitor.join_timeout,
            "monitor.join_timeout",
            Duration::from_secs(5),
        )
    }
}
