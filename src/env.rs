pub use std::env::*;
use once_cell::sync::Lazy;
use std::path::PathBuf;

pub static PROMSYNC_LOG: Lazy<log::LevelFilter> =
    Lazy::new(|| var_log_level("PROMSYNC_LOG").unwrap_or(log::LevelFilter::Info));
pub static PROMSYNC_LOG_FILE_LEVEL: Lazy<log::LevelFilter> =
    Lazy::new(|| var_log_level("PROMSYNC_LOG_FILE_LEVEL").unwrap_or(*PROMSYNC_LOG));
pub static PROMSYNC_LOG_FILE: Lazy<Option<PathBuf>> = Lazy::new(|| var_path("PROMSYNC_LOG_FILE"));

/// Optional TOML file layered between the built-in defaults and the variables below.
pub static PROMSYNC_SETTINGS: Lazy<Option<PathBuf>> = Lazy::new(|| var_path("PROMSYNC_SETTINGS"));

// Registry sources. The database wins when both are set.
pub static DATABASE_URL: Lazy<Option<String>> = Lazy::new(|| var_string("DATABASE_URL"));
pub static PROMSYNC_TARGETS_FILE: Lazy<Option<PathBuf>> =
    Lazy::new(|| var_path("PROMSYNC_TARGETS_FILE"));

pub static PROMETHEUS_CONFIG_PATH: Lazy<Option<PathBuf>> =
    Lazy::new(|| var_path("PROMETHEUS_CONFIG_PATH"));
pub static PROMETHEUS_BINARY_PATH: Lazy<Option<PathBuf>> =
    Lazy::new(|| var_path("PROMETHEUS_BINARY_PATH"));
pub static PROMETHEUS_DATA_DIR: Lazy<Option<PathBuf>> =
    Lazy::new(|| var_path("PROMETHEUS_DATA_DIR"));
pub static PROMETHEUS_PORT: Lazy<Option<u16>> = Lazy::new(|| var_parse("PROMETHEUS_PORT"));

// Seconds between registry polls
pub static MONITOR_INTERVAL: Lazy<Option<u64>> = Lazy::new(|| var_parse("MONITOR_INTERVAL"));

pub static PROMSYNC_WEB_HOST: Lazy<Option<String>> = Lazy::new(|| var_string("PROMSYNC_WEB_HOST"));
pub static PROMSYNC_WEB_PORT: Lazy<Option<u16>> = Lazy::new(|| var_parse("PROMSYNC_WEB_PORT"));

fn var_path(name: &str) -> Option<PathBuf> {
    var_string(name).map(PathBuf::from)
}

fn var_string(name: &str) -> Option<String> {
    var(name).ok().filter(|val| !val.trim().is_empty())
}

fn var_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    var(name).ok().and_then(|val| val.trim().parse().ok())
}

fn var_log_level(name: &str) -> Option<log::LevelFilter> {
    var(name).ok().and_then(|level| level.parse().ok())
}
