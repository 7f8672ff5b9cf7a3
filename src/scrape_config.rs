//! Scrape configuration synthesis.
//!
//! The document is rebuilt from scratch on every write: a self-monitoring job first, then
//! one `org_<tenant>` job per tenant. Targets are ordered by `(tenant_id, id)` so the same
//! registry contents always produce byte-identical YAML, whatever order they were read in.

use crate::error::SyncError;
use crate::settings::ScrapeSettings;
use crate::target::Target;
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeDocument {
    pub global: GlobalConfig,
    pub scrape_configs: Vec<ScrapeJob>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalConfig {
    pub scrape_interval: String,
    pub evaluation_interval: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeJob {
    pub job_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrape_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_path: Option<String>,
    pub static_configs: Vec<StaticConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaticConfig {
    pub targets: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Builds scrape documents for one daemon instance.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    scrape: ScrapeSettings,
    daemon_port: u16,
}

impl Synthesizer {
    pub fn new(scrape: ScrapeSettings, daemon_port: u16) -> Self {
        Self { scrape, daemon_port }
    }

    /// `None` when there is nothing to scrape yet; callers skip the write.
    pub fn synthesize(&self, targets: &[Target]) -> Option<ScrapeDocument> {
        if targets.is_empty() {
            return None;
        }

        let mut scrape_configs = vec![ScrapeJob {
            job_name: self.scrape.self_job_name.clone(),
            scrape_interval: None,
            metrics_path: None,
            static_configs: vec![StaticConfig {
                targets: vec![format!("localhost:{}", self.daemon_port)],
                labels: BTreeMap::new(),
            }],
        }];

        let sorted = targets
            .iter()
            .sorted_by(|a, b| (&a.tenant_id, &a.id).cmp(&(&b.tenant_id, &b.id)));
        for (tenant_id, group) in &sorted.chunk_by(|t| t.tenant_id.as_str()) {
            let addresses = group
                .map(|t| {
                    let addr = t.address();
                    if addr.is_fallback() {
                        warn!("target {t} has an unparseable url, using it verbatim");
                    }
                    addr.into_string()
                })
                .collect();
            scrape_configs.push(ScrapeJob {
                job_name: format!("org_{tenant_id}"),
                scrape_interval: Some(self.scrape.tenant_scrape_interval.clone()),
                metrics_path: Some(self.scrape.metrics_path.clone()),
                static_configs: vec![StaticConfig {
                    targets: addresses,
                    labels: BTreeMap::from([(
                        "organization_id".to_string(),
                        tenant_id.to_string(),
                    )]),
                }],
            });
        }

        Some(ScrapeDocument {
            global: GlobalConfig {
                scrape_interval: self.scrape.scrape_interval.clone(),
                evaluation_interval: self.scrape.evaluation_interval.clone(),
            },
            scrape_configs,
        })
    }
}

impl ScrapeDocument {
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn job(&self, name: &str) -> Option<&ScrapeJob> {
        self.scrape_configs.iter().find(|j| j.job_name == name)
    }

    /// Write the document to `path`, replacing the previous file atomically.
    pub fn write(&self, path: &Path) -> Result<(), SyncError> {
        let write_err = |reason: String| SyncError::ConfigWrite {
            path: path.to_path_buf(),
            reason,
        };
        let yaml = self.to_yaml().map_err(|e| write_err(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            xx::file::mkdirp(parent).map_err(|e| write_err(e.to_string()))?;
        }
        let _lock = xx::fslock::get(path, false).map_err(|e| write_err(e.to_string()))?;

        let tmp = path.with_extension("yml.tmp");
        let mut file = std::fs::File::create(&tmp).map_err(|e| write_err(e.to_string()))?;
        file.write_all(yaml.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| write_err(e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            write_err(e.to_string())
        })?;
        debug!("wrote scrape config to {}", path.display());
        Ok(())
    }
}
