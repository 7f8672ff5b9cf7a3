use super::Registry;
use crate::error::RegistryError;
use crate::target::Target;
use serde::Deserialize;
use std::path::PathBuf;

/// Reads targets from a TOML file, re-read on every call.
///
/// ```toml
/// [[targets]]
/// id = "service-20"
/// display_name = "Web API"
/// scrape_url = "http://localhost:8090/metrics"
/// tenant_id = "acme"
/// ```
pub struct FileRegistry {
    path: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct TargetsFile {
    #[serde(default)]
    targets: Vec<Target>,
}

impl FileRegistry {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait::async_trait]
impl Registry for FileRegistry {
    async fn fetch_targets(&self) -> Result<Vec<Target>, RegistryError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| RegistryError::Read {
                path: self.path.clone(),
                source,
            })?;
        let file: TargetsFile = toml::from_str(&raw).map_err(|source| RegistryError::Parse {
            path: self.path.clone(),
            source,
        })?;
        Ok(file.targets)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_targets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("targets.toml");
        fs::write(
            &path,
            r#"
[[targets]]
id = "service-20"
display_name = "Web API"
scrape_url = "http://localhost:8090/metrics"
tenant_id = "acme"

[[targets]]
id = "service-40"
scrape_url = "http://localhost:8091/metrics"
tenant_id = "acme"
"#,
        )
        .unwrap();

        let targets = FileRegistry::new(path).fetch_targets().await.unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].display_name, "Web API");
        assert_eq!(targets[1].display_name, "");
        assert_eq!(targets[1].tenant_id, "acme");
    }

    #[tokio::test]
    async fn test_empty_file_is_empty_registry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("targets.toml");
        fs::write(&path, "").unwrap();

        let targets = FileRegistry::new(path).fetch_targets().await.unwrap();
        assert!(targets.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let registry = FileRegistry::new(dir.path().join("missing.toml"));
        let err = registry.fetch_targets().await.unwrap_err();
        assert!(matches!(err, RegistryError::Read { .. }));
    }

    #[tokio::test]
    async fn test_malformed_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("targets.toml");
        fs::write(&path, "[[targets]]\nid = 3\n").unwrap();
        let err = FileRegistry::new(path).fetch_targets().await.unwrap_err();
        assert!(matches!(err, RegistryError::Parse { .. }));
    }
}
