//! CLI configuration file
//!
//! Looked up at `<config dir>/accessaudit/config.yaml` unless `--config`
//! names another file. Every field is optional.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CliConfig {
    /// Policy files layered over the built-in defaults, in order
    pub policy_paths: Vec<PathBuf>,

    /// Used by `audit` when `--fixtures` is not given
    pub fixtures_dir: Option<PathBuf>,

    /// Print the plain-language explanation under each finding
    pub explain: Option<bool>,
}

impl CliConfig {
    pub fn explain(&self) -> bool {
        self.explain.unwrap_or(true)
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push("accessaudit");
    path.push("config.yaml");
    Ok(path)
}

pub async fn load_config(config_path: Option<&Path>) -> Result<CliConfig> {
    let config_path = match config_path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Ok(path) => path,
            Err(err) => {
                warn!("{err:#}, using defaults");
                return Ok(CliConfig::default());
            }
        },
    };

    if config_path.exists() {
        let content = tokio::fs::read_to_string(&config_path)
            .await
            .context("Failed to read config file")?;

        let config: CliConfig =
            serde_yaml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    } else {
        warn!(
            "Config file not found, using defaults: {}",
            config_path.display()
        );
        Ok(CliConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_yaml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "policy_paths: [strict.yaml]\nfixtures_dir: /srv/captures\nexplain: false\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).await.unwrap();
        assert_eq!(config.policy_paths, vec![PathBuf::from("strict.yaml")]);
        assert_eq!(config.fixtures_dir, Some(PathBuf::from("/srv/captures")));
        assert!(!config.explain());
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.yaml"))).await.unwrap();
        assert!(config.policy_paths.is_empty());
        assert!(config.explain());
    }

    #[tokio::test]
    async fn unparsable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "policy_paths: {").unwrap();
        assert!(load_config(Some(&path)).await.is_err());
    }
}
