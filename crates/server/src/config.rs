//! Server configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Server configuration, read from `KOI_*` environment variables
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConfig {
    /// Port for the prediction, health and metrics API
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Trained artifact bundle loaded at startup
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,

    /// JSON-lines prediction log
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,

    /// KOI catalog CSV served by the explorer
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
}

fn default_api_port() -> u16 {
    8080
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("models/bundle.json")
}

fn default_history_path() -> PathBuf {
    PathBuf::from("data/predictions.jsonl")
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("data/koi_data.csv")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            artifact_path: default_artifact_path(),
            history_path: default_history_path(),
            catalog_path: default_catalog_path(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let source = config::Config::builder()
            .add_source(config::Environment::with_prefix("KOI").try_parsing(true))
            .build()
            .context("Failed to read KOI_* environment")?;
        Self::from_config(source)
    }

    pub fn from_config(source: config::Config) -> Result<Self> {
        source
            .try_deserialize()
            .context("Invalid server configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let source = config::Config::builder().build().unwrap();
        let config = ServerConfig::from_config(source).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.api_port, 8080);
    }

    #[test]
    fn test_overrides() {
        let source = config::Config::builder()
            .set_override("api_port", 9191_i64)
            .unwrap()
            .set_override("artifact_path", "/srv/koi/bundle.json")
            .unwrap()
            .build()
            .unwrap();
        let config = ServerConfig::from_config(source).unwrap();
        assert_eq!(config.api_port, 9191);
        assert_eq!(config.artifact_path, PathBuf::from("/srv/koi/bundle.json"));
        assert_eq!(config.history_path, PathBuf::from("data/predictions.jsonl"));
        assert_eq!(config.catalog_path, PathBuf::from("data/koi_data.csv"));
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        let source = config::Config::builder()
            .set_override("api_port", "not-a-port")
            .unwrap()
            .build()
            .unwrap();
        assert!(ServerConfig::from_config(source).is_err());
    }
}
