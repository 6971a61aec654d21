//! Project configuration in `.colline/config.json`.

use colline_client::{ClientConfig, ConfigError, API_URL_ENV};
use colline_graph::SessionConfig;
use colline_server::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_DIR: &str = ".colline";
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    /// Bind every interface instead of loopback.
    pub headless: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            headless: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    #[serde(flatten)]
    pub client: ClientConfig,
    #[serde(flatten)]
    pub session: SessionConfig,
    pub server: ServerSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            client: ClientConfig::default(),
            session: SessionConfig::default(),
            server: ServerSettings::default(),
        }
    }
}

impl Config {
    pub fn path(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Reads the config file under `root`. A missing file gives defaults.
    pub fn load_file(root: &Path) -> Result<Self, ConfigFileError> {
        let path = Self::path(root);
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path).map_err(|source| ConfigFileError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigFileError::Json { path, source })
    }

    /// Reads the config file, applies the environment and validates.
    pub fn load(root: &Path) -> Result<Self, ConfigFileError> {
        let mut config = Self::load_file(root)?;
        config
            .client
            .override_base_url(std::env::var(API_URL_ENV).ok());
        config.client.validate()?;
        Ok(config)
    }

    /// Writes the config as pretty JSON, creating `.colline/` if needed.
    pub fn save(&self, root: &Path) -> Result<PathBuf, ConfigFileError> {
        let path = Self::path(root);
        let io_err = |source| ConfigFileError::Io {
            path: path.clone(),
            source,
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let text = serde_json::to_string_pretty(self).map_err(|source| ConfigFileError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, text).map_err(io_err)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colline_core::DisplayMode;
    use colline_graph::RankDir;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_file(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.port, 7532);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.client.legacy_reverse = true;
        config.session.rankdir = RankDir::LR;
        config.server.headless = true;

        let path = config.save(dir.path()).unwrap();
        assert!(path.ends_with(".colline/config.json"));
        assert_eq!(Config::load_file(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_flat_file_layout() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        fs::write(
            Config::path(dir.path()),
            r#"{
                "version": "1.0",
                "api_base_url": "http://lineage:9000/api/v1",
                "rankdir": "TB",
                "mode": "table",
                "server": { "port": 9100 }
            }"#,
        )
        .unwrap();

        let config = Config::load_file(dir.path()).unwrap();
        assert_eq!(config.client.api_base_url, "http://lineage:9000/api/v1");
        assert_eq!(config.client.request_timeout_ms, 30_000);
        assert_eq!(config.session.rankdir, RankDir::TB);
        assert_eq!(config.session.mode, DisplayMode::Table);
        assert_eq!(config.server.port, 9100);
        assert!(!config.server.headless);
    }

    #[test]
    fn test_malformed_file_is_reported() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        fs::write(Config::path(dir.path()), "{ nope").unwrap();

        let err = Config::load_file(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigFileError::Json { .. }));
        assert!(err.to_string().contains("config.json"));
    }
}
