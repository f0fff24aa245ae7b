// server/src/config.rs

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_yaml2 as serde_yaml;

use storage::StoreConfig;

/// Where `medbook serve` looks when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config/medbook.yaml";

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cache_entries() -> u64 {
    1024
}

fn default_cache_ttl_seconds() -> u64 {
    300
}

/// Sizing of the derived free-slot view cache.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_entries")]
    pub capacity: u64,
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            capacity: default_cache_entries(),
            ttl_seconds: default_cache_ttl_seconds(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub storage: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
            storage: StoreConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// The config file nests everything under a single `server` key.
#[derive(Debug, Serialize, Deserialize)]
struct ServerConfigWrapper {
    server: ServerConfig,
}

/// Loads the YAML config, falling back to defaults when no file is
/// present. A file that exists but does not parse is an error; starting
/// with half a config would hide typos.
pub fn load_server_config(config_file_path: Option<&str>) -> Result<ServerConfig> {
    let path_to_use = config_file_path
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    if !path_to_use.exists() {
        warn!(
            "Config file not found at {}. Using default server config.",
            path_to_use.display()
        );
        return Ok(ServerConfig::default());
    }

    info!("Loading server config from {}", path_to_use.display());
    let content = fs::read_to_string(&path_to_use)
        .with_context(|| format!("Failed to read config file: {}", path_to_use.display()))?;
    let wrapper: ServerConfigWrapper = serde_yaml::from_str(&content).map_err(|e| {
        error!("YAML parsing error at {}: {}", path_to_use.display(), e);
        anyhow!("Failed to parse config YAML: {}", path_to_use.display())
    })?;
    Ok(wrapper.server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::StorageKind;

    fn scratch_file(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("medbook_config_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_server_config(Some("/nonexistent/medbook.yaml")).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.storage.kind, StorageKind::Memory);
    }

    #[test]
    fn test_partial_yaml_fills_in_defaults() {
        let path = scratch_file(
            "partial.yaml",
            "server:\n  port: 9100\n  storage:\n    kind: sled\n",
        );
        let config = load_server_config(path.to_str()).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.storage.kind, StorageKind::Sled);
        assert_eq!(config.cache.ttl_seconds, default_cache_ttl_seconds());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let path = scratch_file("broken.yaml", "server: [not, a, map");
        assert!(load_server_config(path.to_str()).is_err());
        fs::remove_file(&path).ok();
    }
}
