//! Application configuration management.
//!
//! Configuration is stored at `~/.config/tool-inventory-cache/config.json`.
//! Every field is optional; unset fields fall back to the defaults below and
//! command line flags override both.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::manifest::CACHE_NAME;
use crate::worker::WorkerSettings;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "tool-inventory-cache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Origin of the tool inventory app when nothing else is configured
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:5000";

/// Address the intercepting server binds when nothing else is configured
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub origin: Option<String>,
    pub cache_name: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub listen: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn origin(&self) -> &str {
        self.origin.as_deref().unwrap_or(DEFAULT_ORIGIN)
    }

    pub fn listen(&self) -> &str {
        self.listen.as_deref().unwrap_or(DEFAULT_LISTEN)
    }

    /// Root directory of the cache storage.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            cache_name: self
                .cache_name
                .clone()
                .unwrap_or_else(|| CACHE_NAME.to_string()),
            ..WorkerSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.origin(), DEFAULT_ORIGIN);
        assert_eq!(config.listen(), DEFAULT_LISTEN);
        assert_eq!(config.worker_settings().cache_name, CACHE_NAME);
        assert_eq!(config.worker_settings().manifest.len(), 6);
    }

    #[test]
    fn test_overrides() {
        let config = Config {
            origin: Some("http://inventory.local".to_string()),
            cache_name: Some("tool-inventory-cache-v2".to_string()),
            cache_dir: Some(PathBuf::from("/tmp/toolcache")),
            listen: None,
        };
        assert_eq!(config.origin(), "http://inventory.local");
        assert_eq!(config.worker_settings().cache_name, "tool-inventory-cache-v2");
        assert_eq!(config.cache_dir().unwrap(), PathBuf::from("/tmp/toolcache"));
    }

    #[test]
    fn test_parse_partial_file() {
        let config: Config = serde_json::from_str(r#"{"origin": "http://10.0.0.5:5000"}"#)
            .expect("Failed to parse config test JSON");
        assert_eq!(config.origin(), "http://10.0.0.5:5000");
        assert!(config.cache_name.is_none());
    }
}
