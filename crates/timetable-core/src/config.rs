//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the timetable source URL, the relay list and the retry policy used to
//! reach it, and where the local cache lives.
//!
//! Configuration is stored at `~/.config/sicsr-timetable/config.json`.
//! A missing file yields the defaults, which match the public deployment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "sicsr-timetable";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Report endpoint that serves both the batch picker page and the CSV rows.
pub const DEFAULT_BASE_URL: &str = "http://time-table.sicsr.ac.in/report.php";

/// Per-attempt HTTP timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Attempts per relay before giving up.
const DEFAULT_MAX_RETRIES: usize = 3;

/// Pause between failed attempts.
const DEFAULT_BACKOFF_MS: u64 = 500;

/// `id` of the `<select>` holding the batch options.
const DEFAULT_BATCH_CONTROL_ID: &str = "typematch";

/// How a relay hands back the proxied body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseShape {
    /// Body is the proxied document itself
    Text,
    /// Body is a JSON envelope; the document sits in `RelayConfig::field`
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Endpoint template. `{url}` is replaced by the encoded target;
    /// without a placeholder the target is appended.
    pub url: String,
    pub shape: ResponseShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl RelayConfig {
    pub fn text(url: &str) -> Self {
        Self {
            url: url.to_string(),
            shape: ResponseShape::Text,
            field: None,
        }
    }

    pub fn json(url: &str, field: &str) -> Self {
        Self {
            url: url.to_string(),
            shape: ResponseShape::Json,
            field: Some(field.to_string()),
        }
    }
}

fn default_relays() -> Vec<RelayConfig> {
    vec![
        RelayConfig::text("https://api.codetabs.com/v1/proxy?quest="),
        RelayConfig::text("https://corsproxy.io/?"),
        RelayConfig::json("https://api.allorigins.win/get?url=", "contents"),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub relays: Vec<RelayConfig>,
    pub request_timeout_secs: u64,
    pub max_retries: usize,
    pub backoff_ms: u64,
    pub batch_control_id: String,
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            relays: default_relays(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_ms: DEFAULT_BACKOFF_MS,
            batch_control_id: DEFAULT_BATCH_CONTROL_ID.to_string(),
            cache_dir: None,
        }
    }
}

impl Config {
    /// Load the config file, then apply `TIMETABLE_*` environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
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

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("TIMETABLE_BASE_URL") {
            if !url.trim().is_empty() {
                self.base_url = url.trim().to_string();
            }
        }
        if let Ok(dir) = std::env::var("TIMETABLE_CACHE_DIR") {
            if !dir.trim().is_empty() {
                self.cache_dir = Some(PathBuf::from(dir.trim()));
            }
        }
    }

    /// `<config dir>/sicsr-timetable/config.json`
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployment() {
        let config = Config::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.relays.len(), 3);
        assert_eq!(config.relays[2].shape, ResponseShape::Json);
        assert_eq!(config.relays[2].field.as_deref(), Some("contents"));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.backoff(), Duration::from_millis(500));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"max_retries": 1}"#)
            .expect("partial config should parse");
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.batch_control_id, "typematch");
        assert_eq!(config.relays, default_relays());
    }

    #[test]
    fn test_relay_shape_serializes_lowercase() {
        let json = serde_json::to_string(&RelayConfig::text("https://r/?")).expect("serialize");
        assert_eq!(json, r#"{"url":"https://r/?","shape":"text"}"#);
    }

    #[test]
    fn test_cache_dir_override() {
        let config = Config {
            cache_dir: Some(PathBuf::from("/tmp/tt")),
            ..Config::default()
        };
        assert_eq!(config.cache_dir().expect("cache dir"), PathBuf::from("/tmp/tt"));
    }
}
