//! `AppConfig` struct and TOML read/write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default schedule-sync interval in seconds.
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 600;

/// Default minimum interval between schedule API requests.
const DEFAULT_MIN_INTERVAL_MS: u64 = 1000;

/// Top-level application configuration.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Collector loop settings.
    #[serde(default)]
    pub collector: CollectorConfig,
    /// Schedule API settings.
    #[serde(default)]
    pub source: SourceConfig,
    /// Search index settings.
    #[serde(default)]
    pub search: SearchConfig,
}

/// Collector loop configuration.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Schedule-sync interval in seconds.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    /// Durable timetable cache file (default: `{data dir}/timetable.json`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            cache_path: None,
        }
    }
}

/// Schedule API configuration.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    /// Media API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Slot sitemap URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sitemap_url: Option<String>,
    /// Minimum interval between requests in milliseconds.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// Bearer token (falls back to `AIRGRAPH_API_TOKEN`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            sitemap_url: None,
            min_interval_ms: DEFAULT_MIN_INTERVAL_MS,
            api_token: None,
        }
    }
}

/// Search index configuration.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SearchConfig {
    /// Index server URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Index name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
}

const fn default_sync_interval_secs() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

const fn default_min_interval_ms() -> u64 {
    DEFAULT_MIN_INTERVAL_MS
}

impl AppConfig {
    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Saves config to a TOML file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation or file write fails.
    #[allow(dead_code)]
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config to TOML")?;
        std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
    }
}
