//! Application configuration module.
//!
//! Manages the TOML config file holding collector cadence, schedule API
//! and search index settings.

#[allow(clippy::module_inception)]
mod config;
mod paths;

#[allow(clippy::module_name_repetitions)]
pub use config::AppConfig;
pub use paths::{resolve_cache_path, resolve_config_path};
