//! Config and data path resolution.

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Timetable cache file name.
const CACHE_FILE_NAME: &str = "timetable.json";

/// Resolves the config file path.
///
/// - If `dir` is `Some`, returns `{dir}/config.toml`.
/// - Otherwise returns `~/.config/airgraph/config.toml`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined (when `dir` is `None`).
pub fn resolve_config_path(dir: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(d) = dir {
        return Ok(d.join("config.toml"));
    }

    Ok(home_dir()?.join(".config").join("airgraph").join("config.toml"))
}

/// Resolves the durable timetable cache path.
///
/// - If `configured` is `Some`, returns it unchanged.
/// - If `dir` is `Some`, returns `{dir}/timetable.json`.
/// - Otherwise returns `~/.local/share/airgraph/timetable.json`.
///
/// # Errors
///
/// Returns an error if the home directory is needed but cannot be determined.
pub fn resolve_cache_path(configured: Option<&PathBuf>, dir: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(path) = configured {
        return Ok(path.clone());
    }
    if let Some(d) = dir {
        return Ok(d.join(CACHE_FILE_NAME));
    }

    Ok(home_dir()?
        .join(".local")
        .join("share")
        .join("airgraph")
        .join(CACHE_FILE_NAME))
}

fn home_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable is not set")?;
    Ok(PathBuf::from(home))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_resolve_with_dir() {
        // Arrange
        let dir = PathBuf::from("/tmp/myproject");

        // Act
        let path = resolve_config_path(Some(&dir)).unwrap();

        // Assert
        assert_eq!(path, PathBuf::from("/tmp/myproject/config.toml"));
    }

    #[test]
    fn test_resolve_default() {
        // Arrange & Act
        let path = resolve_config_path(None).unwrap();

        // Assert
        assert!(path.ends_with(".config/airgraph/config.toml"));
    }

    #[test]
    fn test_resolve_cache_prefers_configured() {
        // Arrange
        let configured = PathBuf::from("/srv/airgraph/cache.json");
        let dir = PathBuf::from("/tmp/myproject");

        // Act
        let path = resolve_cache_path(Some(&configured), Some(&dir)).unwrap();

        // Assert
        assert_eq!(path, configured);
    }

    #[test]
    fn test_resolve_cache_with_dir() {
        // Arrange
        let dir = PathBuf::from("/tmp/myproject");

        // Act
        let path = resolve_cache_path(None, Some(&dir)).unwrap();

        // Assert
        assert_eq!(path, PathBuf::from("/tmp/myproject/timetable.json"));
    }

    #[test]
    fn test_resolve_cache_default() {
        // Arrange & Act
        let path = resolve_cache_path(None, None).unwrap();

        // Assert
        assert!(path.ends_with(".local/share/airgraph/timetable.json"));
    }
}
