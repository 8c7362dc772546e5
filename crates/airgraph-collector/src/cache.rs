//! Durable timetable cache file.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use airgraph_api::schedule::Timetable;
use anyhow::{Context, Result};

/// Writes the timetable as JSON, replacing any previous file.
///
/// The JSON is written to a sibling temp file, flushed, and renamed over
/// `path`, so a reader sees either the old cache or the new one.
///
/// # Errors
///
/// Returns an error if serialization, the write or the rename fails.
pub fn save_timetable(path: &Path, timetable: &Timetable) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let json = serde_json::to_string(timetable).context("failed to serialize timetable")?;
    let temp_path = temp_path_for(path);
    if let Err(e) = write_synced(&temp_path, json.as_bytes()) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }
    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e)
            .with_context(|| format!("failed to replace timetable cache {}", path.display()));
    }

    tracing::debug!(path = %path.display(), "Saved timetable cache");
    Ok(())
}

/// `{path}.tmp`, in the same directory so the rename stays on one filesystem.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to sync {}", path.display()))
}

/// Reads the cached timetable. Returns `None` if the file does not exist.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid timetable.
pub fn load_timetable(path: &Path) -> Result<Option<Timetable>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read timetable cache {}", path.display()))?;
    let timetable: Timetable = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse timetable cache {}", path.display()))?;
    Ok(Some(timetable))
}
