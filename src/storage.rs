// ABOUTME: Local JSON persistence for preferences and saved servers
// ABOUTME: Writes go through a temp file in the same directory and are renamed into place

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Directory holding config and local state: `$VPNW_HOME`, else `~/.vpnw`.
pub fn home_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("VPNW_HOME") {
        return PathBuf::from(dir);
    }
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".vpnw"),
        None => PathBuf::from(".vpnw"),
    }
}

/// Reads a JSON file, returning the default value when it does not exist.
pub fn load_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    serde_json::to_writer_pretty(&mut tmp, value).context("Failed to serialize state")?;
    tmp.write_all(b"\n")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
