use crate::reminder::backend::BackendKind;
use crate::scheduler::DEFAULT_QUIET_MS;
use crate::storage::atomic_write;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// App configuration stored in config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which notification backend to use for due reminders
    #[serde(default)]
    pub backend: BackendKind,
    /// Quiet interval before pending edits are flushed to disk
    #[serde(default = "default_quiet_ms")]
    pub save_quiet_ms: u64,
    /// Delimiter splitting "category: item" entry text
    #[serde(default = "default_delimiter")]
    pub category_delimiter: String,
}

fn default_quiet_ms() -> u64 {
    DEFAULT_QUIET_MS
}

fn default_delimiter() -> String {
    crate::domain::DEFAULT_DELIMITER.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            save_quiet_ms: default_quiet_ms(),
            category_delimiter: default_delimiter(),
        }
    }
}

/// Load config from config.json; a missing file means defaults, and a
/// broken file is logged and replaced with defaults rather than
/// refusing to start.
pub fn load_config<P: AsRef<Path>>(path: P) -> AppConfig {
    let path = path.as_ref();
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|content| Ok(serde_json::from_str::<AppConfig>(&content)?))
    {
        Ok(config) => config,
        Err(e) => {
            warn!("could not read {}: {e}; using defaults", path.display());
            AppConfig::default()
        }
    }
}

/// Load config, writing the default file on first run so there is
/// something on disk to edit. A write failure is logged; the in-memory
/// defaults are used either way.
pub fn load_or_init<P: AsRef<Path>>(path: P) -> AppConfig {
    let path = path.as_ref();
    if !path.exists() {
        let config = AppConfig::default();
        if let Err(e) = save_config(path, &config) {
            warn!("could not write default {}: {e:#}", path.display());
        }
        return config;
    }
    load_config(path)
}

/// Save config to config.json
pub fn save_config<P: AsRef<Path>>(path: P, config: &AppConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    atomic_write(path, &json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_nonexistent_config_is_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = load_config(&path);
        assert_eq!(config.backend, BackendKind::Console);
        assert_eq!(config.save_quiet_ms, DEFAULT_QUIET_MS);
        assert_eq!(config.category_delimiter, ":");
    }

    #[test]
    fn test_save_and_load_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = AppConfig {
            backend: BackendKind::Desktop,
            save_quiet_ms: 5000,
            category_delimiter: "/".to_string(),
        };
        save_config(&path, &config).unwrap();

        let loaded = load_config(&path);
        assert_eq!(loaded.backend, BackendKind::Desktop);
        assert_eq!(loaded.save_quiet_ms, 5000);
        assert_eq!(loaded.category_delimiter, "/");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"backend": "desktop"}"#).unwrap();

        let config = load_config(&path);
        assert_eq!(config.backend, BackendKind::Desktop);
        assert_eq!(config.save_quiet_ms, DEFAULT_QUIET_MS);
    }

    #[test]
    fn test_load_or_init_writes_default_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = load_or_init(&path);
        assert_eq!(config.backend, BackendKind::Console);
        assert!(path.exists());

        // Hand-edits to the materialized file are picked up next time
        std::fs::write(&path, r#"{"backend": "desktop"}"#).unwrap();
        assert_eq!(load_or_init(&path).backend, BackendKind::Desktop);
    }

    #[test]
    fn test_broken_config_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json at all").unwrap();

        let config = load_config(&path);
        assert_eq!(config.backend, BackendKind::Console);
    }
}
