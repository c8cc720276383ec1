//! Dashboard settings store.
//!
//! A single JSON blob persisted next to the log files, always served merged
//! over built-in defaults: stored keys win, anything missing falls back.
//! A missing or unreadable file is replaced with defaults rather than
//! treated as fatal; settings are convenience state, telemetry is not.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Errors persisting the settings blob.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings encode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The settings blob: free-form `meta` (labels, descriptions) and `config`
/// (per-sensor tuning) maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub meta: BTreeMap<String, Value>,
    pub config: BTreeMap<String, Value>,
}

impl Settings {
    /// Built-in defaults for a fresh deployment.
    pub fn defaults() -> Self {
        let mut meta = BTreeMap::new();
        meta.insert("site".to_string(), json!("unnamed-site"));
        meta.insert(
            "sensors".to_string(),
            json!(["accelerometer", "inclinometer", "temperature"]),
        );

        let mut config = BTreeMap::new();
        config.insert(
            "accelerometer".to_string(),
            json!({"unit": "g", "sample_rate_hz": 2.0}),
        );
        config.insert(
            "inclinometer".to_string(),
            json!({"unit": "deg", "sample_rate_hz": 1.0}),
        );
        config.insert(
            "temperature".to_string(),
            json!({"unit": "degC", "sample_rate_hz": 0.2}),
        );
        config.insert(
            "display".to_string(),
            json!({"window_minutes": 60, "max_points": 500}),
        );

        Settings { meta, config }
    }

    /// Overlay `self` onto the defaults: present keys win, absent keys fall
    /// back.
    fn merged_over_defaults(self) -> Self {
        let mut merged = Settings::defaults();
        merged.meta.extend(self.meta);
        merged.config.extend(self.config);
        merged
    }
}

/// Thread-safe handle to the persisted settings. Clones share state.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    current: RwLock<Settings>,
}

impl SettingsStore {
    /// Open (or initialize) the settings file at `path`.
    ///
    /// A missing file is created with defaults; an unparseable one is
    /// logged, reset to defaults and overwritten.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();

        let settings = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Settings>(&bytes) {
                Ok(parsed) => parsed.merged_over_defaults(),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Settings file unreadable, resetting to defaults"
                    );
                    Settings::defaults()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::defaults(),
            Err(e) => return Err(e.into()),
        };

        persist(&path, &settings)?;

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                current: RwLock::new(settings),
            }),
        })
    }

    /// Current settings (already merged over defaults).
    pub fn get(&self) -> Settings {
        self.inner
            .current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the stored settings. The replacement is merged over defaults,
    /// persisted, and returned.
    pub fn update(&self, replacement: Settings) -> Result<Settings, SettingsError> {
        let merged = replacement.merged_over_defaults();
        persist(&self.inner.path, &merged)?;

        let mut guard = self
            .inner
            .current
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *guard = merged.clone();
        Ok(merged)
    }
}

fn persist(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let body = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_initialized_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.get(), Settings::defaults());
        assert!(path.exists());
    }

    #[test]
    fn test_update_persists_and_merges() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::open(&path).unwrap();

        let mut patch = Settings::default();
        patch.meta.insert("site".into(), json!("turbine-7"));
        let merged = store.update(patch).unwrap();

        assert_eq!(merged.meta["site"], json!("turbine-7"));
        // Untouched defaults survive the update.
        assert!(merged.config.contains_key("temperature"));

        // A fresh store sees the persisted value.
        let reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.get().meta["site"], json!("turbine-7"));
    }

    #[test]
    fn test_corrupt_file_reset_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.get(), Settings::defaults());

        // The file itself was rewritten to something valid.
        let raw = std::fs::read(&path).unwrap();
        assert!(serde_json::from_slice::<Settings>(&raw).is_ok());
    }

    #[test]
    fn test_unknown_keys_roundtrip() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("s.json")).unwrap();

        let mut patch = Settings::default();
        patch.config.insert("alerting".into(), json!({"threshold_g": 1.5}));
        let merged = store.update(patch).unwrap();
        assert_eq!(merged.config["alerting"]["threshold_g"], json!(1.5));
    }
}
