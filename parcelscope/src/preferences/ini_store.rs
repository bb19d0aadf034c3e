//! INI-file backed preference store.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ini::Ini;
use parking_lot::Mutex;

use super::{PreferenceError, PreferenceStore};

/// Section holding all preference entries.
const SECTION: &str = "preferences";

/// Default file name inside the configuration directory.
pub const PREFERENCES_FILE_NAME: &str = "preferences.ini";

/// Durable store persisting to a single INI file.
///
/// The whole file is rewritten on every change. Preference writes happen on
/// user toggles, so write volume stays low.
#[derive(Debug)]
pub struct IniPreferenceStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl IniPreferenceStore {
    /// Open the store at `path`, loading existing entries if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PreferenceError> {
        let path = path.into();
        let values = if path.exists() {
            load_entries(&path)?
        } else {
            BTreeMap::new()
        };

        tracing::debug!(path = %path.display(), entries = values.len(), "Opened preference store");

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), PreferenceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| PreferenceError::Io {
                path: self.path.clone(),
                source,
            })?;
        }

        let mut ini = Ini::new();
        for (key, value) in values {
            ini.with_section(Some(SECTION)).set(key.as_str(), value.as_str());
        }
        ini.write_to_file(&self.path)
            .map_err(|source| PreferenceError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

fn load_entries(path: &Path) -> Result<BTreeMap<String, String>, PreferenceError> {
    let ini = Ini::load_from_file(path).map_err(|e| match e {
        ini::Error::Io(source) => PreferenceError::Io {
            path: path.to_path_buf(),
            source,
        },
        ini::Error::Parse(parse) => PreferenceError::Parse {
            path: path.to_path_buf(),
            message: parse.to_string(),
        },
    })?;

    Ok(ini
        .section(Some(SECTION))
        .map(|props| {
            props
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default())
}

impl PreferenceStore for IniPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        let mut values = self.values.lock();
        if values.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }

    fn remove(&self, key: &str) -> Result<(), PreferenceError> {
        let mut values = self.values.lock();
        if values.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&values)
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.values
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(PREFERENCES_FILE_NAME);

        {
            let store = IniPreferenceStore::open(&path).unwrap();
            store.set("basemap.style", "satellite").unwrap();
            store.set("layer.flood.opacity", "0.4").unwrap();
        }

        let reopened = IniPreferenceStore::open(&path).unwrap();
        assert_eq!(reopened.get("basemap.style").as_deref(), Some("satellite"));
        assert_eq!(reopened.get("layer.flood.opacity").as_deref(), Some("0.4"));
    }

    #[test]
    fn test_remove_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PREFERENCES_FILE_NAME);

        let store = IniPreferenceStore::open(&path).unwrap();
        store.set("layer.water.visible", "true").unwrap();
        store.remove("layer.water.visible").unwrap();

        let reopened = IniPreferenceStore::open(&path).unwrap();
        assert_eq!(reopened.get("layer.water.visible"), None);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = IniPreferenceStore::open(dir.path().join("absent.ini")).unwrap();
        assert!(store.entries().is_empty());
        assert!(!store.path().exists());
    }
}
