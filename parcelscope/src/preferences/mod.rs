//! Durable key/value preference persistence.
//!
//! Components receive an `Arc<dyn PreferenceStore>` at construction instead
//! of reaching for global state. Each setting has exactly one writer: the
//! basemap controller owns the style key, the layer registry owns the
//! per-layer visibility and opacity keys.
//!
//! # Key Layout
//!
//! | Key                   | Value                         |
//! |-----------------------|-------------------------------|
//! | `basemap.style`       | `streets`, `satellite`, `hybrid` |
//! | `layer.<id>.visible`  | `true` / `false`              |
//! | `layer.<id>.opacity`  | float in `[0, 1]`             |

mod ini_store;
mod memory;

pub use ini_store::{IniPreferenceStore, PREFERENCES_FILE_NAME};
pub use memory::MemoryPreferenceStore;

use std::path::PathBuf;

use thiserror::Error;

/// Key under which the active basemap style is stored.
pub const BASEMAP_STYLE_KEY: &str = "basemap.style";

/// Errors raised by preference stores.
#[derive(Debug, Error)]
pub enum PreferenceError {
    /// Reading or writing the backing file failed.
    #[error("Failed to persist preferences to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file exists but could not be parsed.
    #[error("Malformed preference file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Durable key/value persistence.
///
/// Implementations must be cheap to read; callers consult the store on
/// every layer registration.
pub trait PreferenceStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), PreferenceError>;

    /// All stored entries, sorted by key.
    fn entries(&self) -> Vec<(String, String)>;
}

/// Key holding a layer's visibility.
pub fn layer_visibility_key(layer_id: &str) -> String {
    format!("layer.{}.visible", layer_id)
}

/// Key holding a layer's opacity.
pub fn layer_opacity_key(layer_id: &str) -> String {
    format!("layer.{}.opacity", layer_id)
}

/// Typed read of a layer's persisted visibility.
///
/// Values that fail to parse are ignored so a hand-edited file cannot
/// break registration.
pub fn read_layer_visibility(store: &dyn PreferenceStore, layer_id: &str) -> Option<bool> {
    let key = layer_visibility_key(layer_id);
    let raw = store.get(&key)?;
    match raw.trim() {
        "true" => Some(true),
        "false" => Some(false),
        other => {
            tracing::warn!(key = %key, value = other, "Ignoring unparsable visibility preference");
            None
        }
    }
}

/// Typed read of a layer's persisted opacity, clamped to `[0, 1]`.
pub fn read_layer_opacity(store: &dyn PreferenceStore, layer_id: &str) -> Option<f32> {
    let key = layer_opacity_key(layer_id);
    let raw = store.get(&key)?;
    match raw.trim().parse::<f32>() {
        Ok(v) if v.is_finite() => Some(v.clamp(0.0, 1.0)),
        _ => {
            tracing::warn!(key = %key, value = %raw, "Ignoring unparsable opacity preference");
            None
        }
    }
}

/// Persisted layer settings split out of the flat key space.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerPreference {
    pub layer_id: String,
    pub visible: Option<bool>,
    pub opacity: Option<f32>,
}

/// Collect all persisted layer settings, sorted by layer id.
pub fn layer_preferences(store: &dyn PreferenceStore) -> Vec<LayerPreference> {
    let mut ids: Vec<String> = store
        .entries()
        .into_iter()
        .filter_map(|(key, _)| {
            let rest = key.strip_prefix("layer.")?;
            let id = rest
                .strip_suffix(".visible")
                .or_else(|| rest.strip_suffix(".opacity"))?;
            Some(id.to_string())
        })
        .collect();
    ids.sort();
    ids.dedup();

    ids.into_iter()
        .map(|layer_id| LayerPreference {
            visible: read_layer_visibility(store, &layer_id),
            opacity: read_layer_opacity(store, &layer_id),
            layer_id,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_layer_reads() {
        let store = MemoryPreferenceStore::new();
        store.set(&layer_visibility_key("flood"), "false").unwrap();
        store.set(&layer_opacity_key("flood"), "0.35").unwrap();

        assert_eq!(read_layer_visibility(&store, "flood"), Some(false));
        assert_eq!(read_layer_opacity(&store, "flood"), Some(0.35));
        assert_eq!(read_layer_visibility(&store, "sewer"), None);
    }

    #[test]
    fn test_unparsable_values_are_ignored() {
        let store = MemoryPreferenceStore::new();
        store.set(&layer_visibility_key("water"), "maybe").unwrap();
        store.set(&layer_opacity_key("water"), "NaN").unwrap();

        assert_eq!(read_layer_visibility(&store, "water"), None);
        assert_eq!(read_layer_opacity(&store, "water"), None);
    }

    #[test]
    fn test_opacity_is_clamped() {
        let store = MemoryPreferenceStore::new();
        store.set(&layer_opacity_key("zoning"), "1.7").unwrap();
        assert_eq!(read_layer_opacity(&store, "zoning"), Some(1.0));
    }

    #[test]
    fn test_layer_preferences_groups_by_layer() {
        let store = MemoryPreferenceStore::new();
        store.set(BASEMAP_STYLE_KEY, "satellite").unwrap();
        store.set(&layer_visibility_key("storm"), "true").unwrap();
        store.set(&layer_opacity_key("storm"), "0.5").unwrap();
        store.set(&layer_opacity_key("flood"), "0.8").unwrap();

        let prefs = layer_preferences(&store);
        assert_eq!(prefs.len(), 2);
        assert_eq!(prefs[0].layer_id, "flood");
        assert_eq!(prefs[0].visible, None);
        assert_eq!(prefs[1].layer_id, "storm");
        assert_eq!(prefs[1].visible, Some(true));
        assert_eq!(prefs[1].opacity, Some(0.5));
    }
}
