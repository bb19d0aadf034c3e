//! Configuration
//!
//! [`ConfigFile`] mirrors the INI file on disk; [`EngineConfig`] is the typed
//! runtime configuration derived from it.

mod file;

pub use file::{
    BasemapSettings, ConfigFile, LoggingSettings, MeasurementSettings, PreferenceSettings,
    ProviderSettings, ResolutionSettings, CONFIG_DIR_NAME, CONFIG_FILE_NAME,
};

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::basemap::BasemapStyle;
use crate::geometry::{UnitSystem, DEFAULT_BUFFER_SEGMENTS};
use crate::logging::LoggingConfig;
use crate::resolution::ResolutionConfig;

/// Errors raised while reading or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Runtime engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Basemap used when no style preference is stored.
    pub default_style: BasemapStyle,
    pub resolution: ResolutionConfig,
    pub units: UnitSystem,
    /// Vertices in measurement buffer circles.
    pub buffer_segments: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_style: BasemapStyle::default(),
            resolution: ResolutionConfig::default(),
            units: UnitSystem::default(),
            buffer_segments: DEFAULT_BUFFER_SEGMENTS,
        }
    }
}

impl EngineConfig {
    /// Derive the runtime configuration from the configuration file.
    pub fn from_config_file(config: &ConfigFile) -> Self {
        let resolution = ResolutionConfig::default()
            .with_min_zoom(config.resolution.min_zoom)
            .with_fallback_debounce(Duration::from_millis(config.resolution.fallback_debounce_ms))
            .with_coordinate_timeout(Duration::from_secs(config.resolution.coordinate_timeout_secs))
            .with_enrichment_timeout(Duration::from_secs(config.resolution.enrichment_timeout_secs))
            .with_parcel_id_property(config.resolution.parcel_id_property.clone())
            .with_tile_opt_out(config.resolution.tile_opt_out);

        Self {
            default_style: config.basemap.default,
            resolution,
            units: config.measurement.units,
            buffer_segments: DEFAULT_BUFFER_SEGMENTS,
        }
    }

    pub fn with_default_style(mut self, style: BasemapStyle) -> Self {
        self.default_style = style;
        self
    }

    pub fn with_resolution(mut self, resolution: ResolutionConfig) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_units(mut self, units: UnitSystem) -> Self {
        self.units = units;
        self
    }

    pub fn with_buffer_segments(mut self, segments: usize) -> Self {
        self.buffer_segments = segments;
        self
    }
}

impl From<&LoggingSettings> for LoggingConfig {
    fn from(settings: &LoggingSettings) -> Self {
        LoggingConfig {
            level: settings.level.clone(),
            file: settings.file.clone(),
            ..LoggingConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_from_file() {
        let mut file = ConfigFile::default();
        file.basemap.default = BasemapStyle::Hybrid;
        file.resolution.min_zoom = 13.0;
        file.resolution.fallback_debounce_ms = 250;
        file.resolution.tile_opt_out = true;
        file.measurement.units = UnitSystem::Metric;

        let config = EngineConfig::from_config_file(&file);
        assert_eq!(config.default_style, BasemapStyle::Hybrid);
        assert_eq!(config.resolution.min_zoom, 13.0);
        assert_eq!(config.resolution.fallback_debounce, Duration::from_millis(250));
        assert!(config.resolution.tile_opt_out);
        assert_eq!(config.units, UnitSystem::Metric);
    }

    #[test]
    fn test_logging_config_from_settings() {
        let settings = LoggingSettings {
            level: "debug".into(),
            file: Some(PathBuf::from("/var/log/parcelscope.log")),
        };
        let config = LoggingConfig::from(&settings);
        assert_eq!(config.level, "debug");
        assert!(config.ansi);
    }
}
