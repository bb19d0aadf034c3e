//! INI configuration file.
//!
//! ```ini
//! [basemap]
//! default = streets
//!
//! [resolution]
//! min_zoom = 14
//! fallback_debounce_ms = 500
//! coordinate_timeout_secs = 10
//! enrichment_timeout_secs = 10
//! parcel_id_property = parcel_id
//! tile_opt_out = false
//!
//! [providers]
//! report_url = https://reports.example.com/api
//! fallback_url = https://gis.example.com/parcels
//! parcel_tiles_url = https://tiles.example.com/parcels/{z}/{x}/{y}.pbf
//! request_timeout_secs = 30
//!
//! [measurement]
//! units = imperial
//!
//! [preferences]
//! path = /home/me/.config/parcelscope/preferences.ini
//!
//! [logging]
//! level = info
//! file = /home/me/.local/state/parcelscope/parcelscope.log
//! ```
//!
//! Missing files, sections and keys fall back to defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;

use super::ConfigError;
use crate::basemap::BasemapStyle;
use crate::geometry::UnitSystem;
use crate::logging::DEFAULT_LOG_LEVEL;
use crate::preferences::PREFERENCES_FILE_NAME;
use crate::provider::DEFAULT_HTTP_TIMEOUT_SECS;
use crate::resolution::{
    DEFAULT_COORDINATE_TIMEOUT_SECS, DEFAULT_ENRICHMENT_TIMEOUT_SECS,
    DEFAULT_FALLBACK_DEBOUNCE_MS, DEFAULT_MIN_ZOOM, DEFAULT_PARCEL_ID_PROPERTY,
};

/// Directory name under the platform config directory.
pub const CONFIG_DIR_NAME: &str = "parcelscope";

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BasemapSettings {
    pub default: BasemapStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionSettings {
    pub min_zoom: f64,
    pub fallback_debounce_ms: u64,
    pub coordinate_timeout_secs: u64,
    pub enrichment_timeout_secs: u64,
    pub parcel_id_property: String,
    pub tile_opt_out: bool,
}

impl Default for ResolutionSettings {
    fn default() -> Self {
        Self {
            min_zoom: DEFAULT_MIN_ZOOM,
            fallback_debounce_ms: DEFAULT_FALLBACK_DEBOUNCE_MS,
            coordinate_timeout_secs: DEFAULT_COORDINATE_TIMEOUT_SECS,
            enrichment_timeout_secs: DEFAULT_ENRICHMENT_TIMEOUT_SECS,
            parcel_id_property: DEFAULT_PARCEL_ID_PROPERTY.to_string(),
            tile_opt_out: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub report_url: Option<String>,
    pub fallback_url: Option<String>,
    pub parcel_tiles_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            report_url: None,
            fallback_url: None,
            parcel_tiles_url: None,
            request_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeasurementSettings {
    pub units: UnitSystem,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PreferenceSettings {
    /// Preference file; next to the config file when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigFile {
    pub basemap: BasemapSettings,
    pub resolution: ResolutionSettings,
    pub providers: ProviderSettings,
    pub measurement: MeasurementSettings,
    pub preferences: PreferenceSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(parse) => ConfigError::Parse {
                path: path.to_path_buf(),
                message: parse.to_string(),
            },
        })?;
        Self::from_ini(&ini)
    }

    /// Parse an already loaded INI document.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let defaults = ResolutionSettings::default();
        let provider_defaults = ProviderSettings::default();

        Ok(Self {
            basemap: BasemapSettings {
                default: parse_or(ini, "basemap", "default", BasemapStyle::default())?,
            },
            resolution: ResolutionSettings {
                min_zoom: parse_or(ini, "resolution", "min_zoom", defaults.min_zoom)?,
                fallback_debounce_ms: parse_or(
                    ini,
                    "resolution",
                    "fallback_debounce_ms",
                    defaults.fallback_debounce_ms,
                )?,
                coordinate_timeout_secs: parse_or(
                    ini,
                    "resolution",
                    "coordinate_timeout_secs",
                    defaults.coordinate_timeout_secs,
                )?,
                enrichment_timeout_secs: parse_or(
                    ini,
                    "resolution",
                    "enrichment_timeout_secs",
                    defaults.enrichment_timeout_secs,
                )?,
                parcel_id_property: text(ini, "resolution", "parcel_id_property")
                    .unwrap_or(defaults.parcel_id_property),
                tile_opt_out: parse_or(ini, "resolution", "tile_opt_out", defaults.tile_opt_out)?,
            },
            providers: ProviderSettings {
                report_url: text(ini, "providers", "report_url"),
                fallback_url: text(ini, "providers", "fallback_url"),
                parcel_tiles_url: text(ini, "providers", "parcel_tiles_url"),
                request_timeout_secs: parse_or(
                    ini,
                    "providers",
                    "request_timeout_secs",
                    provider_defaults.request_timeout_secs,
                )?,
            },
            measurement: MeasurementSettings {
                units: parse_or(ini, "measurement", "units", UnitSystem::default())?,
            },
            preferences: PreferenceSettings {
                path: text(ini, "preferences", "path").map(PathBuf::from),
            },
            logging: LoggingSettings {
                level: text(ini, "logging", "level").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
                file: text(ini, "logging", "file").map(PathBuf::from),
            },
        })
    }

    /// Write every setting to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut ini = Ini::new();
        ini.with_section(Some("basemap"))
            .set("default", self.basemap.default.as_str());
        ini.with_section(Some("resolution"))
            .set("min_zoom", self.resolution.min_zoom.to_string())
            .set("fallback_debounce_ms", self.resolution.fallback_debounce_ms.to_string())
            .set("coordinate_timeout_secs", self.resolution.coordinate_timeout_secs.to_string())
            .set("enrichment_timeout_secs", self.resolution.enrichment_timeout_secs.to_string())
            .set("parcel_id_property", self.resolution.parcel_id_property.as_str())
            .set("tile_opt_out", self.resolution.tile_opt_out.to_string());

        let mut providers = ini.with_section(Some("providers"));
        providers.set("request_timeout_secs", self.providers.request_timeout_secs.to_string());
        for (key, value) in [
            ("report_url", &self.providers.report_url),
            ("fallback_url", &self.providers.fallback_url),
            ("parcel_tiles_url", &self.providers.parcel_tiles_url),
        ] {
            if let Some(value) = value {
                providers.set(key, value.as_str());
            }
        }

        ini.with_section(Some("measurement"))
            .set("units", self.measurement.units.as_str());
        if let Some(path) = &self.preferences.path {
            ini.with_section(Some("preferences"))
                .set("path", path.display().to_string());
        }
        let mut logging = ini.with_section(Some("logging"));
        logging.set("level", self.logging.level.as_str());
        if let Some(file) = &self.logging.file {
            logging.set("file", file.display().to_string());
        }

        ini.write_to_file(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Preference file path, resolved against the config file location.
    pub fn preferences_path(&self, config_path: &Path) -> PathBuf {
        self.preferences.path.clone().unwrap_or_else(|| {
            config_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(PREFERENCES_FILE_NAME)
        })
    }
}

/// Non-empty trimmed value of a key.
fn text(ini: &Ini, section: &str, key: &str) -> Option<String> {
    ini.get_from(Some(section), key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_or<T>(ini: &Ini, section: &str, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match text(ini, section, key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.clone(),
            reason: e.to_string(),
        }),
    }
}
