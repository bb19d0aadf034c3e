//! Basemap style values.
//!
//! Styles are immutable: switching basemaps swaps the whole descriptor.
//!
//! # Tile Sources
//!
//! - Streets: OpenStreetMap standard raster tiles
//! - Satellite: Esri World Imagery (`/tile/{z}/{y}/{x}`, zoom 0-19)
//! - Hybrid: World Imagery with the Esri boundaries and places overlay

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// OpenStreetMap standard tile template.
const OSM_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Esri World Imagery tile template.
const ARCGIS_IMAGERY_URL: &str =
    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}";

/// Esri reference labels drawn over imagery in the hybrid style.
const ARCGIS_LABELS_URL: &str = "https://server.arcgisonline.com/ArcGIS/rest/services/Reference/World_Boundaries_and_Places/MapServer/tile/{z}/{y}/{x}";

/// Maximum zoom level served by both tile families.
const MAX_ZOOM: u8 = 19;

/// Available basemaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasemapStyle {
    #[default]
    Streets,
    Satellite,
    Hybrid,
}

impl BasemapStyle {
    /// All styles, in menu order.
    pub const ALL: [BasemapStyle; 3] = [
        BasemapStyle::Streets,
        BasemapStyle::Satellite,
        BasemapStyle::Hybrid,
    ];

    /// Preference and configuration spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            BasemapStyle::Streets => "streets",
            BasemapStyle::Satellite => "satellite",
            BasemapStyle::Hybrid => "hybrid",
        }
    }

    /// Style definition for this basemap.
    pub fn descriptor(&self) -> StyleDescriptor {
        match self {
            BasemapStyle::Streets => StyleDescriptor {
                name: "Streets",
                raster_layers: vec![OSM_TILE_URL.to_string()],
                attribution: "© OpenStreetMap contributors".to_string(),
                min_zoom: 0,
                max_zoom: MAX_ZOOM,
            },
            BasemapStyle::Satellite => StyleDescriptor {
                name: "Satellite",
                raster_layers: vec![ARCGIS_IMAGERY_URL.to_string()],
                attribution: "Esri, Maxar, Earthstar Geographics".to_string(),
                min_zoom: 0,
                max_zoom: MAX_ZOOM,
            },
            BasemapStyle::Hybrid => StyleDescriptor {
                name: "Hybrid",
                raster_layers: vec![
                    ARCGIS_IMAGERY_URL.to_string(),
                    ARCGIS_LABELS_URL.to_string(),
                ],
                attribution: "Esri, Maxar, Earthstar Geographics".to_string(),
                min_zoom: 0,
                max_zoom: MAX_ZOOM,
            },
        }
    }
}

impl FromStr for BasemapStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "streets" | "street" => Ok(BasemapStyle::Streets),
            "satellite" | "imagery" => Ok(BasemapStyle::Satellite),
            "hybrid" => Ok(BasemapStyle::Hybrid),
            other => Err(format!("unknown basemap style '{}'", other)),
        }
    }
}

impl fmt::Display for BasemapStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendering definition of a basemap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleDescriptor {
    /// Display name.
    pub name: &'static str,
    /// Raster tile URL templates, bottom layer first.
    pub raster_layers: Vec<String>,
    pub attribution: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

/// A style whose resources finished loading and can be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedStyle {
    pub style: BasemapStyle,
    pub descriptor: StyleDescriptor,
}

impl LoadedStyle {
    /// Loaded form of a style using its built-in descriptor.
    pub fn new(style: BasemapStyle) -> Self {
        Self {
            style,
            descriptor: style.descriptor(),
        }
    }
}

/// Expand a `{z}/{x}/{y}` template for one tile.
pub fn expand_tile_template(template: &str, z: u8, x: u32, y: u32) -> String {
    template
        .replace("{z}", &z.to_string())
        .replace("{x}", &x.to_string())
        .replace("{y}", &y.to_string())
}
