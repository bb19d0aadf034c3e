//! Parcel resolution
//!
//! Answers "which parcel is under this point" through three tiers tried in
//! strict priority order:
//!
//! 1. **Tile**: rendered features of the parcel tile layer, enriched by the
//!    report data provider (raw tile attributes when enrichment fails)
//! 2. **Fallback**: point-in-polygon against the last applied viewport
//!    snapshot from the fallback polygon provider, only while the tile tier
//!    is unavailable
//! 3. **Coordinate query**: point lookup against the report data provider
//!
//! The first tier producing a feature ends the click. Below the minimum
//! zoom no tier runs and the outcome is a zoom advisory.

mod chain;
mod fallback;
mod feature;

pub use chain::{ParcelResolver, TileFeatureSource, TileTierStatus};
pub use fallback::{FallbackSink, FallbackSnapshot, FallbackTier};
pub use feature::{attributes_from_json, AttributeValue, Attributes, ParcelFeature, Provenance};

use std::time::Duration;

use serde::Serialize;

use crate::geometry::Bounds;

/// Minimum zoom at which parcels can be resolved.
pub const DEFAULT_MIN_ZOOM: f64 = 14.0;

/// Quiet period before a fallback fetch is issued for a viewport.
pub const DEFAULT_FALLBACK_DEBOUNCE_MS: u64 = 500;

/// Time allowed for a coordinate query.
pub const DEFAULT_COORDINATE_TIMEOUT_SECS: u64 = 10;

/// Time allowed for an enrichment lookup.
pub const DEFAULT_ENRICHMENT_TIMEOUT_SECS: u64 = 10;

/// Property holding the parcel identifier in tile and fallback features.
pub const DEFAULT_PARCEL_ID_PROPERTY: &str = "parcel_id";

/// Resolution chain tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionConfig {
    /// Clicks below this zoom yield [`ResolutionOutcome::ZoomIn`].
    pub min_zoom: f64,
    pub fallback_debounce: Duration,
    pub coordinate_timeout: Duration,
    pub enrichment_timeout: Duration,
    pub parcel_id_property: String,
    /// Treat the tile tier as unavailable from the start.
    pub tile_opt_out: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            min_zoom: DEFAULT_MIN_ZOOM,
            fallback_debounce: Duration::from_millis(DEFAULT_FALLBACK_DEBOUNCE_MS),
            coordinate_timeout: Duration::from_secs(DEFAULT_COORDINATE_TIMEOUT_SECS),
            enrichment_timeout: Duration::from_secs(DEFAULT_ENRICHMENT_TIMEOUT_SECS),
            parcel_id_property: DEFAULT_PARCEL_ID_PROPERTY.to_string(),
            tile_opt_out: false,
        }
    }
}

impl ResolutionConfig {
    pub fn with_min_zoom(mut self, min_zoom: f64) -> Self {
        self.min_zoom = min_zoom;
        self
    }

    pub fn with_fallback_debounce(mut self, debounce: Duration) -> Self {
        self.fallback_debounce = debounce;
        self
    }

    pub fn with_coordinate_timeout(mut self, timeout: Duration) -> Self {
        self.coordinate_timeout = timeout;
        self
    }

    pub fn with_enrichment_timeout(mut self, timeout: Duration) -> Self {
        self.enrichment_timeout = timeout;
        self
    }

    pub fn with_parcel_id_property(mut self, property: impl Into<String>) -> Self {
        self.parcel_id_property = property.into();
        self
    }

    pub fn with_tile_opt_out(mut self, opt_out: bool) -> Self {
        self.tile_opt_out = opt_out;
        self
    }
}

/// Current camera position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub zoom: f64,
    pub bounds: Bounds,
}

impl ViewportState {
    pub fn new(zoom: f64, bounds: Bounds) -> Self {
        Self { zoom, bounds }
    }
}

/// Result of resolving one click.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    /// A tier produced a parcel.
    Resolved(ParcelFeature),
    /// Every tier came back empty. Not an error.
    NotFound,
    /// The view is zoomed out too far; nothing was queried.
    ZoomIn { min_zoom: f64 },
}

impl ResolutionOutcome {
    /// The resolved parcel, if any.
    pub fn parcel(&self) -> Option<&ParcelFeature> {
        match self {
            ResolutionOutcome::Resolved(parcel) => Some(parcel),
            _ => None,
        }
    }
}

/// Which tiers are currently usable.
///
/// Derived on demand from the tile tier status and the viewport.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ResolutionTierState {
    pub tile_source_ready: bool,
    pub fallback_active: bool,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_config_defaults() {
        let config = ResolutionConfig::default();
        assert_eq!(config.min_zoom, 14.0);
        assert_eq!(config.fallback_debounce, Duration::from_millis(500));
        assert_eq!(config.parcel_id_property, "parcel_id");
        assert!(!config.tile_opt_out);
    }

    #[test]
    fn test_resolution_config_builder() {
        let config = ResolutionConfig::default()
            .with_min_zoom(12.0)
            .with_fallback_debounce(Duration::from_millis(250))
            .with_parcel_id_property("apn")
            .with_tile_opt_out(true);
        assert_eq!(config.min_zoom, 12.0);
        assert_eq!(config.fallback_debounce, Duration::from_millis(250));
        assert_eq!(config.parcel_id_property, "apn");
        assert!(config.tile_opt_out);
    }

    #[test]
    fn test_outcome_parcel_accessor() {
        assert!(ResolutionOutcome::NotFound.parcel().is_none());
        assert!(ResolutionOutcome::ZoomIn { min_zoom: 14.0 }.parcel().is_none());
    }
}
