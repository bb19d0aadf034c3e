//! Render surface abstraction
//!
//! The map canvas is an imperative, stateful object: sources and paint layers
//! are added and removed one call at a time and a style swap wipes them all.
//! This module describes that contract as the [`RenderSurface`] trait so the
//! rest of the engine can be driven against a real canvas or the in-memory
//! [`HeadlessSurface`].
//!
//! # Ownership
//!
//! Only the layer registry adds or removes sources and paint layers, and
//! only the basemap controller applies styles. Everything else reads through
//! [`SharedSurface::query_rendered_features`].

mod headless;

pub use headless::{HeadlessSurface, TileServer, DEFAULT_HIT_TOLERANCE_METERS};

use std::fmt;
use std::sync::Arc;

use geojson::FeatureCollection;
use parking_lot::{Mutex, MutexGuard};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::basemap::{BasemapStyle, LoadedStyle};
use crate::geometry::LngLat;

/// Layout property toggling paint layer visibility.
pub const VISIBILITY_PROPERTY: &str = "visibility";

/// Errors reported by a render surface.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SurfaceError {
    /// A source with this id already exists.
    #[error("Source '{0}' already exists")]
    DuplicateSource(String),

    /// A paint layer with this id already exists.
    #[error("Layer '{0}' already exists")]
    DuplicateLayer(String),

    /// No source with this id exists.
    #[error("Source '{0}' does not exist")]
    UnknownSource(String),

    /// No paint layer with this id exists.
    #[error("Layer '{0}' does not exist")]
    UnknownLayer(String),

    /// No style has finished loading yet.
    #[error("No style loaded")]
    NoStyle,

    /// The surface refused the object (bad data, bad property).
    #[error("Rejected by surface: {0}")]
    Rejected(String),
}

/// Clustering options for point sources.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterOptions {
    /// Cluster radius in pixels.
    pub radius: u32,
    /// Zoom above which points are no longer clustered.
    pub max_zoom: u8,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            radius: 50,
            max_zoom: 14,
        }
    }
}

/// Data backing a source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    /// Inline GeoJSON, optionally clustered.
    GeoJson {
        data: FeatureCollection,
        cluster: Option<ClusterOptions>,
    },
    /// Vector tiles served from URL templates.
    VectorTiles {
        tiles: Vec<String>,
        source_layer: String,
        min_zoom: u8,
        max_zoom: u8,
    },
    /// Raster tiles, used by basemap styles.
    Raster { tiles: Vec<String>, tile_size: u32 },
}

/// Kind of paint layer, which also selects its opacity property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaintKind {
    Fill,
    Line,
    Circle,
    Symbol,
    Raster,
}

impl PaintKind {
    /// Paint properties carrying opacity for this kind.
    pub fn opacity_properties(&self) -> &'static [&'static str] {
        match self {
            PaintKind::Fill => &["fill-opacity"],
            PaintKind::Line => &["line-opacity"],
            PaintKind::Circle => &["circle-opacity", "circle-stroke-opacity"],
            PaintKind::Symbol => &["icon-opacity", "text-opacity"],
            PaintKind::Raster => &["raster-opacity"],
        }
    }

    /// Style-document spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaintKind::Fill => "fill",
            PaintKind::Line => "line",
            PaintKind::Circle => "circle",
            PaintKind::Symbol => "symbol",
            PaintKind::Raster => "raster",
        }
    }
}

impl fmt::Display for PaintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A paint layer drawing one source.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintLayer {
    pub id: String,
    pub source_id: String,
    pub kind: PaintKind,
    /// Layer inside a vector tile source.
    pub source_layer: Option<String>,
    pub min_zoom: Option<f64>,
    pub paint: Map<String, Value>,
    pub layout: Map<String, Value>,
}

/// A feature returned by a rendered-feature query.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFeature {
    /// Paint layer the feature was drawn by.
    pub layer_id: String,
    pub source_id: String,
    pub id: Option<String>,
    pub properties: Map<String, Value>,
    pub geometry: Option<geo::Geometry<f64>>,
}

/// Imperative map canvas.
///
/// Implementations are single-owner objects; sharing goes through
/// [`SharedSurface`].
pub trait RenderSurface: Send {
    /// Replace the style wholesale. All sources and layers are dropped.
    fn apply_style(&mut self, style: &LoadedStyle);

    /// Style currently applied, if any finished loading.
    fn active_style(&self) -> Option<BasemapStyle>;

    fn add_source(&mut self, id: &str, source: SourceSpec) -> Result<(), SurfaceError>;

    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError>;

    fn has_source(&self, id: &str) -> bool;

    fn add_layer(&mut self, layer: PaintLayer) -> Result<(), SurfaceError>;

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError>;

    fn has_layer(&self, id: &str) -> bool;

    /// Paint layer ids in draw order, bottom first.
    fn layer_ids(&self) -> Vec<String>;

    fn set_layout_property(
        &mut self,
        layer_id: &str,
        name: &str,
        value: Value,
    ) -> Result<(), SurfaceError>;

    fn set_paint_property(
        &mut self,
        layer_id: &str,
        name: &str,
        value: Value,
    ) -> Result<(), SurfaceError>;

    /// Read back a layout property.
    fn layout_property(&self, layer_id: &str, name: &str) -> Option<Value>;

    /// Read back a paint property.
    fn paint_property(&self, layer_id: &str, name: &str) -> Option<Value>;

    /// Features drawn at `point` by any of `layer_ids`, top-most first.
    fn query_rendered_features(&self, point: LngLat, layer_ids: &[String]) -> Vec<RenderedFeature>;
}

/// Shared handle to the render surface.
///
/// Reads are open to every component; mutation is crate-private so layer
/// objects cannot be created behind the registry's back.
#[derive(Clone)]
pub struct SharedSurface {
    inner: Arc<Mutex<Box<dyn RenderSurface>>>,
}

impl SharedSurface {
    /// Wrap a surface for sharing.
    pub fn new(surface: impl RenderSurface + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(surface))),
        }
    }

    /// Features under `point` for the given paint layers, top-most first.
    pub fn query_rendered_features(&self, point: LngLat, layer_ids: &[String]) -> Vec<RenderedFeature> {
        if layer_ids.is_empty() {
            return Vec::new();
        }
        self.inner.lock().query_rendered_features(point, layer_ids)
    }

    /// Style currently applied.
    pub fn active_style(&self) -> Option<BasemapStyle> {
        self.inner.lock().active_style()
    }

    /// Run a read-only inspection against the surface.
    pub fn inspect<R>(&self, f: impl FnOnce(&dyn RenderSurface) -> R) -> R {
        let guard = self.inner.lock();
        f(guard.as_ref())
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Box<dyn RenderSurface>> {
        self.inner.lock()
    }
}

impl fmt::Debug for SharedSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSurface").finish_non_exhaustive()
    }
}
