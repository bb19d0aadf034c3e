//! Layer registry
//!
//! Keeps one record per thematic layer and reconciles it against the render
//! surface. The registry is the only component that adds or removes surface
//! sources and paint layers.
//!
//! # Registration
//!
//! Every `upsert` tears down the layer's surface objects and creates them
//! again from the descriptor. After a basemap swap the surface is empty, and
//! [`LayerRegistry::replay`] re-registers every record in insertion order
//! with its persisted visibility and opacity.
//!
//! Errors are isolated per layer: a failed layer is marked
//! [`RegistrationStatus::Failed`] and its siblings are unaffected.

mod descriptor;
mod registry;

pub use descriptor::{
    DetailTemplate, LayerData, LayerDescriptor, LayerRole, PaintLayerSpec, SourceKind,
};
pub use registry::LayerRegistry;

use thiserror::Error;

use crate::geometry::FeatureGeometryError;
use crate::surface::SurfaceError;

/// Errors raised while registering or updating a layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayerError {
    #[error("Unknown layer '{0}'")]
    UnknownLayer(String),

    #[error("Layer '{0}' has no paint layers")]
    NoPaintLayers(String),

    #[error("Layer '{layer}' is a {kind} layer but received {data} data")]
    DataMismatch {
        layer: String,
        kind: SourceKind,
        data: &'static str,
    },

    #[error("Layer '{layer}' feature {index}: {source}")]
    InvalidGeometry {
        layer: String,
        index: usize,
        #[source]
        source: FeatureGeometryError,
    },

    #[error("Layer '{layer}': {source}")]
    Surface {
        layer: String,
        #[source]
        source: SurfaceError,
    },

    #[error("Invalid opacity {0}")]
    InvalidOpacity(f32),

    #[error("Failed to persist settings for layer '{layer}': {message}")]
    Preference { layer: String, message: String },
}

/// Registration state of a layer record.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationStatus {
    /// Waiting for a style to finish loading.
    Pending,
    /// Present on the surface.
    Registered,
    /// Left off the surface until the next successful upsert.
    Failed(LayerError),
}

/// Interaction binding for one registered layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerBinding {
    pub layer_id: String,
    pub role: LayerRole,
    pub source_kind: SourceKind,
    pub paint_layer_ids: Vec<String>,
    pub min_zoom: Option<f64>,
    pub detail: Option<DetailTemplate>,
}

impl LayerBinding {
    /// Whether the layer is interactive at `zoom`.
    pub fn active_at(&self, zoom: f64) -> bool {
        self.min_zoom.map_or(true, |min| zoom >= min)
    }
}
