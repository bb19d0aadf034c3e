//! Layer descriptors and the data backing them.

use std::fmt;

use geojson::FeatureCollection;
use serde_json::{json, Map, Value};

use crate::surface::PaintKind;

/// Where a layer's features come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Vector tiles from a tile service.
    Tile,
    /// Inline GeoJSON.
    GeoJson,
    /// Inline GeoJSON points, clustered by the surface.
    PointCluster,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Tile => "tile",
            SourceKind::GeoJson => "geojson",
            SourceKind::PointCluster => "point-cluster",
        })
    }
}

/// How clicks on a layer are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayerRole {
    /// Clicks resolve a parcel through the resolution chain.
    Parcel,
    /// Clicks show the clicked feature's own properties.
    Detail,
    /// Not interactive.
    #[default]
    Passive,
}

/// Popup content for a detail layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailTemplate {
    pub title: String,
    /// Property keys shown, in order. Empty shows every property.
    pub fields: Vec<String>,
}

impl DetailTemplate {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>) -> Self {
        self.fields.push(key.into());
        self
    }
}

/// One paint layer drawn for a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintLayerSpec {
    /// Appended to the descriptor id to form the paint layer id.
    pub suffix: String,
    pub kind: PaintKind,
    pub paint: Map<String, Value>,
    pub layout: Map<String, Value>,
}

impl PaintLayerSpec {
    pub fn new(suffix: impl Into<String>, kind: PaintKind) -> Self {
        Self {
            suffix: suffix.into(),
            kind,
            paint: Map::new(),
            layout: Map::new(),
        }
    }

    pub fn with_paint(mut self, name: &str, value: Value) -> Self {
        self.paint.insert(name.to_string(), value);
        self
    }

    pub fn with_layout(mut self, name: &str, value: Value) -> Self {
        self.layout.insert(name.to_string(), value);
        self
    }

    /// Translucent polygon fill.
    pub fn fill(color: &str) -> Self {
        Self::new("fill", PaintKind::Fill).with_paint("fill-color", json!(color))
    }

    /// Polygon or line outline.
    pub fn outline(color: &str, width: f64) -> Self {
        Self::new("line", PaintKind::Line)
            .with_paint("line-color", json!(color))
            .with_paint("line-width", json!(width))
    }

    /// Point markers.
    pub fn circle(color: &str, radius: f64) -> Self {
        Self::new("circle", PaintKind::Circle)
            .with_paint("circle-color", json!(color))
            .with_paint("circle-radius", json!(radius))
    }
}

/// Declarative description of a thematic layer.
///
/// `visible` and `opacity` are defaults; persisted preferences override
/// them on every registration.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDescriptor {
    pub id: String,
    pub source_kind: SourceKind,
    pub paint: Vec<PaintLayerSpec>,
    pub visible: bool,
    pub opacity: f32,
    pub min_zoom: Option<f64>,
    pub role: LayerRole,
    pub detail: Option<DetailTemplate>,
}

impl LayerDescriptor {
    pub fn new(id: impl Into<String>, source_kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            source_kind,
            paint: Vec::new(),
            visible: true,
            opacity: 1.0,
            min_zoom: None,
            role: LayerRole::Passive,
            detail: None,
        }
    }

    pub fn with_paint(mut self, layer: PaintLayerSpec) -> Self {
        self.paint.push(layer);
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_min_zoom(mut self, min_zoom: f64) -> Self {
        self.min_zoom = Some(min_zoom);
        self
    }

    pub fn with_role(mut self, role: LayerRole) -> Self {
        self.role = role;
        self
    }

    /// Make the layer a detail layer using `template`.
    pub fn with_detail(mut self, template: DetailTemplate) -> Self {
        self.role = LayerRole::Detail;
        self.detail = Some(template);
        self
    }

    /// Id of the surface source.
    pub fn source_id(&self) -> String {
        format!("{}-source", self.id)
    }

    /// Ids of the surface paint layers, bottom to top.
    pub fn paint_layer_ids(&self) -> Vec<String> {
        self.paint
            .iter()
            .map(|p| format!("{}-{}", self.id, p.suffix))
            .collect()
    }
}

/// Data handed to the registry with a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerData {
    /// No data yet. Inline layers register an empty collection.
    Empty,
    Features(FeatureCollection),
    Tiles {
        tiles: Vec<String>,
        source_layer: String,
        min_zoom: u8,
        max_zoom: u8,
    },
}

impl LayerData {
    /// Tile data with the default zoom range.
    pub fn tiles(template: impl Into<String>, source_layer: impl Into<String>) -> Self {
        LayerData::Tiles {
            tiles: vec![template.into()],
            source_layer: source_layer.into(),
            min_zoom: 0,
            max_zoom: 22,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            LayerData::Empty => "empty",
            LayerData::Features(_) => "features",
            LayerData::Tiles { .. } => "tiles",
        }
    }

    /// Number of inline features.
    pub fn feature_count(&self) -> usize {
        match self {
            LayerData::Features(fc) => fc.features.len(),
            _ => 0,
        }
    }
}

/// An empty feature collection.
pub(crate) fn empty_collection() -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    }
}
