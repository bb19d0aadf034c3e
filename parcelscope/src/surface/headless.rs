//! In-memory render surface.
//!
//! Keeps sources, paint layers and their properties exactly as a real canvas
//! would, and answers rendered-feature queries by geometric hit-testing
//! instead of rasterising. Used by the CLI and throughout the tests.

use std::collections::HashMap;
use std::sync::Arc;

use geojson::FeatureCollection;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::{
    PaintKind, PaintLayer, RenderSurface, RenderedFeature, SourceSpec, SurfaceError,
    VISIBILITY_PROPERTY,
};
use crate::basemap::{BasemapStyle, LoadedStyle};
use crate::geometry::{feature_geometry, feature_id, hit_test, LngLat};

/// Tolerance for hitting point and line features, in metres.
pub const DEFAULT_HIT_TOLERANCE_METERS: f64 = 10.0;

/// Property used to derive ids for features without an `id` member.
const FALLBACK_ID_PROPERTY: &str = "id";

/// Stand-in for a vector tile service.
///
/// Features are published per tile URL template. A headless vector tile
/// source draws whatever its templates currently serve, so tile data
/// survives style swaps the same way a real tile server does.
#[derive(Debug, Clone, Default)]
pub struct TileServer {
    templates: Arc<RwLock<HashMap<String, FeatureCollection>>>,
}

impl TileServer {
    /// Create an empty tile server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `data` for a URL template.
    pub fn publish(&self, template: impl Into<String>, data: FeatureCollection) {
        self.templates.write().insert(template.into(), data);
    }

    /// Stop serving a URL template.
    pub fn withdraw(&self, template: &str) {
        self.templates.write().remove(template);
    }

    fn features_for(&self, tiles: &[String]) -> Vec<geojson::Feature> {
        let templates = self.templates.read();
        tiles
            .iter()
            .filter_map(|t| templates.get(t))
            .flat_map(|fc| fc.features.iter().cloned())
            .collect()
    }
}

#[derive(Debug)]
struct SourceEntry {
    spec: SourceSpec,
    style_owned: bool,
}

#[derive(Debug)]
struct LayerEntry {
    layer: PaintLayer,
    style_owned: bool,
}

/// Render surface that never draws.
#[derive(Debug)]
pub struct HeadlessSurface {
    style: Option<BasemapStyle>,
    sources: HashMap<String, SourceEntry>,
    layers: Vec<LayerEntry>,
    tile_server: TileServer,
    hit_tolerance_meters: f64,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessSurface {
    /// Create a surface with no style loaded.
    pub fn new() -> Self {
        Self::with_tile_server(TileServer::new())
    }

    /// Create a surface reading vector tiles from `tile_server`.
    pub fn with_tile_server(tile_server: TileServer) -> Self {
        Self {
            style: None,
            sources: HashMap::new(),
            layers: Vec::new(),
            tile_server,
            hit_tolerance_meters: DEFAULT_HIT_TOLERANCE_METERS,
        }
    }

    /// Set the point/line hit tolerance.
    pub fn with_hit_tolerance(mut self, meters: f64) -> Self {
        self.hit_tolerance_meters = meters;
        self
    }

    /// Handle to the tile server backing vector tile sources.
    pub fn tile_server(&self) -> TileServer {
        self.tile_server.clone()
    }

    fn layer_mut(&mut self, id: &str) -> Result<&mut PaintLayer, SurfaceError> {
        self.layers
            .iter_mut()
            .find(|e| e.layer.id == id)
            .map(|e| &mut e.layer)
            .ok_or_else(|| SurfaceError::UnknownLayer(id.to_string()))
    }

    fn layer(&self, id: &str) -> Option<&PaintLayer> {
        self.layers.iter().find(|e| e.layer.id == id).map(|e| &e.layer)
    }

    fn source_features(&self, spec: &SourceSpec) -> Vec<geojson::Feature> {
        match spec {
            SourceSpec::GeoJson { data, .. } => data.features.clone(),
            SourceSpec::VectorTiles { tiles, .. } => self.tile_server.features_for(tiles),
            SourceSpec::Raster { .. } => Vec::new(),
        }
    }
}

fn is_hidden(layer: &PaintLayer) -> bool {
    layer.layout.get(VISIBILITY_PROPERTY).and_then(Value::as_str) == Some("none")
}

impl RenderSurface for HeadlessSurface {
    fn apply_style(&mut self, style: &LoadedStyle) {
        self.sources.clear();
        self.layers.clear();

        for (index, tiles) in style.descriptor.raster_layers.iter().enumerate() {
            let id = format!("basemap-{}", index);
            self.sources.insert(
                id.clone(),
                SourceEntry {
                    spec: SourceSpec::Raster {
                        tiles: vec![tiles.clone()],
                        tile_size: 256,
                    },
                    style_owned: true,
                },
            );
            self.layers.push(LayerEntry {
                layer: PaintLayer {
                    id: id.clone(),
                    source_id: id,
                    kind: PaintKind::Raster,
                    source_layer: None,
                    min_zoom: None,
                    paint: Map::new(),
                    layout: Map::new(),
                },
                style_owned: true,
            });
        }

        self.style = Some(style.style);
        tracing::debug!(style = %style.style, "Headless surface applied style");
    }

    fn active_style(&self) -> Option<BasemapStyle> {
        self.style
    }

    fn add_source(&mut self, id: &str, source: SourceSpec) -> Result<(), SurfaceError> {
        if self.style.is_none() {
            return Err(SurfaceError::NoStyle);
        }
        if self.sources.contains_key(id) {
            return Err(SurfaceError::DuplicateSource(id.to_string()));
        }
        if let SourceSpec::GeoJson { data, .. } = &source {
            for (index, feature) in data.features.iter().enumerate() {
                feature_geometry(feature)
                    .map_err(|e| SurfaceError::Rejected(format!("feature {}: {}", index, e)))?;
            }
        }
        self.sources.insert(
            id.to_string(),
            SourceEntry {
                spec: source,
                style_owned: false,
            },
        );
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError> {
        if self.layers.iter().any(|e| e.layer.source_id == id) {
            return Err(SurfaceError::Rejected(format!(
                "source '{}' is still used by a layer",
                id
            )));
        }
        self.sources
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SurfaceError::UnknownSource(id.to_string()))
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_layer(&mut self, layer: PaintLayer) -> Result<(), SurfaceError> {
        if self.style.is_none() {
            return Err(SurfaceError::NoStyle);
        }
        if self.layer(&layer.id).is_some() {
            return Err(SurfaceError::DuplicateLayer(layer.id));
        }
        if !self.sources.contains_key(&layer.source_id) {
            return Err(SurfaceError::UnknownSource(layer.source_id));
        }
        self.layers.push(LayerEntry {
            layer,
            style_owned: false,
        });
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError> {
        let before = self.layers.len();
        self.layers.retain(|e| e.layer.id != id);
        if self.layers.len() == before {
            return Err(SurfaceError::UnknownLayer(id.to_string()));
        }
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layer(id).is_some()
    }

    fn layer_ids(&self) -> Vec<String> {
        self.layers.iter().map(|e| e.layer.id.clone()).collect()
    }

    fn set_layout_property(
        &mut self,
        layer_id: &str,
        name: &str,
        value: Value,
    ) -> Result<(), SurfaceError> {
        self.layer_mut(layer_id)?.layout.insert(name.to_string(), value);
        Ok(())
    }

    fn set_paint_property(
        &mut self,
        layer_id: &str,
        name: &str,
        value: Value,
    ) -> Result<(), SurfaceError> {
        self.layer_mut(layer_id)?.paint.insert(name.to_string(), value);
        Ok(())
    }

    fn layout_property(&self, layer_id: &str, name: &str) -> Option<Value> {
        self.layer(layer_id)?.layout.get(name).cloned()
    }

    fn paint_property(&self, layer_id: &str, name: &str) -> Option<Value> {
        self.layer(layer_id)?.paint.get(name).cloned()
    }

    fn query_rendered_features(&self, point: LngLat, layer_ids: &[String]) -> Vec<RenderedFeature> {
        let mut hits = Vec::new();

        for entry in self.layers.iter().rev() {
            let layer = &entry.layer;
            if entry.style_owned || is_hidden(layer) || !layer_ids.contains(&layer.id) {
                continue;
            }
            let Some(source) = self.sources.get(&layer.source_id) else {
                continue;
            };

            for feature in self.source_features(&source.spec) {
                let Ok(Some(geometry)) = feature_geometry(&feature) else {
                    continue;
                };
                if !hit_test(&geometry, point, self.hit_tolerance_meters) {
                    continue;
                }
                hits.push(RenderedFeature {
                    layer_id: layer.id.clone(),
                    source_id: layer.source_id.clone(),
                    id: feature_id(&feature, FALLBACK_ID_PROPERTY),
                    properties: feature.properties.clone().unwrap_or_default(),
                    geometry: Some(geometry),
                });
            }
        }

        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basemap::BasemapStyle;
    use geojson::{Feature, Geometry, Value as GeoValue};

    fn square(id: &str, west: f64, south: f64, size: f64) -> Feature {
        let mut props = Map::new();
        props.insert("id".into(), id.into());
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(GeoValue::Polygon(vec![vec![
                vec![west, south],
                vec![west + size, south],
                vec![west + size, south + size],
                vec![west, south + size],
                vec![west, south],
            ]]))),
            id: None,
            properties: Some(props),
            foreign_members: None,
        }
    }

    fn collection(features: Vec<Feature>) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }

    fn fill_layer(id: &str, source: &str) -> PaintLayer {
        PaintLayer {
            id: id.to_string(),
            source_id: source.to_string(),
            kind: PaintKind::Fill,
            source_layer: None,
            min_zoom: None,
            paint: Map::new(),
            layout: Map::new(),
        }
    }

    fn styled_surface() -> HeadlessSurface {
        let mut surface = HeadlessSurface::new();
        surface.apply_style(&LoadedStyle::new(BasemapStyle::Streets));
        surface
    }

    #[test]
    fn test_requires_style() {
        let mut surface = HeadlessSurface::new();
        let result = surface.add_source(
            "parcels",
            SourceSpec::GeoJson {
                data: collection(vec![]),
                cluster: None,
            },
        );
        assert_eq!(result, Err(SurfaceError::NoStyle));
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let mut surface = styled_surface();
        let spec = SourceSpec::GeoJson {
            data: collection(vec![]),
            cluster: None,
        };
        surface.add_source("parcels", spec.clone()).unwrap();
        assert_eq!(
            surface.add_source("parcels", spec),
            Err(SurfaceError::DuplicateSource("parcels".into()))
        );
    }

    #[test]
    fn test_style_swap_drops_everything() {
        let mut surface = styled_surface();
        surface
            .add_source(
                "parcels",
                SourceSpec::GeoJson {
                    data: collection(vec![]),
                    cluster: None,
                },
            )
            .unwrap();
        surface.add_layer(fill_layer("parcels-fill", "parcels")).unwrap();

        surface.apply_style(&LoadedStyle::new(BasemapStyle::Satellite));
        assert!(!surface.has_source("parcels"));
        assert!(!surface.has_layer("parcels-fill"));
        assert_eq!(surface.active_style(), Some(BasemapStyle::Satellite));
    }

    #[test]
    fn test_query_returns_topmost_first_and_skips_hidden() {
        let mut surface = styled_surface();
        for name in ["lower", "upper"] {
            surface
                .add_source(
                    name,
                    SourceSpec::GeoJson {
                        data: collection(vec![square(name, 0.0, 0.0, 1.0)]),
                        cluster: None,
                    },
                )
                .unwrap();
            surface.add_layer(fill_layer(&format!("{}-fill", name), name)).unwrap();
        }
        let ids = vec!["lower-fill".to_string(), "upper-fill".to_string()];

        let hits = surface.query_rendered_features(LngLat::new(0.5, 0.5), &ids);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].layer_id, "upper-fill");
        assert_eq!(hits[0].id.as_deref(), Some("upper"));

        surface
            .set_layout_property("upper-fill", VISIBILITY_PROPERTY, "none".into())
            .unwrap();
        let hits = surface.query_rendered_features(LngLat::new(0.5, 0.5), &ids);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].layer_id, "lower-fill");
    }

    #[test]
    fn test_vector_tiles_read_from_tile_server() {
        let server = TileServer::new();
        let mut surface = HeadlessSurface::with_tile_server(server.clone());
        surface.apply_style(&LoadedStyle::new(BasemapStyle::Streets));

        let template = "https://tiles.example.com/parcels/{z}/{x}/{y}.pbf";
        surface
            .add_source(
                "parcels",
                SourceSpec::VectorTiles {
                    tiles: vec![template.to_string()],
                    source_layer: "parcels".into(),
                    min_zoom: 10,
                    max_zoom: 16,
                },
            )
            .unwrap();
        surface.add_layer(fill_layer("parcels-fill", "parcels")).unwrap();
        let ids = vec!["parcels-fill".to_string()];

        assert!(surface
            .query_rendered_features(LngLat::new(0.5, 0.5), &ids)
            .is_empty());

        server.publish(template, collection(vec![square("P-1", 0.0, 0.0, 1.0)]));
        let hits = surface.query_rendered_features(LngLat::new(0.5, 0.5), &ids);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id.as_deref(), Some("P-1"));
    }

    #[test]
    fn test_malformed_geojson_rejected() {
        let mut surface = styled_surface();
        let mut bad = square("bad", 0.0, 0.0, 1.0);
        bad.geometry = Some(Geometry::new(GeoValue::Point(vec![0.0, 95.0])));
        let result = surface.add_source(
            "bad",
            SourceSpec::GeoJson {
                data: collection(vec![bad]),
                cluster: None,
            },
        );
        assert!(matches!(result, Err(SurfaceError::Rejected(_))));
    }
}
