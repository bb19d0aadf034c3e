//! Click and hover routing against the registered layer set.

use parking_lot::{Mutex, RwLock};

use super::FeatureDetail;
use crate::geometry::LngLat;
use crate::layers::{DetailTemplate, LayerBinding, LayerRole};
use crate::resolution::AttributeValue;
use crate::surface::{RenderedFeature, SharedSurface};

/// Pointer affordance shown over the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorStyle {
    #[default]
    Default,
    /// Over an interactive feature.
    Pointer,
}

/// Where a click should go.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickRoute {
    /// No interactive layer is bound.
    Ignored,
    /// The top-most interactive feature belongs to a detail layer.
    Detail(FeatureDetail),
    /// A parcel layer is bound; run the resolution chain.
    Parcel,
}

#[derive(Debug, Default)]
struct Bindings {
    generation: u64,
    layers: Vec<LayerBinding>,
}

/// Routes pointer events to layers.
///
/// Bindings are replaced wholesale on every [`InteractionRouter::rebind`],
/// so no binding outlives the surface objects it refers to.
pub struct InteractionRouter {
    surface: SharedSurface,
    bindings: RwLock<Bindings>,
    cursor: Mutex<CursorStyle>,
}

impl InteractionRouter {
    pub fn new(surface: SharedSurface) -> Self {
        Self {
            surface,
            bindings: RwLock::new(Bindings::default()),
            cursor: Mutex::new(CursorStyle::Default),
        }
    }

    /// Replace all bindings.
    pub fn rebind(&self, layers: Vec<LayerBinding>) {
        let mut bindings = self.bindings.write();
        bindings.generation += 1;
        tracing::debug!(
            generation = bindings.generation,
            layers = layers.len(),
            "Interaction bindings rebuilt"
        );
        bindings.layers = layers;
    }

    /// Number of rebinds so far.
    pub fn generation(&self) -> u64 {
        self.bindings.read().generation
    }

    pub fn bound_layer_ids(&self) -> Vec<String> {
        self.bindings
            .read()
            .layers
            .iter()
            .map(|b| b.layer_id.clone())
            .collect()
    }

    /// Decide where a click at `point` goes.
    pub fn route_click(&self, point: LngLat, zoom: f64) -> ClickRoute {
        let bindings = self.bindings.read();
        if bindings.layers.is_empty() {
            return ClickRoute::Ignored;
        }

        if let Some((binding, feature)) = self.top_interactive(&bindings.layers, point, zoom) {
            if binding.role == LayerRole::Detail {
                let template = binding
                    .detail
                    .clone()
                    .unwrap_or_else(|| DetailTemplate::new(binding.layer_id.clone()));
                return ClickRoute::Detail(build_detail(&binding.layer_id, &template, &feature));
            }
        }

        if bindings.layers.iter().any(|b| b.role == LayerRole::Parcel) {
            ClickRoute::Parcel
        } else {
            ClickRoute::Ignored
        }
    }

    /// Update the cursor for a pointer at `point`.
    ///
    /// Returns the new cursor only when it changed.
    pub fn hover(&self, point: LngLat, zoom: f64) -> Option<CursorStyle> {
        let next = {
            let bindings = self.bindings.read();
            if self.top_interactive(&bindings.layers, point, zoom).is_some() {
                CursorStyle::Pointer
            } else {
                CursorStyle::Default
            }
        };

        let mut cursor = self.cursor.lock();
        if *cursor == next {
            return None;
        }
        *cursor = next;
        Some(next)
    }

    pub fn cursor(&self) -> CursorStyle {
        *self.cursor.lock()
    }

    /// Top-most feature on a parcel or detail layer active at `zoom`.
    fn top_interactive<'a>(
        &self,
        layers: &'a [LayerBinding],
        point: LngLat,
        zoom: f64,
    ) -> Option<(&'a LayerBinding, RenderedFeature)> {
        let paint_ids: Vec<String> = layers
            .iter()
            .filter(|b| b.role != LayerRole::Passive && b.active_at(zoom))
            .flat_map(|b| b.paint_layer_ids.iter().cloned())
            .collect();

        self.surface
            .query_rendered_features(point, &paint_ids)
            .into_iter()
            .find_map(|feature| {
                layers
                    .iter()
                    .find(|b| b.paint_layer_ids.contains(&feature.layer_id))
                    .map(|b| (b, feature))
            })
    }
}

fn build_detail(layer_id: &str, template: &DetailTemplate, feature: &RenderedFeature) -> FeatureDetail {
    let fields = if template.fields.is_empty() {
        feature
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), AttributeValue::from(v)))
            .collect()
    } else {
        template
            .fields
            .iter()
            .map(|key| {
                let value = feature
                    .properties
                    .get(key)
                    .map(AttributeValue::from)
                    .unwrap_or(AttributeValue::Null);
                (key.clone(), value)
            })
            .collect()
    };

    FeatureDetail {
        layer_id: layer_id.to_string(),
        title: template.title.clone(),
        feature_id: feature.id.clone(),
        fields,
    }
}

impl FeatureDetail {
    /// Field value by name.
    pub fn field(&self, name: &str) -> Option<&AttributeValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basemap::{BasemapStyle, LoadedStyle};
    use crate::layers::{LayerData, LayerDescriptor, LayerRegistry, PaintLayerSpec, SourceKind};
    use crate::preferences::MemoryPreferenceStore;
    use crate::surface::HeadlessSurface;
    use geojson::{Feature, FeatureCollection, Geometry, Value as GeoValue};
    use serde_json::Map;
    use std::sync::Arc;

    fn line_feature(diameter: f64) -> Feature {
        let mut props = Map::new();
        props.insert("diameter".into(), diameter.into());
        props.insert("material".into(), "PVC".into());
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(GeoValue::LineString(vec![
                vec![-97.01, 35.0],
                vec![-96.99, 35.0],
            ]))),
            id: None,
            properties: Some(props),
            foreign_members: None,
        }
    }

    fn setup() -> (SharedSurface, LayerRegistry, InteractionRouter) {
        let surface = SharedSurface::new(HeadlessSurface::new());
        surface.lock().apply_style(&LoadedStyle::new(BasemapStyle::Streets));
        let registry = LayerRegistry::new(surface.clone(), Arc::new(MemoryPreferenceStore::new()));
        let router = InteractionRouter::new(surface.clone());
        (surface, registry, router)
    }

    fn water_layer() -> LayerDescriptor {
        LayerDescriptor::new("water", SourceKind::GeoJson)
            .with_paint(PaintLayerSpec::outline("#1f78b4", 2.0))
            .with_detail(DetailTemplate::new("Water Main").with_field("diameter"))
    }

    fn water_data() -> LayerData {
        LayerData::Features(FeatureCollection {
            bbox: None,
            features: vec![line_feature(8.0)],
            foreign_members: None,
        })
    }

    #[test]
    fn test_click_without_bindings_is_ignored() {
        let (_, _, router) = setup();
        assert_eq!(router.route_click(LngLat::new(-97.0, 35.0), 16.0), ClickRoute::Ignored);
    }

    #[test]
    fn test_click_on_detail_layer_builds_detail() {
        let (_, registry, router) = setup();
        registry.upsert(water_layer(), water_data()).unwrap();
        router.rebind(registry.bindings());

        let route = router.route_click(LngLat::new(-97.0, 35.0), 16.0);
        let ClickRoute::Detail(detail) = route else {
            panic!("expected detail route, got {:?}", route);
        };
        assert_eq!(detail.title, "Water Main");
        assert_eq!(detail.fields.len(), 1);
        assert_eq!(detail.field("diameter"), Some(&AttributeValue::Number(8.0)));
    }

    #[test]
    fn test_click_off_features_goes_to_parcel_chain() {
        let (_, registry, router) = setup();
        registry.upsert(water_layer(), water_data()).unwrap();
        registry
            .upsert(
                LayerDescriptor::new("parcels", SourceKind::GeoJson)
                    .with_role(LayerRole::Parcel)
                    .with_paint(PaintLayerSpec::outline("#e31a1c", 1.0)),
                LayerData::Empty,
            )
            .unwrap();
        router.rebind(registry.bindings());

        assert_eq!(router.route_click(LngLat::new(-90.0, 30.0), 16.0), ClickRoute::Parcel);
    }

    #[test]
    fn test_min_zoom_gates_detail_layer() {
        let (_, registry, router) = setup();
        registry
            .upsert(water_layer().with_min_zoom(15.0), water_data())
            .unwrap();
        router.rebind(registry.bindings());

        assert_eq!(router.route_click(LngLat::new(-97.0, 35.0), 12.0), ClickRoute::Ignored);
        assert!(matches!(
            router.route_click(LngLat::new(-97.0, 35.0), 15.0),
            ClickRoute::Detail(_)
        ));
    }

    #[test]
    fn test_hover_reports_changes_only() {
        let (_, registry, router) = setup();
        registry.upsert(water_layer(), water_data()).unwrap();
        router.rebind(registry.bindings());

        let on = LngLat::new(-97.0, 35.0);
        let off = LngLat::new(-90.0, 30.0);
        assert_eq!(router.hover(on, 16.0), Some(CursorStyle::Pointer));
        assert_eq!(router.hover(on, 16.0), None);
        assert_eq!(router.hover(off, 16.0), Some(CursorStyle::Default));
        assert_eq!(router.cursor(), CursorStyle::Default);
    }

    #[test]
    fn test_rebind_drops_stale_bindings() {
        let (_, registry, router) = setup();
        registry.upsert(water_layer(), water_data()).unwrap();
        router.rebind(registry.bindings());
        assert_eq!(router.bound_layer_ids(), vec!["water"]);

        registry.remove("water");
        router.rebind(registry.bindings());
        assert!(router.bound_layer_ids().is_empty());
        assert_eq!(router.generation(), 2);
        assert_eq!(router.route_click(LngLat::new(-97.0, 35.0), 16.0), ClickRoute::Ignored);
    }
}
