use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use super::descriptor::{empty_collection, LayerData, LayerDescriptor, LayerRole, SourceKind};
use super::{LayerBinding, LayerError, RegistrationStatus};
use crate::geometry::{feature_geometry, LngLat};
use crate::preferences::{
    layer_opacity_key, layer_visibility_key, read_layer_opacity, read_layer_visibility,
    PreferenceStore,
};
use crate::resolution::TileFeatureSource;
use crate::surface::{
    ClusterOptions, PaintLayer, RenderSurface, RenderedFeature, SharedSurface, SourceSpec,
    SurfaceError, VISIBILITY_PROPERTY,
};

#[derive(Debug)]
struct LayerRecord {
    descriptor: LayerDescriptor,
    data: LayerData,
    status: RegistrationStatus,
}

#[derive(Debug, Default)]
struct RegistryState {
    order: Vec<String>,
    records: HashMap<String, LayerRecord>,
}

/// Tracks thematic layers and keeps the render surface in sync with them.
pub struct LayerRegistry {
    surface: SharedSurface,
    preferences: Arc<dyn PreferenceStore>,
    state: Mutex<RegistryState>,
}

impl LayerRegistry {
    pub fn new(surface: SharedSurface, preferences: Arc<dyn PreferenceStore>) -> Self {
        Self {
            surface,
            preferences,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Register a layer, replacing any existing one with the same id.
    ///
    /// Without a loaded style the record is kept as
    /// [`RegistrationStatus::Pending`] and registered on the next replay.
    ///
    /// # Errors
    ///
    /// Returns the registration error; the layer stays off the surface and
    /// is recorded as failed.
    pub fn upsert(&self, descriptor: LayerDescriptor, data: LayerData) -> Result<(), LayerError> {
        let id = descriptor.id.clone();
        let mut state = self.state.lock();
        let mut surface = self.surface.lock();

        match state.records.get(&id) {
            Some(previous) => teardown(surface.as_mut(), &previous.descriptor),
            None => state.order.push(id.clone()),
        }

        let result = validate(&descriptor, &data).and_then(|()| {
            if surface.active_style().is_none() {
                return Ok(RegistrationStatus::Pending);
            }
            self.register(surface.as_mut(), &descriptor, &data)
                .map(|()| RegistrationStatus::Registered)
        });
        drop(surface);

        let (status, outcome) = match result {
            Ok(status) => {
                tracing::debug!(
                    layer = %id,
                    kind = %descriptor.source_kind,
                    features = data.feature_count(),
                    status = ?status,
                    "Layer upserted"
                );
                (status, Ok(()))
            }
            Err(e) => {
                tracing::warn!(layer = %id, error = %e, "Layer registration failed");
                (RegistrationStatus::Failed(e.clone()), Err(e))
            }
        };

        state.records.insert(
            id,
            LayerRecord {
                descriptor,
                data,
                status,
            },
        );
        outcome
    }

    /// Remove a layer and its surface objects. Returns `false` for unknown ids.
    pub fn remove(&self, id: &str) -> bool {
        let mut state = self.state.lock();
        let Some(record) = state.records.remove(id) else {
            return false;
        };
        state.order.retain(|o| o != id);
        teardown(self.surface.lock().as_mut(), &record.descriptor);
        tracing::debug!(layer = %id, "Layer removed");
        true
    }

    /// Re-register every layer in insertion order.
    ///
    /// Called after the basemap style changed. Returns the layers that
    /// failed; all others are registered.
    pub fn replay(&self) -> Vec<(String, LayerError)> {
        let mut state = self.state.lock();
        let mut surface = self.surface.lock();
        let RegistryState { order, records } = &mut *state;

        let mut failures = Vec::new();
        for id in order.iter() {
            let Some(record) = records.get_mut(id) else {
                continue;
            };
            teardown(surface.as_mut(), &record.descriptor);

            let result = validate(&record.descriptor, &record.data)
                .and_then(|()| self.register(surface.as_mut(), &record.descriptor, &record.data));
            record.status = match result {
                Ok(()) => RegistrationStatus::Registered,
                Err(e) => {
                    tracing::warn!(layer = %id, error = %e, "Layer replay failed");
                    failures.push((id.clone(), e.clone()));
                    RegistrationStatus::Failed(e)
                }
            };
        }

        tracing::info!(
            layers = order.len(),
            failed = failures.len(),
            "Layers replayed after style change"
        );
        failures
    }

    /// Show or hide a layer and persist the choice.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::UnknownLayer`] for ids never upserted.
    pub fn set_visible(&self, id: &str, visible: bool) -> Result<(), LayerError> {
        let state = self.state.lock();
        let record = state
            .records
            .get(id)
            .ok_or_else(|| LayerError::UnknownLayer(id.to_string()))?;

        if read_layer_visibility(self.preferences.as_ref(), id) != Some(visible) {
            self.preferences
                .set(&layer_visibility_key(id), if visible { "true" } else { "false" })
                .map_err(|e| LayerError::Preference {
                    layer: id.to_string(),
                    message: e.to_string(),
                })?;
        }

        if record.status == RegistrationStatus::Registered {
            let mut surface = self.surface.lock();
            for paint_id in record.descriptor.paint_layer_ids() {
                surface
                    .set_layout_property(&paint_id, VISIBILITY_PROPERTY, visibility_value(visible))
                    .map_err(|source| LayerError::Surface {
                        layer: id.to_string(),
                        source,
                    })?;
            }
        }

        tracing::debug!(layer = %id, visible, "Layer visibility set");
        Ok(())
    }

    /// Set a layer's opacity, clamped to `[0, 1]`, and persist it.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::InvalidOpacity`] for NaN and
    /// [`LayerError::UnknownLayer`] for ids never upserted.
    pub fn set_opacity(&self, id: &str, opacity: f32) -> Result<(), LayerError> {
        if opacity.is_nan() {
            return Err(LayerError::InvalidOpacity(opacity));
        }
        let opacity = opacity.clamp(0.0, 1.0);

        let state = self.state.lock();
        let record = state
            .records
            .get(id)
            .ok_or_else(|| LayerError::UnknownLayer(id.to_string()))?;

        self.preferences
            .set(&layer_opacity_key(id), &opacity.to_string())
            .map_err(|e| LayerError::Preference {
                layer: id.to_string(),
                message: e.to_string(),
            })?;

        if record.status == RegistrationStatus::Registered {
            let mut surface = self.surface.lock();
            for (spec, paint_id) in record
                .descriptor
                .paint
                .iter()
                .zip(record.descriptor.paint_layer_ids())
            {
                for property in spec.kind.opacity_properties() {
                    surface
                        .set_paint_property(&paint_id, property, Value::from(opacity))
                        .map_err(|source| LayerError::Surface {
                            layer: id.to_string(),
                            source,
                        })?;
                }
            }
        }

        tracing::debug!(layer = %id, opacity, "Layer opacity set");
        Ok(())
    }

    /// Layer ids in insertion order.
    pub fn layer_ids(&self) -> Vec<String> {
        self.state.lock().order.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().records.contains_key(id)
    }

    pub fn status(&self, id: &str) -> Option<RegistrationStatus> {
        self.state.lock().records.get(id).map(|r| r.status.clone())
    }

    pub fn descriptor(&self, id: &str) -> Option<LayerDescriptor> {
        self.state.lock().records.get(id).map(|r| r.descriptor.clone())
    }

    /// Effective visibility: the persisted choice, else the descriptor default.
    pub fn visible(&self, id: &str) -> Option<bool> {
        let state = self.state.lock();
        let record = state.records.get(id)?;
        Some(self.effective_visibility(&record.descriptor))
    }

    /// Effective opacity: the persisted choice, else the descriptor default.
    pub fn opacity(&self, id: &str) -> Option<f32> {
        let state = self.state.lock();
        let record = state.records.get(id)?;
        Some(self.effective_opacity(&record.descriptor))
    }

    /// Bindings for every registered layer, in insertion order.
    pub fn bindings(&self) -> Vec<LayerBinding> {
        let state = self.state.lock();
        state
            .order
            .iter()
            .filter_map(|id| state.records.get(id))
            .filter(|r| r.status == RegistrationStatus::Registered)
            .map(|r| LayerBinding {
                layer_id: r.descriptor.id.clone(),
                role: r.descriptor.role,
                source_kind: r.descriptor.source_kind,
                paint_layer_ids: r.descriptor.paint_layer_ids(),
                min_zoom: r.descriptor.min_zoom,
                detail: r.descriptor.detail.clone(),
            })
            .collect()
    }

    fn effective_visibility(&self, descriptor: &LayerDescriptor) -> bool {
        read_layer_visibility(self.preferences.as_ref(), &descriptor.id).unwrap_or(descriptor.visible)
    }

    fn effective_opacity(&self, descriptor: &LayerDescriptor) -> f32 {
        read_layer_opacity(self.preferences.as_ref(), &descriptor.id)
            .unwrap_or_else(|| descriptor.opacity.clamp(0.0, 1.0))
    }

    /// Add the source and paint layers. Partial work is undone on failure.
    fn register(
        &self,
        surface: &mut dyn RenderSurface,
        descriptor: &LayerDescriptor,
        data: &LayerData,
    ) -> Result<(), LayerError> {
        let visible = self.effective_visibility(descriptor);
        let opacity = self.effective_opacity(descriptor);
        let surface_error = |source: SurfaceError| LayerError::Surface {
            layer: descriptor.id.clone(),
            source,
        };

        let source_id = descriptor.source_id();
        surface
            .add_source(&source_id, source_spec(descriptor, data))
            .map_err(surface_error)?;

        for (spec, paint_id) in descriptor.paint.iter().zip(descriptor.paint_layer_ids()) {
            let mut layer = PaintLayer {
                id: paint_id,
                source_id: source_id.clone(),
                kind: spec.kind,
                source_layer: match data {
                    LayerData::Tiles { source_layer, .. } => Some(source_layer.clone()),
                    _ => None,
                },
                min_zoom: descriptor.min_zoom,
                paint: spec.paint.clone(),
                layout: spec.layout.clone(),
            };
            layer
                .layout
                .insert(VISIBILITY_PROPERTY.to_string(), visibility_value(visible));
            for property in spec.kind.opacity_properties() {
                layer.paint.insert(property.to_string(), Value::from(opacity));
            }

            if let Err(e) = surface.add_layer(layer) {
                teardown(surface, descriptor);
                return Err(surface_error(e));
            }
        }

        Ok(())
    }
}

impl TileFeatureSource for LayerRegistry {
    fn is_ready(&self) -> bool {
        let state = self.state.lock();
        state.records.values().any(is_parcel_tile_layer)
    }

    fn features_at(&self, point: LngLat) -> Vec<RenderedFeature> {
        let paint_ids: Vec<String> = {
            let state = self.state.lock();
            state
                .order
                .iter()
                .filter_map(|id| state.records.get(id))
                .filter(|r| is_parcel_tile_layer(r))
                .flat_map(|r| r.descriptor.paint_layer_ids())
                .collect()
        };
        self.surface.query_rendered_features(point, &paint_ids)
    }
}

fn is_parcel_tile_layer(record: &LayerRecord) -> bool {
    record.descriptor.role == LayerRole::Parcel
        && record.descriptor.source_kind == SourceKind::Tile
        && record.status == RegistrationStatus::Registered
}

fn validate(descriptor: &LayerDescriptor, data: &LayerData) -> Result<(), LayerError> {
    if descriptor.paint.is_empty() {
        return Err(LayerError::NoPaintLayers(descriptor.id.clone()));
    }
    if descriptor.opacity.is_nan() {
        return Err(LayerError::InvalidOpacity(descriptor.opacity));
    }

    let mismatch = || LayerError::DataMismatch {
        layer: descriptor.id.clone(),
        kind: descriptor.source_kind,
        data: data.kind_name(),
    };

    match (descriptor.source_kind, data) {
        (SourceKind::Tile, LayerData::Tiles { tiles, .. }) if !tiles.is_empty() => Ok(()),
        (SourceKind::Tile, _) => Err(mismatch()),
        (SourceKind::GeoJson | SourceKind::PointCluster, LayerData::Tiles { .. }) => Err(mismatch()),
        (_, LayerData::Empty) => Ok(()),
        (_, LayerData::Features(fc)) => {
            for (index, feature) in fc.features.iter().enumerate() {
                feature_geometry(feature).map_err(|source| LayerError::InvalidGeometry {
                    layer: descriptor.id.clone(),
                    index,
                    source,
                })?;
            }
            Ok(())
        }
    }
}

fn source_spec(descriptor: &LayerDescriptor, data: &LayerData) -> SourceSpec {
    let cluster = (descriptor.source_kind == SourceKind::PointCluster).then(ClusterOptions::default);
    match data {
        LayerData::Tiles {
            tiles,
            source_layer,
            min_zoom,
            max_zoom,
        } => SourceSpec::VectorTiles {
            tiles: tiles.clone(),
            source_layer: source_layer.clone(),
            min_zoom: *min_zoom,
            max_zoom: *max_zoom,
        },
        LayerData::Features(fc) => SourceSpec::GeoJson {
            data: fc.clone(),
            cluster,
        },
        LayerData::Empty => SourceSpec::GeoJson {
            data: empty_collection(),
            cluster,
        },
    }
}

/// Remove a descriptor's surface objects, ignoring ones already gone.
fn teardown(surface: &mut dyn RenderSurface, descriptor: &LayerDescriptor) {
    for paint_id in descriptor.paint_layer_ids() {
        if surface.has_layer(&paint_id) {
            let _ = surface.remove_layer(&paint_id);
        }
    }
    let source_id = descriptor.source_id();
    if surface.has_source(&source_id) {
        let _ = surface.remove_source(&source_id);
    }
}

fn visibility_value(visible: bool) -> Value {
    Value::from(if visible { "visible" } else { "none" })
}
