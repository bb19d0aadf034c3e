//! Map engine facade.
//!
//! Wires the basemap controller, layer registry, resolution chain,
//! interaction router and measurement session together and delivers results
//! to the host through [`HostCallbacks`].
//!
//! # Data flow
//!
//! ```text
//! set_style --> BasemapController --Changed--> LayerRegistry::replay --> InteractionRouter::rebind
//! click --> measurement (tool armed)
//!       \-> InteractionRouter --Detail--> on_feature_detail
//!                             \-Parcel--> ParcelResolver --> on_parcel_resolved | on_no_parcel_found | on_zoom_advisory
//! set_viewport --> FallbackTier (debounced) --> parcels-fallback layer
//! ```
//!
//! No error from provider I/O escapes a click: tier failures fall through,
//! registration failures go to `on_layer_error` and a style failure goes to
//! `on_style_error`.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::broadcast;

use crate::basemap::{BasemapController, BasemapStyle, StyleChange, StyleError, StyleEvent, StyleLoader};
use crate::config::EngineConfig;
use crate::geometry::{Bounds, LngLat};
use crate::interaction::{
    CallbackCell, ClickRoute, CursorStyle, FeatureDetail, HostCallbacks, InteractionRouter,
    NoopCallbacks,
};
use crate::layers::{
    LayerData, LayerDescriptor, LayerError, LayerRegistry, LayerRole, PaintLayerSpec,
    RegistrationStatus, SourceKind,
};
use crate::measurement::{
    MeasurementError, MeasurementResult, MeasurementSession, MeasurementState, MeasurementTool,
    MEASUREMENT_OVERLAY_LAYER,
};
use crate::preferences::PreferenceStore;
use crate::provider::{FallbackParcelProvider, ProviderError, ReportDataProvider};
use crate::resolution::{
    FallbackSink, FallbackSnapshot, FallbackTier, ParcelResolver, ResolutionOutcome,
    ResolutionTierState, ViewportState,
};
use crate::surface::SharedSurface;

/// Layer id under which applied fallback parcels are drawn.
pub const FALLBACK_PARCEL_LAYER: &str = "parcels-fallback";

/// Collaborators the engine is built from.
pub struct EngineServices {
    pub surface: SharedSurface,
    pub preferences: Arc<dyn PreferenceStore>,
    pub style_loader: Arc<dyn StyleLoader>,
    pub report: Arc<dyn ReportDataProvider>,
    pub fallback: Option<Arc<dyn FallbackParcelProvider>>,
    pub callbacks: Arc<dyn HostCallbacks>,
}

impl EngineServices {
    pub fn new(
        surface: SharedSurface,
        preferences: Arc<dyn PreferenceStore>,
        style_loader: Arc<dyn StyleLoader>,
        report: Arc<dyn ReportDataProvider>,
    ) -> Self {
        Self {
            surface,
            preferences,
            style_loader,
            report,
            fallback: None,
            callbacks: Arc::new(NoopCallbacks),
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackParcelProvider>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_callbacks(mut self, callbacks: Arc<dyn HostCallbacks>) -> Self {
        self.callbacks = callbacks;
        self
    }
}

/// What a click did.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// Nothing interactive under the click.
    Ignored,
    /// Captured by the armed measurement tool; carries the result when the
    /// point completed the measurement.
    Measurement(Option<MeasurementResult>),
    /// The measurement tool refused the point.
    MeasurementRejected(MeasurementError),
    Detail(FeatureDetail),
    Parcel(ResolutionOutcome),
}

struct EngineCore {
    config: EngineConfig,
    surface: SharedSurface,
    basemap: BasemapController,
    registry: Arc<LayerRegistry>,
    resolver: ParcelResolver,
    router: InteractionRouter,
    measurement: Mutex<MeasurementSession>,
    callbacks: CallbackCell,
    viewport: Mutex<Option<ViewportState>>,
}

/// The layer orchestration and parcel resolution engine.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MapEngine {
    core: Arc<EngineCore>,
}

impl MapEngine {
    pub fn new(config: EngineConfig, services: EngineServices) -> Self {
        let registry = Arc::new(LayerRegistry::new(
            services.surface.clone(),
            Arc::clone(&services.preferences),
        ));
        let fallback = services.fallback.map(|provider| {
            Arc::new(FallbackTier::new(
                provider,
                config.resolution.fallback_debounce,
                config.resolution.parcel_id_property.clone(),
            ))
        });
        let resolver = ParcelResolver::new(
            config.resolution.clone(),
            registry.clone(),
            services.report,
            fallback,
        );
        let measurement =
            MeasurementSession::new(config.units).with_buffer_segments(config.buffer_segments);
        let basemap = BasemapController::new(
            services.style_loader,
            services.surface.clone(),
            services.preferences,
        );

        tracing::debug!(
            min_zoom = config.resolution.min_zoom,
            tile_opt_out = config.resolution.tile_opt_out,
            fallback = resolver.fallback().is_some(),
            "Map engine created"
        );

        Self {
            core: Arc::new(EngineCore {
                router: InteractionRouter::new(services.surface.clone()),
                surface: services.surface,
                basemap,
                registry,
                resolver,
                measurement: Mutex::new(measurement),
                callbacks: CallbackCell::new(services.callbacks),
                viewport: Mutex::new(None),
                config,
            }),
        }
    }

    /// Load the persisted basemap, or the configured default.
    pub async fn start(&self) -> Result<StyleChange, StyleError> {
        let style = self.core.basemap.initial_style(self.core.config.default_style);
        self.set_style(style).await
    }

    /// Swap the basemap and re-register every layer once it has loaded.
    ///
    /// On failure the previous style stays and `on_style_error` is called.
    pub async fn set_style(&self, style: BasemapStyle) -> Result<StyleChange, StyleError> {
        match self.core.basemap.set_style(style).await {
            Ok(change) => {
                if let StyleChange::Changed { .. } = change {
                    self.core.track_tile_tier(|core| core.replay_layers());
                }
                Ok(change)
            }
            Err(e) => {
                self.core.callbacks.get().on_style_error(&e);
                Err(e)
            }
        }
    }

    pub fn current_style(&self) -> Option<BasemapStyle> {
        self.core.basemap.current()
    }

    pub fn subscribe_style_events(&self) -> broadcast::Receiver<StyleEvent> {
        self.core.basemap.subscribe()
    }

    /// Replace the host callbacks. Takes effect for the next notification.
    pub fn set_callbacks(&self, callbacks: Arc<dyn HostCallbacks>) {
        self.core.callbacks.replace(callbacks);
    }

    /// Read access to the render surface.
    pub fn surface(&self) -> SharedSurface {
        self.core.surface.clone()
    }

    // --- layers ---

    /// Register or replace a thematic layer.
    ///
    /// Failures are also reported through `on_layer_error`.
    pub fn upsert_layer(&self, descriptor: LayerDescriptor, data: LayerData) -> Result<(), LayerError> {
        self.core
            .track_tile_tier(|core| core.upsert_layer(descriptor, data))
    }

    pub fn remove_layer(&self, id: &str) -> bool {
        self.core.track_tile_tier(|core| {
            let removed = core.registry.remove(id);
            core.rebind();
            removed
        })
    }

    pub fn set_layer_visible(&self, id: &str, visible: bool) -> Result<(), LayerError> {
        self.core.registry.set_visible(id, visible)
    }

    pub fn set_layer_opacity(&self, id: &str, opacity: f32) -> Result<(), LayerError> {
        self.core.registry.set_opacity(id, opacity)
    }

    /// Layer ids in insertion order.
    pub fn layer_ids(&self) -> Vec<String> {
        self.core.registry.layer_ids()
    }

    pub fn layer_status(&self, id: &str) -> Option<RegistrationStatus> {
        self.core.registry.status(id)
    }

    pub fn layer_visible(&self, id: &str) -> Option<bool> {
        self.core.registry.visible(id)
    }

    pub fn layer_opacity(&self, id: &str) -> Option<f32> {
        self.core.registry.opacity(id)
    }

    // --- viewport and resolution ---

    /// Record a camera move. Schedules a debounced fallback fetch while the
    /// fallback tier is engaged.
    ///
    /// # Panics
    ///
    /// Scheduling a fetch spawns a task, so this must be called from within
    /// a Tokio runtime when a fallback provider is configured. The same holds
    /// for the layer, tile error and retry methods, which may schedule too.
    pub fn set_viewport(&self, viewport: ViewportState) {
        *self.core.viewport.lock() = Some(viewport);
        self.core.refresh_fallback(viewport);
    }

    pub fn viewport(&self) -> Option<ViewportState> {
        *self.core.viewport.lock()
    }

    /// Report a parcel tile loading error from the surface.
    pub fn report_tile_error(&self, error: &ProviderError) {
        if self.core.resolver.report_tile_error(error) {
            self.core.refresh_current_fallback();
        }
    }

    /// Declare the parcel tile service unavailable for the session.
    pub fn mark_tile_unavailable(&self, reason: &str) {
        self.core.resolver.mark_tile_unavailable(reason);
        self.core.refresh_current_fallback();
    }

    /// Re-issue the last fallback fetch. Returns `false` when there is none
    /// or the current view is not eligible for fallback parcels.
    pub fn retry_fallback(&self) -> bool {
        let Some(tier) = self.core.resolver.fallback() else {
            return false;
        };
        let eligible = self
            .viewport()
            .is_some_and(|v| self.core.resolver.fallback_eligible(v.zoom));
        if !eligible {
            tracing::debug!("Fallback retry skipped, view not eligible");
            return false;
        }
        tier.retry(self.core.sink()).is_some()
    }

    pub fn tier_state(&self) -> ResolutionTierState {
        let viewport = *self.core.viewport.lock();
        self.core.resolver.tier_state(viewport.as_ref())
    }

    /// Handle a click on the map.
    pub async fn click(&self, point: LngLat) -> ClickOutcome {
        if self.core.measurement.lock().is_armed() {
            return self.core.measurement_click(point);
        }

        let zoom = self.viewport().map_or(0.0, |v| v.zoom);
        let callbacks = self.core.callbacks.get();

        match self.core.router.route_click(point, zoom) {
            ClickRoute::Ignored => {
                tracing::debug!(point = %point, "Click ignored");
                ClickOutcome::Ignored
            }
            ClickRoute::Detail(detail) => {
                callbacks.on_feature_detail(&detail);
                ClickOutcome::Detail(detail)
            }
            ClickRoute::Parcel => {
                let outcome = self.core.resolver.resolve(point, zoom).await;
                // Re-read so a callback replaced during the lookup is used.
                let callbacks = self.core.callbacks.get();
                match &outcome {
                    ResolutionOutcome::Resolved(parcel) => callbacks.on_parcel_resolved(parcel),
                    ResolutionOutcome::NotFound => callbacks.on_no_parcel_found(point),
                    ResolutionOutcome::ZoomIn { min_zoom } => callbacks.on_zoom_advisory(*min_zoom),
                }
                ClickOutcome::Parcel(outcome)
            }
        }
    }

    /// Update the cursor for the pointer at `point`; `Some` when it changed.
    pub fn hover(&self, point: LngLat) -> Option<CursorStyle> {
        let zoom = self.viewport().map_or(0.0, |v| v.zoom);
        self.core.router.hover(point, zoom)
    }

    // --- measurement ---

    pub fn arm_measurement(&self, tool: MeasurementTool) {
        self.core.measurement.lock().arm(tool);
        self.core.sync_measurement_overlay();
    }

    /// Deselect the tool and clear the overlay.
    pub fn clear_measurement(&self) {
        self.core.measurement.lock().clear();
        self.core.sync_measurement_overlay();
    }

    /// Close the area polygon.
    pub fn finish_measurement(&self) -> Result<MeasurementResult, MeasurementError> {
        let result = self.core.measurement.lock().finish();
        self.core.after_measurement(result.as_ref().ok());
        result
    }

    pub fn set_buffer_radius(&self, meters: f64) -> Result<Option<MeasurementResult>, MeasurementError> {
        let result = self.core.measurement.lock().set_radius(meters);
        self.core
            .after_measurement(result.as_ref().ok().and_then(Option::as_ref));
        result
    }

    pub fn undo_measurement(&self) -> Option<LngLat> {
        let removed = self.core.measurement.lock().undo();
        self.core.sync_measurement_overlay();
        removed
    }

    pub fn measurement_state(&self) -> MeasurementState {
        self.core.measurement.lock().state().clone()
    }
}

impl EngineCore {
    fn sink(self: &Arc<Self>) -> Arc<dyn FallbackSink> {
        Arc::clone(self) as Arc<dyn FallbackSink>
    }

    fn rebind(&self) {
        self.router.rebind(self.registry.bindings());
    }

    fn replay_layers(&self) {
        let failures = self.registry.replay();
        let callbacks = self.callbacks.get();
        for (layer_id, error) in &failures {
            callbacks.on_layer_error(layer_id, error);
        }
        self.rebind();
    }

    fn upsert_layer(&self, descriptor: LayerDescriptor, data: LayerData) -> Result<(), LayerError> {
        let id = descriptor.id.clone();
        let result = self.registry.upsert(descriptor, data);
        if let Err(e) = &result {
            self.callbacks.get().on_layer_error(&id, e);
        }
        self.rebind();
        result
    }

    /// Run a registry change and re-evaluate the fallback tier when it
    /// flipped tile tier availability.
    fn track_tile_tier<R>(self: &Arc<Self>, change: impl FnOnce(&Self) -> R) -> R {
        let was_usable = self.resolver.tile_tier_usable();
        let result = change(&**self);
        let usable = self.resolver.tile_tier_usable();
        if usable != was_usable {
            tracing::info!(usable, "Parcel tile tier availability changed");
            self.refresh_current_fallback();
        }
        result
    }

    fn refresh_current_fallback(self: &Arc<Self>) {
        let viewport = *self.viewport.lock();
        if let Some(viewport) = viewport {
            self.refresh_fallback(viewport);
        }
    }

    fn refresh_fallback(self: &Arc<Self>, viewport: ViewportState) {
        let Some(tier) = self.resolver.fallback() else {
            return;
        };
        if self.resolver.fallback_eligible(viewport.zoom) {
            tier.schedule(viewport.bounds, self.sink());
        } else {
            tier.cancel();
        }
    }

    fn measurement_click(&self, point: LngLat) -> ClickOutcome {
        let result = self.measurement.lock().add_point(point);
        match result {
            Ok(completed) => {
                self.after_measurement(completed.as_ref());
                ClickOutcome::Measurement(completed)
            }
            Err(e) => {
                tracing::warn!(point = %point, error = %e, "Measurement point rejected");
                ClickOutcome::MeasurementRejected(e)
            }
        }
    }

    fn after_measurement(&self, completed: Option<&MeasurementResult>) {
        self.sync_measurement_overlay();
        if let Some(result) = completed {
            self.callbacks.get().on_measurement_result(result);
        }
    }

    /// Mirror the session onto the overlay layer.
    fn sync_measurement_overlay(&self) {
        let overlay = {
            let session = self.measurement.lock();
            session.is_armed().then(|| session.overlay())
        };
        match overlay {
            Some(data) => {
                let _ = self.upsert_layer(overlay_descriptor(), LayerData::Features(data));
            }
            None => {
                if self.registry.remove(MEASUREMENT_OVERLAY_LAYER) {
                    self.rebind();
                }
            }
        }
    }
}

impl FallbackSink for EngineCore {
    fn fallback_applied(&self, snapshot: Arc<FallbackSnapshot>) {
        let data = LayerData::Features(snapshot.data().clone());
        if self.upsert_layer(fallback_descriptor(), data).is_ok() {
            self.callbacks
                .get()
                .on_fallback_applied(snapshot.bounds(), snapshot.len());
        }
    }

    fn fallback_failed(&self, bounds: Bounds, error: &ProviderError) {
        self.callbacks.get().on_fallback_error(bounds, error);
    }
}

fn fallback_descriptor() -> LayerDescriptor {
    LayerDescriptor::new(FALLBACK_PARCEL_LAYER, SourceKind::GeoJson)
        .with_role(LayerRole::Parcel)
        .with_paint(PaintLayerSpec::fill("#f4a261").with_paint("fill-opacity", json!(0.15)))
        .with_paint(PaintLayerSpec::outline("#e76f51", 1.0))
}

fn overlay_descriptor() -> LayerDescriptor {
    LayerDescriptor::new(MEASUREMENT_OVERLAY_LAYER, SourceKind::GeoJson)
        .with_paint(PaintLayerSpec::fill("#ffb703"))
        .with_paint(PaintLayerSpec::outline("#fb8500", 2.5))
        .with_paint(PaintLayerSpec::circle("#fb8500", 4.0))
        .with_opacity(0.8)
}
