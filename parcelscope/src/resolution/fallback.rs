//! Fallback polygon tier.
//!
//! Viewport changes are debounced: each [`FallbackTier::schedule`] call
//! cancels the pending one and waits for the debounce window before
//! fetching. A result is applied only if no newer request was issued in the
//! meantime (last request wins, not first response). A failed fetch keeps the
//! previous snapshot and records the error for the retry affordance.

use std::sync::Arc;
use std::time::Duration;

use geojson::FeatureCollection;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::feature::{attributes_from_json, Attributes, ParcelFeature, Provenance};
use crate::geometry::{feature_geometry, feature_id, hit_test, Bounds, LngLat};
use crate::provider::{FallbackParcelProvider, ProviderError};

/// Receives fallback results once they are applied.
pub trait FallbackSink: Send + Sync {
    /// A fresh snapshot replaced the previous one.
    fn fallback_applied(&self, snapshot: Arc<FallbackSnapshot>);

    /// The latest fetch failed; the previous snapshot is still in place.
    fn fallback_failed(&self, bounds: Bounds, error: &ProviderError);
}

#[derive(Debug, Clone)]
struct IndexedParcel {
    id: Option<String>,
    geometry: geo::Geometry<f64>,
    geojson: geojson::Geometry,
    attributes: Attributes,
}

/// Parcels fetched for one viewport.
#[derive(Debug, Clone)]
pub struct FallbackSnapshot {
    bounds: Bounds,
    data: FeatureCollection,
    parcels: Vec<IndexedParcel>,
}

impl FallbackSnapshot {
    /// Index a collection for point lookups.
    ///
    /// Features without usable geometry stay in [`Self::data`] but are never
    /// returned by [`Self::parcel_at`].
    pub fn new(bounds: Bounds, data: FeatureCollection, id_property: &str) -> Self {
        let mut parcels = Vec::with_capacity(data.features.len());
        for (index, feature) in data.features.iter().enumerate() {
            let (Ok(Some(geometry)), Some(geojson)) = (feature_geometry(feature), &feature.geometry)
            else {
                tracing::warn!(index, "Skipping fallback feature without usable geometry");
                continue;
            };
            parcels.push(IndexedParcel {
                id: feature_id(feature, id_property),
                geometry,
                geojson: geojson.clone(),
                attributes: feature
                    .properties
                    .as_ref()
                    .map(attributes_from_json)
                    .unwrap_or_default(),
            });
        }

        Self {
            bounds,
            data,
            parcels,
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn data(&self) -> &FeatureCollection {
        &self.data
    }

    /// Number of parcels usable for lookups.
    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }

    /// First parcel polygon containing `point`.
    pub fn parcel_at(&self, point: LngLat) -> Option<ParcelFeature> {
        self.parcels
            .iter()
            .find(|p| hit_test(&p.geometry, point, 0.0))
            .map(|p| ParcelFeature {
                id: p.id.clone(),
                geometry: Some(p.geojson.clone()),
                attributes: p.attributes.clone(),
                provenance: Provenance::Fallback,
                enriched: false,
            })
    }
}

#[derive(Default)]
struct FallbackState {
    generation: u64,
    pending: Option<CancellationToken>,
    last_bounds: Option<Bounds>,
    snapshot: Option<Arc<FallbackSnapshot>>,
    last_error: Option<String>,
}

/// Debounced, viewport-keyed fallback fetcher.
pub struct FallbackTier {
    provider: Arc<dyn FallbackParcelProvider>,
    debounce: Duration,
    id_property: String,
    state: Mutex<FallbackState>,
}

impl FallbackTier {
    pub fn new(
        provider: Arc<dyn FallbackParcelProvider>,
        debounce: Duration,
        id_property: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            debounce,
            id_property: id_property.into(),
            state: Mutex::new(FallbackState::default()),
        }
    }

    /// Request parcels for `bounds` once the viewport settles.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime, as the fetch runs on a
    /// spawned task. [`FallbackTier::retry`] has the same requirement.
    pub fn schedule(self: &Arc<Self>, bounds: Bounds, sink: Arc<dyn FallbackSink>) -> JoinHandle<()> {
        self.issue(bounds, self.debounce, sink)
    }

    /// Re-issue the last requested viewport without waiting.
    ///
    /// Returns `None` when nothing was ever requested.
    pub fn retry(self: &Arc<Self>, sink: Arc<dyn FallbackSink>) -> Option<JoinHandle<()>> {
        let bounds = self.state.lock().last_bounds?;
        tracing::info!(bounds = %bounds, "Retrying fallback fetch");
        Some(self.issue(bounds, Duration::ZERO, sink))
    }

    /// Drop any pending or in-flight request.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        if let Some(token) = state.pending.take() {
            token.cancel();
        }
    }

    /// Last applied snapshot.
    pub fn snapshot(&self) -> Option<Arc<FallbackSnapshot>> {
        self.state.lock().snapshot.clone()
    }

    /// Fallback parcel under `point` in the current snapshot.
    pub fn parcel_at(&self, point: LngLat) -> Option<ParcelFeature> {
        self.snapshot()?.parcel_at(point)
    }

    /// Error from the most recent fetch, cleared on success.
    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    fn issue(self: &Arc<Self>, bounds: Bounds, delay: Duration, sink: Arc<dyn FallbackSink>) -> JoinHandle<()> {
        let token = CancellationToken::new();
        let generation = {
            let mut state = self.state.lock();
            if let Some(previous) = state.pending.replace(token.clone()) {
                previous.cancel();
            }
            state.generation += 1;
            state.last_bounds = Some(bounds);
            state.generation
        };

        tracing::debug!(bounds = %bounds, generation, "Fallback fetch scheduled");

        let tier = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(generation, "Fallback request superseded before fetch");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            let result = tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(generation, "Fallback fetch superseded in flight");
                    return;
                }
                result = tier.provider.fetch_parcels_in_bounds(bounds) => result,
            };

            tier.apply(generation, bounds, result, sink.as_ref());
        })
    }

    fn apply(
        &self,
        generation: u64,
        bounds: Bounds,
        result: Result<FeatureCollection, ProviderError>,
        sink: &dyn FallbackSink,
    ) {
        let mut state = self.state.lock();
        if state.generation != generation {
            tracing::debug!(generation, current = state.generation, "Discarding stale fallback result");
            return;
        }
        state.pending = None;

        match result {
            Ok(data) => {
                let snapshot = Arc::new(FallbackSnapshot::new(bounds, data, &self.id_property));
                state.snapshot = Some(Arc::clone(&snapshot));
                state.last_error = None;
                drop(state);

                tracing::info!(bounds = %bounds, parcels = snapshot.len(), "Fallback parcels applied");
                sink.fallback_applied(snapshot);
            }
            Err(e) => {
                state.last_error = Some(e.to_string());
                let kept = state.snapshot.is_some();
                drop(state);

                tracing::warn!(
                    bounds = %bounds,
                    error = %e,
                    kept_previous = kept,
                    "Fallback fetch failed"
                );
                sink.fallback_failed(bounds, &e);
            }
        }
    }
}
