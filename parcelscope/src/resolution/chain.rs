//! Tiered parcel resolver.
//!
//! # Tile tier availability
//!
//! ```text
//! Active --401/403/404/410 or mark_unavailable--> Unavailable (sticky)
//! Active --other tile error--> Active (recorded as last error)
//! OptedOut: set from configuration, never changes
//! ```
//!
//! Clicks are serialized: one click runs all of its tiers before the next
//! starts, so results are always delivered in click order.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use super::fallback::FallbackTier;
use super::feature::{attributes_from_json, ParcelFeature, Provenance};
use super::{ResolutionConfig, ResolutionOutcome, ResolutionTierState, ViewportState};
use crate::geometry::LngLat;
use crate::provider::{ProviderError, ReportDataProvider};
use crate::surface::RenderedFeature;

/// Tile statuses meaning the parcel tile service is gone for this session.
const UNAVAILABLE_STATUSES: [u16; 4] = [401, 403, 404, 410];

/// Rendered parcel tile features, as seen by the resolver.
pub trait TileFeatureSource: Send + Sync {
    /// Whether a parcel tile layer is registered on the surface.
    fn is_ready(&self) -> bool;

    /// Parcel tile features under `point`, top-most first.
    fn features_at(&self, point: LngLat) -> Vec<RenderedFeature>;
}

/// Availability of the tile tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileTierStatus {
    Active,
    /// Disabled by configuration.
    OptedOut,
    /// The tile service failed permanently for this session.
    Unavailable { status: Option<u16>, reason: String },
}

/// Resolves clicks to parcels through the tile, fallback and coordinate tiers.
pub struct ParcelResolver {
    config: ResolutionConfig,
    tiles: Arc<dyn TileFeatureSource>,
    report: Arc<dyn ReportDataProvider>,
    fallback: Option<Arc<FallbackTier>>,
    tile_status: Mutex<TileTierStatus>,
    last_error: Mutex<Option<String>>,
    clicks: tokio::sync::Mutex<()>,
}

impl ParcelResolver {
    pub fn new(
        config: ResolutionConfig,
        tiles: Arc<dyn TileFeatureSource>,
        report: Arc<dyn ReportDataProvider>,
        fallback: Option<Arc<FallbackTier>>,
    ) -> Self {
        let tile_status = if config.tile_opt_out {
            TileTierStatus::OptedOut
        } else {
            TileTierStatus::Active
        };
        Self {
            config,
            tiles,
            report,
            fallback,
            tile_status: Mutex::new(tile_status),
            last_error: Mutex::new(None),
            clicks: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    pub fn fallback(&self) -> Option<&Arc<FallbackTier>> {
        self.fallback.as_ref()
    }

    pub fn tile_status(&self) -> TileTierStatus {
        self.tile_status.lock().clone()
    }

    /// Whether clicks currently go to the tile tier.
    pub fn tile_tier_usable(&self) -> bool {
        *self.tile_status.lock() == TileTierStatus::Active && self.tiles.is_ready()
    }

    /// Whether the fallback tier should be fetching for a view at `zoom`.
    pub fn fallback_eligible(&self, zoom: f64) -> bool {
        self.fallback.is_some() && zoom >= self.config.min_zoom && !self.tile_tier_usable()
    }

    /// Record a tile loading error reported by the surface.
    ///
    /// Returns `true` when the error disabled the tile tier for the rest of
    /// the session.
    pub fn report_tile_error(&self, error: &ProviderError) -> bool {
        *self.last_error.lock() = Some(error.to_string());

        match error.status() {
            Some(status) if UNAVAILABLE_STATUSES.contains(&status) => {
                self.disable_tiles(Some(status), error.to_string());
                true
            }
            _ => {
                tracing::warn!(error = %error, "Transient parcel tile error");
                false
            }
        }
    }

    /// Disable the tile tier for the rest of the session.
    pub fn mark_tile_unavailable(&self, reason: impl Into<String>) {
        self.disable_tiles(None, reason.into());
    }

    fn disable_tiles(&self, status: Option<u16>, reason: String) {
        let mut current = self.tile_status.lock();
        if *current != TileTierStatus::Active {
            return;
        }
        tracing::warn!(status = ?status, reason = %reason, "Parcel tile tier unavailable for session");
        *current = TileTierStatus::Unavailable { status, reason };
    }

    /// Snapshot of tier availability for a viewport.
    pub fn tier_state(&self, viewport: Option<&ViewportState>) -> ResolutionTierState {
        let tile_source_ready = self.tile_tier_usable();
        let fallback_active = viewport.is_some_and(|v| self.fallback_eligible(v.zoom));
        let last_error = self
            .fallback
            .as_ref()
            .and_then(|f| f.last_error())
            .or_else(|| self.last_error.lock().clone());

        ResolutionTierState {
            tile_source_ready,
            fallback_active,
            last_error,
        }
    }

    /// Resolve the parcel under `point` for a view at `zoom`.
    ///
    /// Never fails: provider errors fall through to the next tier and an
    /// empty result is [`ResolutionOutcome::NotFound`].
    pub async fn resolve(&self, point: LngLat, zoom: f64) -> ResolutionOutcome {
        let _click = self.clicks.lock().await;

        if zoom < self.config.min_zoom {
            tracing::info!(zoom, min_zoom = self.config.min_zoom, "Click below minimum parcel zoom");
            return ResolutionOutcome::ZoomIn {
                min_zoom: self.config.min_zoom,
            };
        }

        if self.tile_tier_usable() {
            let hit = self.tiles.features_at(point).into_iter().next();
            match hit {
                Some(feature) => {
                    tracing::debug!(point = %point, layer = %feature.layer_id, "Tile tier hit");
                    return ResolutionOutcome::Resolved(self.enrich(feature).await);
                }
                None => tracing::debug!(point = %point, "Tile tier found no parcel"),
            }
        } else if let Some(parcel) = self.fallback.as_ref().and_then(|f| f.parcel_at(point)) {
            tracing::debug!(point = %point, parcel = ?parcel.id, "Fallback tier hit");
            return ResolutionOutcome::Resolved(parcel);
        }

        match self.coordinate_query(point).await {
            Some(parcel) => ResolutionOutcome::Resolved(parcel),
            None => {
                tracing::info!(point = %point, "No parcel found");
                ResolutionOutcome::NotFound
            }
        }
    }

    /// Build a tile parcel, replacing its attributes with the canonical
    /// record when the report provider has one.
    async fn enrich(&self, feature: RenderedFeature) -> ParcelFeature {
        let raw = ParcelFeature {
            id: property_text(&feature.properties, &self.config.parcel_id_property)
                .or(feature.id),
            geometry: feature
                .geometry
                .as_ref()
                .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
            attributes: attributes_from_json(&feature.properties),
            provenance: Provenance::Tile,
            enriched: false,
        };

        let Some(parcel_id) = raw.id.clone() else {
            tracing::warn!("Tile parcel has no identifier, using tile attributes");
            return raw;
        };

        let lookup = self.report.enrich_parcel(&parcel_id);
        match tokio::time::timeout(self.config.enrichment_timeout, lookup).await {
            Ok(Ok(Some(record))) => {
                let mut attributes = raw.attributes;
                attributes.extend(record.attributes);
                ParcelFeature {
                    id: record.id.or(raw.id),
                    geometry: raw.geometry.or(record.geometry),
                    attributes,
                    provenance: Provenance::Tile,
                    enriched: true,
                }
            }
            Ok(Ok(None)) => {
                tracing::debug!(parcel = %parcel_id, "No report record, using tile attributes");
                raw
            }
            Ok(Err(e)) => {
                tracing::warn!(parcel = %parcel_id, error = %e, "Enrichment failed, using tile attributes");
                *self.last_error.lock() = Some(e.to_string());
                raw
            }
            Err(_) => {
                let e = ProviderError::Timeout(self.config.enrichment_timeout);
                tracing::warn!(parcel = %parcel_id, error = %e, "Enrichment timed out, using tile attributes");
                *self.last_error.lock() = Some(e.to_string());
                raw
            }
        }
    }

    async fn coordinate_query(&self, point: LngLat) -> Option<ParcelFeature> {
        let lookup = self.report.lookup_parcel_by_coordinate(point);
        let error = match tokio::time::timeout(self.config.coordinate_timeout, lookup).await {
            Ok(Ok(Some(record))) => {
                tracing::debug!(point = %point, parcel = ?record.id, "Coordinate query hit");
                // Point lookups carry no outline, whatever the provider sent.
                return Some(ParcelFeature {
                    id: record.id,
                    geometry: None,
                    attributes: record.attributes,
                    provenance: Provenance::CoordinateQuery,
                    enriched: true,
                });
            }
            Ok(Ok(None)) => return None,
            Ok(Err(e)) => e,
            Err(_) => ProviderError::Timeout(self.config.coordinate_timeout),
        };

        tracing::warn!(point = %point, error = %error, "Coordinate query failed");
        *self.last_error.lock() = Some(error.to_string());
        None
    }
}

fn property_text(properties: &Map<String, Value>, key: &str) -> Option<String> {
    match properties.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Bounds;
    use crate::provider::mock::{MockFallbackProvider, MockReportProvider};
    use crate::provider::ParcelRecord;
    use crate::resolution::{AttributeValue, FallbackSink, FallbackSnapshot};
    use geojson::{Feature, FeatureCollection, Geometry, Value as GeoValue};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeTiles {
        ready: bool,
        features: Vec<RenderedFeature>,
        queries: AtomicUsize,
    }

    impl TileFeatureSource for FakeTiles {
        fn is_ready(&self) -> bool {
            self.ready
        }

        fn features_at(&self, _point: LngLat) -> Vec<RenderedFeature> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.features.clone()
        }
    }

    struct NoopSink;

    impl FallbackSink for NoopSink {
        fn fallback_applied(&self, _snapshot: Arc<FallbackSnapshot>) {}
        fn fallback_failed(&self, _bounds: Bounds, _error: &ProviderError) {}
    }

    fn tile_feature(parcel_id: &str) -> RenderedFeature {
        let mut properties = Map::new();
        properties.insert("parcel_id".into(), parcel_id.into());
        properties.insert("owner".into(), "Tile Owner".into());
        RenderedFeature {
            layer_id: "parcels-fill".into(),
            source_id: "parcels-source".into(),
            id: None,
            properties,
            geometry: Some(geo::Geometry::Point(geo::Point::new(-97.0, 35.0))),
        }
    }

    fn record(id: &str, owner: &str) -> ParcelRecord {
        let mut attributes = crate::resolution::Attributes::new();
        attributes.insert("owner".into(), AttributeValue::from(owner));
        attributes.insert("acres".into(), AttributeValue::from(2.5));
        ParcelRecord {
            id: Some(id.to_string()),
            attributes,
            geometry: None,
        }
    }

    fn fallback_collection() -> FeatureCollection {
        let mut props = Map::new();
        props.insert("parcel_id".into(), "FB-1".into());
        FeatureCollection {
            bbox: None,
            features: vec![Feature {
                bbox: None,
                geometry: Some(Geometry::new(GeoValue::Polygon(vec![vec![
                    vec![-97.01, 34.99],
                    vec![-96.99, 34.99],
                    vec![-96.99, 35.01],
                    vec![-97.01, 35.01],
                    vec![-97.01, 34.99],
                ]]))),
                id: None,
                properties: Some(props),
                foreign_members: None,
            }],
            foreign_members: None,
        }
    }

    fn click_point() -> LngLat {
        LngLat::new(-97.0, 35.0)
    }

    fn resolver(
        tiles: Arc<FakeTiles>,
        report: Arc<MockReportProvider>,
        fallback: Option<Arc<FallbackTier>>,
    ) -> ParcelResolver {
        ParcelResolver::new(ResolutionConfig::default(), tiles, report, fallback)
    }

    #[tokio::test]
    async fn test_below_min_zoom_makes_no_calls() {
        let tiles = Arc::new(FakeTiles {
            ready: true,
            features: vec![tile_feature("P-1")],
            ..Default::default()
        });
        let report = Arc::new(MockReportProvider::new());
        let resolver = resolver(tiles.clone(), report.clone(), None);

        let outcome = resolver.resolve(click_point(), 10.0).await;
        assert_eq!(outcome, ResolutionOutcome::ZoomIn { min_zoom: 14.0 });
        assert_eq!(tiles.queries.load(Ordering::SeqCst), 0);
        assert_eq!(report.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_tile_hit_is_enriched_and_short_circuits() {
        let tiles = Arc::new(FakeTiles {
            ready: true,
            features: vec![tile_feature("P-1")],
            ..Default::default()
        });
        let report = Arc::new(
            MockReportProvider::new()
                .with_record("P-1", Ok(Some(record("P-1", "Canonical Owner"))))
                .with_coordinate(Ok(Some(record("COORD", "Wrong")))),
        );
        let resolver = resolver(tiles, report.clone(), None);

        let outcome = resolver.resolve(click_point(), 16.0).await;
        let parcel = outcome.parcel().unwrap();
        assert_eq!(parcel.provenance, Provenance::Tile);
        assert!(parcel.enriched);
        assert_eq!(parcel.id.as_deref(), Some("P-1"));
        assert_eq!(parcel.attribute("owner"), Some(&AttributeValue::from("Canonical Owner")));
        assert_eq!(parcel.attribute("acres"), Some(&AttributeValue::Number(2.5)));
        assert!(parcel.geometry.is_some());
        assert!(report.coordinate_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_enrichment_failure_keeps_tile_attributes() {
        let tiles = Arc::new(FakeTiles {
            ready: true,
            features: vec![tile_feature("P-2")],
            ..Default::default()
        });
        let report = Arc::new(
            MockReportProvider::new()
                .with_record("P-2", Err(ProviderError::HttpError("connection refused".into()))),
        );
        let resolver = resolver(tiles, report.clone(), None);

        let parcel = resolver.resolve(click_point(), 15.0).await.parcel().cloned().unwrap();
        assert_eq!(parcel.provenance, Provenance::Tile);
        assert!(!parcel.enriched);
        assert_eq!(parcel.attribute("owner"), Some(&AttributeValue::from("Tile Owner")));
        assert!(report.coordinate_calls.lock().is_empty());
        assert!(resolver.tier_state(None).last_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrichment_timeout_keeps_tile_attributes() {
        let tiles = Arc::new(FakeTiles {
            ready: true,
            features: vec![tile_feature("P-3")],
            ..Default::default()
        });
        let report = Arc::new(
            MockReportProvider::new()
                .with_record("P-3", Ok(Some(record("P-3", "Late"))))
                .with_delay(Duration::from_secs(60)),
        );
        let resolver = resolver(tiles, report, None);

        let parcel = resolver.resolve(click_point(), 15.0).await.parcel().cloned().unwrap();
        assert!(!parcel.enriched);
        assert_eq!(parcel.attribute("owner"), Some(&AttributeValue::from("Tile Owner")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_tile_result_goes_to_coordinate_query() {
        let tiles = Arc::new(FakeTiles {
            ready: true,
            ..Default::default()
        });
        let report = Arc::new(MockReportProvider::new().with_coordinate(Ok(Some(record("C-1", "Coord")))));
        let provider = Arc::new(MockFallbackProvider::ok(fallback_collection()));
        let fallback = Arc::new(FallbackTier::new(provider, Duration::from_millis(500), "parcel_id"));
        fallback
            .schedule(Bounds::new(-98.0, 34.0, -96.0, 36.0), Arc::new(NoopSink))
            .await
            .unwrap();
        let resolver = resolver(tiles, report.clone(), Some(fallback));

        let parcel = resolver.resolve(click_point(), 15.0).await.parcel().cloned().unwrap();
        assert_eq!(parcel.provenance, Provenance::CoordinateQuery);
        assert!(parcel.geometry.is_none());
        assert_eq!(parcel.id.as_deref(), Some("C-1"));
        assert_eq!(report.coordinate_calls.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_tile_source_is_sticky() {
        let tiles = Arc::new(FakeTiles {
            ready: true,
            features: vec![tile_feature("P-1")],
            ..Default::default()
        });
        let report = Arc::new(MockReportProvider::new());
        let provider = Arc::new(MockFallbackProvider::ok(fallback_collection()));
        let fallback = Arc::new(FallbackTier::new(provider, Duration::from_millis(500), "parcel_id"));
        let resolver = resolver(tiles.clone(), report.clone(), Some(fallback.clone()));

        let disabled = resolver.report_tile_error(&ProviderError::Status {
            status: 403,
            url: "https://tiles.example.com/parcels/0/0/0.pbf".into(),
        });
        assert!(disabled);
        assert!(matches!(
            resolver.tile_status(),
            TileTierStatus::Unavailable { status: Some(403), .. }
        ));
        assert!(resolver.fallback_eligible(15.0));

        fallback
            .schedule(Bounds::new(-98.0, 34.0, -96.0, 36.0), Arc::new(NoopSink))
            .await
            .unwrap();

        for _ in 0..3 {
            let parcel = resolver.resolve(click_point(), 15.0).await.parcel().cloned().unwrap();
            assert_eq!(parcel.provenance, Provenance::Fallback);
            assert_eq!(parcel.id.as_deref(), Some("FB-1"));
        }
        assert_eq!(tiles.queries.load(Ordering::SeqCst), 0);
        assert_eq!(report.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_transient_tile_error_is_not_sticky() {
        let tiles = Arc::new(FakeTiles {
            ready: true,
            features: vec![tile_feature("P-1")],
            ..Default::default()
        });
        let resolver = resolver(tiles.clone(), Arc::new(MockReportProvider::new()), None);

        let disabled = resolver.report_tile_error(&ProviderError::Status {
            status: 503,
            url: "https://tiles.example.com/parcels/0/0/0.pbf".into(),
        });
        assert!(!disabled);
        assert_eq!(resolver.tile_status(), TileTierStatus::Active);

        let parcel = resolver.resolve(click_point(), 15.0).await.parcel().cloned().unwrap();
        assert_eq!(parcel.provenance, Provenance::Tile);
    }

    #[tokio::test]
    async fn test_coordinate_error_reports_not_found_once() {
        let tiles = Arc::new(FakeTiles::default());
        let report = Arc::new(
            MockReportProvider::new().with_coordinate(Err(ProviderError::Status {
                status: 500,
                url: "https://reports.example.com/parcels/lookup".into(),
            })),
        );
        let resolver = resolver(tiles, report.clone(), None);

        let outcome = resolver.resolve(click_point(), 15.0).await;
        assert_eq!(outcome, ResolutionOutcome::NotFound);
        assert_eq!(report.coordinate_calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_coordinate_query_drops_record_geometry() {
        let mut located = record("C-2", "Coord");
        located.geometry = Some(Geometry::new(GeoValue::Point(vec![-97.0, 35.0])));
        let report = Arc::new(MockReportProvider::new().with_coordinate(Ok(Some(located))));
        let resolver = resolver(Arc::new(FakeTiles::default()), report, None);

        let parcel = resolver.resolve(click_point(), 16.0).await.parcel().cloned().unwrap();
        assert_eq!(parcel.provenance, Provenance::CoordinateQuery);
        assert_eq!(parcel.id.as_deref(), Some("C-2"));
        assert!(parcel.geometry.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_coordinate_timeout_reports_not_found() {
        let report = Arc::new(
            MockReportProvider::new()
                .with_coordinate(Ok(Some(record("C-3", "Late"))))
                .with_delay(Duration::from_secs(60)),
        );
        let resolver = resolver(Arc::new(FakeTiles::default()), report.clone(), None);
        assert!(resolver.config().coordinate_timeout < Duration::from_secs(60));

        let outcome = resolver.resolve(click_point(), 15.0).await;
        assert_eq!(outcome, ResolutionOutcome::NotFound);
        assert_eq!(report.coordinate_calls.lock().len(), 1);
        assert!(resolver.tier_state(None).last_error.is_some());
    }

    #[tokio::test]
    async fn test_opt_out_skips_tile_tier() {
        let tiles = Arc::new(FakeTiles {
            ready: true,
            features: vec![tile_feature("P-1")],
            ..Default::default()
        });
        let report = Arc::new(MockReportProvider::new());
        let resolver = ParcelResolver::new(
            ResolutionConfig::default().with_tile_opt_out(true),
            tiles.clone(),
            report.clone(),
            None,
        );

        assert_eq!(resolver.tile_status(), TileTierStatus::OptedOut);
        assert_eq!(resolver.resolve(click_point(), 15.0).await, ResolutionOutcome::NotFound);
        assert_eq!(tiles.queries.load(Ordering::SeqCst), 0);
        assert_eq!(report.coordinate_calls.lock().len(), 1);
    }

    #[test]
    fn test_tier_state_reflects_viewport() {
        let tiles = Arc::new(FakeTiles::default());
        let provider = Arc::new(MockFallbackProvider::ok(fallback_collection()));
        let fallback = Arc::new(FallbackTier::new(provider, Duration::from_millis(500), "parcel_id"));
        let resolver = resolver(tiles, Arc::new(MockReportProvider::new()), Some(fallback));

        let bounds = Bounds::new(-98.0, 34.0, -96.0, 36.0);
        let near = ViewportState::new(15.0, bounds);
        let far = ViewportState::new(11.0, bounds);

        let state = resolver.tier_state(Some(&near));
        assert!(!state.tile_source_ready);
        assert!(state.fallback_active);
        assert!(!resolver.tier_state(Some(&far)).fallback_active);
        assert!(!resolver.tier_state(None).fallback_active);
    }
}
