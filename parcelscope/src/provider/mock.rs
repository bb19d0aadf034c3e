//! In-process provider doubles for unit tests.

use std::collections::HashMap;
use std::time::Duration;

use geojson::FeatureCollection;
use parking_lot::Mutex;

use super::{BoxFuture, FallbackParcelProvider, ParcelRecord, ProviderError, ReportDataProvider};
use crate::geometry::{Bounds, LngLat};

/// Report provider answering from fixed tables and counting calls.
#[derive(Default)]
pub struct MockReportProvider {
    records: HashMap<String, Result<Option<ParcelRecord>, ProviderError>>,
    coordinate: Option<Result<Option<ParcelRecord>, ProviderError>>,
    delay: Option<Duration>,
    pub enrich_calls: Mutex<Vec<String>>,
    pub coordinate_calls: Mutex<Vec<LngLat>>,
}

impl MockReportProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, id: &str, record: Result<Option<ParcelRecord>, ProviderError>) -> Self {
        self.records.insert(id.to_string(), record);
        self
    }

    pub fn with_coordinate(mut self, record: Result<Option<ParcelRecord>, ProviderError>) -> Self {
        self.coordinate = Some(record);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn total_calls(&self) -> usize {
        self.enrich_calls.lock().len() + self.coordinate_calls.lock().len()
    }
}

impl ReportDataProvider for MockReportProvider {
    fn enrich_parcel<'a>(
        &'a self,
        parcel_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<ParcelRecord>, ProviderError>> {
        Box::pin(async move {
            self.enrich_calls.lock().push(parcel_id.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.records.get(parcel_id).cloned().unwrap_or(Ok(None))
        })
    }

    fn lookup_parcel_by_coordinate(
        &self,
        position: LngLat,
    ) -> BoxFuture<'_, Result<Option<ParcelRecord>, ProviderError>> {
        Box::pin(async move {
            self.coordinate_calls.lock().push(position);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.coordinate.clone().unwrap_or(Ok(None))
        })
    }
}

/// Fallback provider serving one scripted response after an optional delay.
pub struct MockFallbackProvider {
    response: Mutex<Result<FeatureCollection, ProviderError>>,
    delay: Option<Duration>,
    pub requests: Mutex<Vec<Bounds>>,
}

impl MockFallbackProvider {
    pub fn ok(data: FeatureCollection) -> Self {
        Self {
            response: Mutex::new(Ok(data)),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_response(&self, response: Result<FeatureCollection, ProviderError>) {
        *self.response.lock() = response;
    }

    pub fn requested(&self) -> Vec<Bounds> {
        self.requests.lock().clone()
    }
}

impl FallbackParcelProvider for MockFallbackProvider {
    fn fetch_parcels_in_bounds(
        &self,
        bounds: Bounds,
    ) -> BoxFuture<'_, Result<FeatureCollection, ProviderError>> {
        Box::pin(async move {
            self.requests.lock().push(bounds);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.response.lock().clone()
        })
    }
}
