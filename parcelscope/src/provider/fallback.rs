//! Fallback polygon provider: parcel outlines for a viewport.
//!
//! Used when the vector tile service is unavailable. The endpoint answers a
//! GeoJSON `FeatureCollection` for `GET {base}?bbox={west},{south},{east},{north}`.

use geojson::FeatureCollection;

use super::http::AsyncHttpClient;
use super::types::{BoxFuture, ProviderError};
use crate::geometry::Bounds;

/// Viewport-scoped parcel polygon source.
pub trait FallbackParcelProvider: Send + Sync {
    /// Fetch all parcels intersecting `bounds`.
    fn fetch_parcels_in_bounds(
        &self,
        bounds: Bounds,
    ) -> BoxFuture<'_, Result<FeatureCollection, ProviderError>>;
}

/// Fallback provider over HTTP.
pub struct HttpFallbackProvider<C: AsyncHttpClient> {
    http_client: C,
    base_url: String,
}

impl<C: AsyncHttpClient> HttpFallbackProvider<C> {
    /// Creates a provider for the endpoint at `base_url`.
    pub fn new(http_client: C, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }

    /// Builds the bounding-box query URL.
    fn build_url(&self, bounds: Bounds) -> Result<String, ProviderError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ProviderError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.query_pairs_mut()
            .append_pair("bbox", &bounds.to_bbox_param());
        Ok(url.to_string())
    }
}

impl<C: AsyncHttpClient> FallbackParcelProvider for HttpFallbackProvider<C> {
    fn fetch_parcels_in_bounds(
        &self,
        bounds: Bounds,
    ) -> BoxFuture<'_, Result<FeatureCollection, ProviderError>> {
        Box::pin(async move {
            let url = self.build_url(bounds)?;
            let body = self.http_client.get(&url).await?;
            serde_json::from_slice::<FeatureCollection>(&body).map_err(|e| {
                ProviderError::InvalidResponse(format!("Invalid FeatureCollection: {}", e))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockAsyncHttpClient;

    const BODY: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "id": "F-1",
            "properties": {"owner": "Jones"},
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}
        }]
    }"#;

    #[test]
    fn test_url_construction() {
        let provider = HttpFallbackProvider::new(
            MockAsyncHttpClient::ok(BODY),
            "https://gis.example.com/parcels/query",
        );
        let url = provider.build_url(Bounds::new(-75.5, 39.5, -75.0, 40.0)).unwrap();
        assert_eq!(
            url,
            "https://gis.example.com/parcels/query?bbox=-75.5%2C39.5%2C-75%2C40"
        );
    }

    #[tokio::test]
    async fn test_fetch_decodes_feature_collection() {
        let provider = HttpFallbackProvider::new(
            MockAsyncHttpClient::ok(BODY),
            "https://gis.example.com/parcels/query",
        );
        let fc = provider
            .fetch_parcels_in_bounds(Bounds::new(0.0, 0.0, 1.0, 1.0))
            .await
            .unwrap();
        assert_eq!(fc.features.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_collection() {
        let provider = HttpFallbackProvider::new(
            MockAsyncHttpClient::ok(r#"{"type": "Point", "coordinates": [0, 0]}"#),
            "https://gis.example.com/parcels/query",
        );
        let result = provider
            .fetch_parcels_in_bounds(Bounds::new(0.0, 0.0, 1.0, 1.0))
            .await;
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }
}
