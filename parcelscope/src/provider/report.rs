//! Report data provider: canonical parcel attributes.
//!
//! Two read-only lookups back the resolution chain:
//!
//! - `GET {base}/parcels/{id}` enriches a tile feature by identifier
//! - `GET {base}/parcels/lookup?lat={lat}&lng={lng}` is the coordinate query
//!
//! Both answer a JSON object. Attributes are read from an `attributes`
//! member when present, otherwise from the object itself. A 404 or a `null`
//! body means "not found".

use serde_json::Value;

use super::http::AsyncHttpClient;
use super::types::{BoxFuture, ProviderError};
use crate::geometry::LngLat;
use crate::resolution::{attributes_from_json, Attributes};

/// Canonical parcel record returned by the report data provider.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParcelRecord {
    pub id: Option<String>,
    pub attributes: Attributes,
    pub geometry: Option<geojson::Geometry>,
}

/// Read-only parcel record lookups.
pub trait ReportDataProvider: Send + Sync {
    /// Fetch canonical attributes for a parcel id. `Ok(None)` means not found.
    fn enrich_parcel<'a>(
        &'a self,
        parcel_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<ParcelRecord>, ProviderError>>;

    /// Find the parcel containing a position. `Ok(None)` means not found.
    fn lookup_parcel_by_coordinate(
        &self,
        position: LngLat,
    ) -> BoxFuture<'_, Result<Option<ParcelRecord>, ProviderError>>;
}

/// Report data provider over HTTP.
pub struct HttpReportProvider<C: AsyncHttpClient> {
    http_client: C,
    base_url: String,
    id_property: String,
}

impl<C: AsyncHttpClient> HttpReportProvider<C> {
    /// Creates a provider rooted at `base_url`.
    ///
    /// `id_property` names the attribute holding the parcel id when the
    /// response has no top-level `id`.
    pub fn new(http_client: C, base_url: impl Into<String>, id_property: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
            id_property: id_property.into(),
        }
    }

    fn url_with_segments(&self, segments: &[&str]) -> Result<reqwest::Url, ProviderError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ProviderError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Builds the enrichment URL for a parcel id.
    fn parcel_url(&self, parcel_id: &str) -> Result<String, ProviderError> {
        Ok(self.url_with_segments(&["parcels", parcel_id])?.to_string())
    }

    /// Builds the coordinate lookup URL.
    fn lookup_url(&self, position: LngLat) -> Result<String, ProviderError> {
        let mut url = self.url_with_segments(&["parcels", "lookup"])?;
        url.query_pairs_mut()
            .append_pair("lat", &position.lat.to_string())
            .append_pair("lng", &position.lng.to_string());
        Ok(url.to_string())
    }

    async fn fetch_record(&self, url: String) -> Result<Option<ParcelRecord>, ProviderError> {
        match self.http_client.get(&url).await {
            Ok(body) => parse_parcel_record(&body, &self.id_property),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<C: AsyncHttpClient> ReportDataProvider for HttpReportProvider<C> {
    fn enrich_parcel<'a>(
        &'a self,
        parcel_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<ParcelRecord>, ProviderError>> {
        Box::pin(async move {
            let url = self.parcel_url(parcel_id)?;
            self.fetch_record(url).await
        })
    }

    fn lookup_parcel_by_coordinate(
        &self,
        position: LngLat,
    ) -> BoxFuture<'_, Result<Option<ParcelRecord>, ProviderError>> {
        Box::pin(async move {
            let url = self.lookup_url(position)?;
            self.fetch_record(url).await
        })
    }
}

/// Decode a report provider response body.
pub fn parse_parcel_record(
    body: &[u8],
    id_property: &str,
) -> Result<Option<ParcelRecord>, ProviderError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("Invalid JSON: {}", e)))?;

    let object = match value {
        Value::Null => return Ok(None),
        Value::Object(object) => object,
        other => {
            return Err(ProviderError::InvalidResponse(format!(
                "Expected a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    let geometry = match object.get("geometry") {
        Some(Value::Null) | None => None,
        Some(g) => Some(
            serde_json::from_value::<geojson::Geometry>(g.clone())
                .map_err(|e| ProviderError::InvalidResponse(format!("Invalid geometry: {}", e)))?,
        ),
    };

    let attributes = match object.get("attributes") {
        Some(Value::Object(attrs)) => attributes_from_json(attrs),
        _ => {
            let mut flat = object.clone();
            flat.remove("geometry");
            attributes_from_json(&flat)
        }
    };

    let id = scalar_text(object.get("id")).or_else(|| match attributes.get(id_property) {
        Some(crate::resolution::AttributeValue::Text(s)) => Some(s.clone()),
        Some(crate::resolution::AttributeValue::Number(n)) => Some(n.to_string()),
        _ => None,
    });

    Ok(Some(ParcelRecord {
        id,
        attributes,
        geometry,
    }))
}

fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockAsyncHttpClient;
    use crate::resolution::AttributeValue;

    #[test]
    fn test_url_construction() {
        let provider = HttpReportProvider::new(
            MockAsyncHttpClient::ok("null"),
            "https://reports.example.com/api/",
            "parcel_id",
        );
        assert_eq!(
            provider.parcel_url("12-34/5").unwrap(),
            "https://reports.example.com/api/parcels/12-34%2F5"
        );
        assert_eq!(
            provider.lookup_url(LngLat::new(-75.5, 40.25)).unwrap(),
            "https://reports.example.com/api/parcels/lookup?lat=40.25&lng=-75.5"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let provider = HttpReportProvider::new(MockAsyncHttpClient::ok("null"), "not a url", "id");
        assert!(matches!(
            provider.parcel_url("1"),
            Err(ProviderError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_parse_nested_attributes() {
        let body = br#"{"id": "P-9", "attributes": {"owner": "Smith", "acres": 2.5},
            "geometry": {"type": "Point", "coordinates": [-75.0, 40.0]}}"#;
        let record = parse_parcel_record(body, "parcel_id").unwrap().unwrap();
        assert_eq!(record.id.as_deref(), Some("P-9"));
        assert_eq!(record.attributes["owner"], AttributeValue::Text("Smith".into()));
        assert!(record.geometry.is_some());
    }

    #[test]
    fn test_parse_flat_attributes_with_id_property() {
        let body = br#"{"parcel_id": 1187, "zoning": "R-2"}"#;
        let record = parse_parcel_record(body, "parcel_id").unwrap().unwrap();
        assert_eq!(record.id.as_deref(), Some("1187"));
        assert_eq!(record.attributes["zoning"], AttributeValue::Text("R-2".into()));
        assert!(record.geometry.is_none());
    }

    #[test]
    fn test_parse_null_and_garbage() {
        assert_eq!(parse_parcel_record(b"null", "id").unwrap(), None);
        assert!(parse_parcel_record(b"[1,2]", "id").is_err());
        assert!(parse_parcel_record(b"{oops", "id").is_err());
    }

    #[tokio::test]
    async fn test_not_found_status_is_none() {
        let client = MockAsyncHttpClient::err(ProviderError::Status {
            status: 404,
            url: "x".into(),
        });
        let provider = HttpReportProvider::new(client, "https://reports.example.com", "id");
        assert_eq!(provider.enrich_parcel("1").await, Ok(None));
    }

    #[tokio::test]
    async fn test_server_error_propagates() {
        let client = MockAsyncHttpClient::err(ProviderError::Status {
            status: 503,
            url: "x".into(),
        });
        let provider = HttpReportProvider::new(client, "https://reports.example.com", "id");
        let result = provider
            .lookup_parcel_by_coordinate(LngLat::new(0.0, 0.0))
            .await;
        assert!(matches!(result, Err(ProviderError::Status { status: 503, .. })));
    }
}
