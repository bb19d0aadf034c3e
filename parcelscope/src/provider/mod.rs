//! Data provider abstraction
//!
//! Traits and HTTP implementations for the external services the engine
//! consumes: the report data provider (parcel records by id or coordinate)
//! and the fallback polygon provider (parcel outlines per viewport).
//!
//! Providers are dyn-compatible and shared as `Arc<dyn ...>`. HTTP-backed
//! implementations are generic over [`AsyncHttpClient`] so tests can inject
//! a mock transport:
//!
//! ```ignore
//! use parcelscope::provider::{AsyncReqwestClient, HttpReportProvider};
//!
//! let http_client = AsyncReqwestClient::new()?;
//! let provider = HttpReportProvider::new(http_client, "https://reports.example.com", "parcel_id");
//! let record = provider.enrich_parcel("0123-456").await?;
//! ```

mod fallback;
mod http;
mod report;
mod types;

pub use fallback::{FallbackParcelProvider, HttpFallbackProvider};
pub use http::{AsyncHttpClient, AsyncReqwestClient, DEFAULT_HTTP_TIMEOUT_SECS};
pub use report::{parse_parcel_record, HttpReportProvider, ParcelRecord, ReportDataProvider};
pub use types::{BoxFuture, ProviderError};

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;

#[cfg(test)]
pub mod mock;
