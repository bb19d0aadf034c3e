//! Style loading.

use super::style::{expand_tile_template, BasemapStyle, LoadedStyle};
use super::StyleError;
use crate::provider::{AsyncHttpClient, BoxFuture};

/// Loads the resources a style needs before it can be applied.
pub trait StyleLoader: Send + Sync {
    fn load(&self, style: BasemapStyle) -> BoxFuture<'_, Result<LoadedStyle, StyleError>>;
}

/// Loader that succeeds immediately, for offline and headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticStyleLoader;

impl StyleLoader for StaticStyleLoader {
    fn load(&self, style: BasemapStyle) -> BoxFuture<'_, Result<LoadedStyle, StyleError>> {
        Box::pin(async move { Ok(LoadedStyle::new(style)) })
    }
}

/// Loader that checks every tile template is reachable.
///
/// Fetches the zoom-0 tile of each raster layer; any failure fails the whole
/// style so a half-reachable style is never applied.
pub struct HttpStyleLoader<C: AsyncHttpClient> {
    http_client: C,
}

impl<C: AsyncHttpClient> HttpStyleLoader<C> {
    pub fn new(http_client: C) -> Self {
        Self { http_client }
    }
}

impl<C: AsyncHttpClient> StyleLoader for HttpStyleLoader<C> {
    fn load(&self, style: BasemapStyle) -> BoxFuture<'_, Result<LoadedStyle, StyleError>> {
        Box::pin(async move {
            let loaded = LoadedStyle::new(style);
            for template in &loaded.descriptor.raster_layers {
                let url = expand_tile_template(template, 0, 0, 0);
                self.http_client
                    .get(&url)
                    .await
                    .map_err(|source| StyleError::Load { style, source })?;
            }
            Ok(loaded)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockAsyncHttpClient, ProviderError};

    #[tokio::test]
    async fn test_http_loader_checks_each_layer() {
        let loader = HttpStyleLoader::new(MockAsyncHttpClient::ok(vec![0x89, 0x50]));
        let loaded = loader.load(BasemapStyle::Hybrid).await.unwrap();
        assert_eq!(loaded.style, BasemapStyle::Hybrid);

        let requested = loader.http_client.requested();
        assert_eq!(requested.len(), 2);
        assert!(requested.iter().all(|u| u.ends_with("/tile/0/0/0")));
    }

    #[tokio::test]
    async fn test_http_loader_failure() {
        let loader = HttpStyleLoader::new(MockAsyncHttpClient::err(ProviderError::HttpError(
            "dns error".into(),
        )));
        let result = loader.load(BasemapStyle::Satellite).await;
        assert!(matches!(
            result,
            Err(StyleError::Load {
                style: BasemapStyle::Satellite,
                ..
            })
        ));
    }
}
