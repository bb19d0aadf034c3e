//! Basemap management
//!
//! Owns the render surface's style. A style swap drops every source and
//! paint layer on the surface, so callers subscribe to
//! [`StyleEvent::StyleChanged`] (or inspect the returned [`StyleChange`])
//! and re-register their layers once the new style has loaded.
//!
//! # Example
//!
//! ```ignore
//! use parcelscope::basemap::{BasemapController, BasemapStyle, StaticStyleLoader};
//!
//! let controller = BasemapController::new(Arc::new(StaticStyleLoader), surface, prefs);
//! controller.set_style(BasemapStyle::Satellite).await?;
//! ```

mod controller;
mod loader;
mod style;

pub use controller::{BasemapController, StyleChange, StyleEvent};
pub use loader::{HttpStyleLoader, StaticStyleLoader, StyleLoader};
pub use style::{expand_tile_template, BasemapStyle, LoadedStyle, StyleDescriptor};

use thiserror::Error;

use crate::provider::ProviderError;

/// Errors raised while loading a style.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StyleError {
    /// A style resource could not be fetched.
    #[error("Failed to load {style} basemap: {source}")]
    Load {
        style: BasemapStyle,
        #[source]
        source: ProviderError,
    },
}
