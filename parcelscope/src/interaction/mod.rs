//! Interaction routing
//!
//! Maps clicks and hovers on the map to the layer they landed on. Parcel
//! layers hand the click to the resolution chain; detail layers answer
//! synchronously from the clicked feature's own properties.

mod callbacks;
mod router;

pub use callbacks::{CallbackCell, HostCallbacks, NoopCallbacks};
pub use router::{ClickRoute, CursorStyle, InteractionRouter};

use crate::resolution::AttributeValue;

/// Popup content for a clicked detail-layer feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDetail {
    pub layer_id: String,
    pub title: String,
    pub feature_id: Option<String>,
    /// Field name and value, in template order.
    pub fields: Vec<(String, AttributeValue)>,
}
