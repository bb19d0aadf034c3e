//! Host callback interface.

use std::sync::Arc;

use parking_lot::RwLock;

use super::FeatureDetail;
use crate::basemap::StyleError;
use crate::geometry::{Bounds, LngLat};
use crate::layers::LayerError;
use crate::measurement::MeasurementResult;
use crate::provider::ProviderError;
use crate::resolution::ParcelFeature;

/// Notifications delivered to the embedding application.
///
/// Every method has an empty default so hosts implement only what they use.
pub trait HostCallbacks: Send + Sync {
    fn on_parcel_resolved(&self, _parcel: &ParcelFeature) {}

    /// All tiers came back empty for a click.
    fn on_no_parcel_found(&self, _point: LngLat) {}

    /// A click was ignored because the view is zoomed out too far.
    fn on_zoom_advisory(&self, _min_zoom: f64) {}

    fn on_measurement_result(&self, _result: &MeasurementResult) {}

    fn on_layer_error(&self, _layer_id: &str, _error: &LayerError) {}

    fn on_style_error(&self, _error: &StyleError) {}

    /// Fallback parcels for `bounds` are on the map.
    fn on_fallback_applied(&self, _bounds: Bounds, _parcels: usize) {}

    /// A fallback fetch failed; calling `retry_fallback` re-issues it.
    fn on_fallback_error(&self, _bounds: Bounds, _error: &ProviderError) {}

    fn on_feature_detail(&self, _detail: &FeatureDetail) {}
}

/// Callbacks that ignore everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

impl HostCallbacks for NoopCallbacks {}

/// Holds the most recent host callbacks.
///
/// Handlers read through the cell at call time, so replacing the callbacks
/// takes effect without rebinding anything.
pub struct CallbackCell {
    current: RwLock<Arc<dyn HostCallbacks>>,
}

impl CallbackCell {
    pub fn new(callbacks: Arc<dyn HostCallbacks>) -> Self {
        Self {
            current: RwLock::new(callbacks),
        }
    }

    /// Replace the callbacks.
    pub fn replace(&self, callbacks: Arc<dyn HostCallbacks>) {
        *self.current.write() = callbacks;
    }

    /// Current callbacks. The lock is released before the caller invokes them.
    pub fn get(&self) -> Arc<dyn HostCallbacks> {
        Arc::clone(&self.current.read())
    }
}

impl Default for CallbackCell {
    fn default() -> Self {
        Self::new(Arc::new(NoopCallbacks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Counting {
        advisories: Mutex<Vec<f64>>,
    }

    impl HostCallbacks for Counting {
        fn on_zoom_advisory(&self, min_zoom: f64) {
            self.advisories.lock().push(min_zoom);
        }
    }

    #[test]
    fn test_cell_dispatches_to_latest_callbacks() {
        let first = Arc::new(Counting::default());
        let second = Arc::new(Counting::default());
        let cell = CallbackCell::new(first.clone());

        cell.get().on_zoom_advisory(14.0);
        cell.replace(second.clone());
        cell.get().on_zoom_advisory(15.0);

        assert_eq!(*first.advisories.lock(), vec![14.0]);
        assert_eq!(*second.advisories.lock(), vec![15.0]);
    }
}
