//! Basemap controller.
//!
//! # State Machine
//!
//! ```text
//! Idle(current) --set_style(other)--> Loading(current, pending)
//! Loading --load ok, still latest--> Idle(pending)      [apply + StyleChanged]
//! Loading --load failed, latest--> Idle(current)        [StyleFailed]
//! Loading --newer set_style--> Loading(current, newer)  [older result discarded]
//! ```
//!
//! The surface is only touched once a load completes, so a failed load
//! leaves the previous style fully in place.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::loader::StyleLoader;
use super::style::BasemapStyle;
use super::StyleError;
use crate::preferences::{PreferenceStore, BASEMAP_STYLE_KEY};
use crate::surface::SharedSurface;

/// Capacity of the style event channel.
const STYLE_EVENT_CAPACITY: usize = 16;

/// Outcome of a [`BasemapController::set_style`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleChange {
    /// The requested style was already active.
    Unchanged,
    /// The surface now shows `current`.
    Changed {
        previous: Option<BasemapStyle>,
        current: BasemapStyle,
    },
    /// A newer request replaced this one before it finished loading.
    Superseded,
}

/// Broadcast to subscribers whenever a style load settles.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleEvent {
    /// The new style finished loading and was applied.
    StyleChanged {
        previous: Option<BasemapStyle>,
        current: BasemapStyle,
    },
    /// Loading failed; `active` is still shown.
    StyleFailed {
        requested: BasemapStyle,
        active: Option<BasemapStyle>,
        message: String,
    },
}

#[derive(Debug, Default)]
struct ControllerState {
    current: Option<BasemapStyle>,
    pending: Option<BasemapStyle>,
    generation: u64,
}

/// Swaps the render surface's style.
pub struct BasemapController {
    loader: Arc<dyn StyleLoader>,
    surface: SharedSurface,
    preferences: Arc<dyn PreferenceStore>,
    state: Mutex<ControllerState>,
    events: broadcast::Sender<StyleEvent>,
}

impl BasemapController {
    pub fn new(
        loader: Arc<dyn StyleLoader>,
        surface: SharedSurface,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(STYLE_EVENT_CAPACITY);
        Self {
            loader,
            surface,
            preferences,
            state: Mutex::new(ControllerState::default()),
            events,
        }
    }

    /// Style currently applied to the surface.
    pub fn current(&self) -> Option<BasemapStyle> {
        self.state.lock().current
    }

    /// Style currently loading, if any.
    pub fn pending(&self) -> Option<BasemapStyle> {
        self.state.lock().pending
    }

    /// Whether a style has finished loading.
    pub fn is_style_loaded(&self) -> bool {
        self.state.lock().current.is_some()
    }

    /// Subscribe to style events.
    pub fn subscribe(&self) -> broadcast::Receiver<StyleEvent> {
        self.events.subscribe()
    }

    /// Style to start with: the persisted choice, else `default`.
    pub fn initial_style(&self, default: BasemapStyle) -> BasemapStyle {
        match self.preferences.get(BASEMAP_STYLE_KEY) {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(value = %raw, error = %e, "Ignoring unparsable basemap preference");
                default
            }),
            None => default,
        }
    }

    /// Load and apply a style.
    ///
    /// Idempotent when `style` is already active and nothing else is
    /// loading. When calls overlap, only the most recent one is applied.
    ///
    /// # Errors
    ///
    /// Returns the load error when the latest request fails; the previous
    /// style stays active.
    pub async fn set_style(&self, style: BasemapStyle) -> Result<StyleChange, StyleError> {
        let generation = {
            let mut state = self.state.lock();
            if state.current == Some(style) && state.pending.is_none() {
                tracing::debug!(style = %style, "Basemap style unchanged");
                return Ok(StyleChange::Unchanged);
            }
            state.generation += 1;
            state.pending = Some(style);
            state.generation
        };

        tracing::info!(style = %style, "Loading basemap style");
        let result = self.loader.load(style).await;

        let mut state = self.state.lock();
        if state.generation != generation {
            tracing::debug!(style = %style, "Discarding superseded basemap load");
            return Ok(StyleChange::Superseded);
        }
        state.pending = None;

        match result {
            Ok(loaded) => {
                let previous = state.current.replace(style);
                self.surface.lock().apply_style(&loaded);
                drop(state);

                if let Err(e) = self.preferences.set(BASEMAP_STYLE_KEY, style.as_str()) {
                    tracing::warn!(error = %e, "Failed to persist basemap style");
                }

                tracing::info!(
                    previous = ?previous,
                    current = %style,
                    "Basemap style applied"
                );
                let _ = self.events.send(StyleEvent::StyleChanged {
                    previous,
                    current: style,
                });
                Ok(StyleChange::Changed {
                    previous,
                    current: style,
                })
            }
            Err(e) => {
                let active = state.current;
                drop(state);

                tracing::warn!(
                    requested = %style,
                    active = ?active,
                    error = %e,
                    "Basemap style failed to load, keeping previous style"
                );
                let _ = self.events.send(StyleEvent::StyleFailed {
                    requested: style,
                    active,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }
}
