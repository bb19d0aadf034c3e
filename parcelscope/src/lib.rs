//! Parcelscope - layer orchestration and parcel resolution for web maps
//!
//! This library drives a map render surface: it owns the basemap style,
//! keeps thematic layers registered across style swaps, resolves the parcel
//! under a click through a tiered lookup chain and runs distance, area and
//! buffer measurements.
//!
//! The entry point is [`MapEngine`]. Hosts plug in a [`surface::RenderSurface`],
//! a [`preferences::PreferenceStore`] and the data providers, then receive
//! results through [`interaction::HostCallbacks`].

pub mod basemap;
pub mod config;
pub mod engine;
pub mod geometry;
pub mod interaction;
pub mod layers;
pub mod logging;
pub mod measurement;
pub mod preferences;
pub mod provider;
pub mod resolution;
pub mod surface;

pub use engine::{ClickOutcome, EngineServices, MapEngine, FALLBACK_PARCEL_LAYER};
