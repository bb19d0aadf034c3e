//! On-map measurement
//!
//! One measurement session is active at a time. The session is an explicit
//! state machine (see [`MeasurementSession`]); results carry the raw value in
//! metres or square metres alongside a display value in the configured unit
//! system.

mod session;

pub use session::{MeasurementSession, MeasurementState};

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::geometry::{AreaUnit, DistanceUnit, GeometryError, LngLat};

/// Layer id of the measurement overlay.
pub const MEASUREMENT_OVERLAY_LAYER: &str = "measurement-overlay";

/// Measurement tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementTool {
    /// Path length; completes on the second point.
    Distance,
    /// Polygon area; completes on finish.
    Area,
    /// Circle around one point; completes once a radius is given.
    Buffer,
}

impl MeasurementTool {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementTool::Distance => "distance",
            MeasurementTool::Area => "area",
            MeasurementTool::Buffer => "buffer",
        }
    }
}

impl fmt::Display for MeasurementTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasurementTool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "distance" => Ok(MeasurementTool::Distance),
            "area" => Ok(MeasurementTool::Area),
            "buffer" => Ok(MeasurementTool::Buffer),
            other => Err(format!("unknown measurement tool '{}'", other)),
        }
    }
}

/// Unit a result is displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayUnit {
    Distance(DistanceUnit),
    Area(AreaUnit),
}

impl DisplayUnit {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            DisplayUnit::Distance(u) => u.abbreviation(),
            DisplayUnit::Area(u) => u.abbreviation(),
        }
    }
}

/// A completed measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementResult {
    pub tool: MeasurementTool,
    /// Metres for distance and buffer radius, square metres for area.
    pub value: f64,
    /// `value` converted to `unit`.
    pub display_value: f64,
    pub unit: DisplayUnit,
    /// Area of the buffer circle in square metres.
    pub circle_area: Option<f64>,
    /// Captured points; closed for area, the circle ring for buffer.
    pub geometry: Vec<LngLat>,
}

impl fmt::Display for MeasurementResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.display_value, self.unit.abbreviation())
    }
}

/// Errors raised by measurement operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeasurementError {
    #[error("No measurement tool armed")]
    NotArmed,

    #[error("Operation needs the {expected} tool but {armed} is armed")]
    WrongTool {
        expected: MeasurementTool,
        armed: MeasurementTool,
    },

    #[error("{tool} needs at least {required} points, got {actual}")]
    InsufficientPoints {
        tool: MeasurementTool,
        required: usize,
        actual: usize,
    },

    #[error("Measurement already complete")]
    AlreadyComplete,

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}
