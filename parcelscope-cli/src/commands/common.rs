//! Common types and utilities shared across CLI commands.

use clap::ValueEnum;
use parcelscope::geometry::{LngLat, UnitSystem};
use parcelscope::measurement::MeasurementTool;

use crate::error::CliError;

/// Measurement tool selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum ToolArg {
    /// Great-circle length of a two-point segment
    Distance,
    /// Area of the polygon closed over the points
    Area,
    /// Circle of --radius metres around one point
    Buffer,
}

impl From<ToolArg> for MeasurementTool {
    fn from(tool: ToolArg) -> Self {
        match tool {
            ToolArg::Distance => MeasurementTool::Distance,
            ToolArg::Area => MeasurementTool::Area,
            ToolArg::Buffer => MeasurementTool::Buffer,
        }
    }
}

/// Unit system selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum UnitsArg {
    /// Metres, kilometres, hectares
    Metric,
    /// Feet, miles, acres
    Imperial,
}

impl From<UnitsArg> for UnitSystem {
    fn from(units: UnitsArg) -> Self {
        match units {
            UnitsArg::Metric => UnitSystem::Metric,
            UnitsArg::Imperial => UnitSystem::Imperial,
        }
    }
}

/// Parse a `lng,lat` pair.
pub fn parse_point(text: &str) -> Result<LngLat, CliError> {
    let invalid = || CliError::InvalidArgument(format!("'{}' is not a lng,lat pair", text));

    let (lng, lat) = text.split_once(',').ok_or_else(invalid)?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;

    LngLat::try_new(lng, lat).map_err(|e| CliError::InvalidArgument(format!("'{}': {}", text, e)))
}
