//! Display unit conversion for measurements.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Metres in one international foot.
pub const METERS_PER_FOOT: f64 = 0.3048;

/// Metres in one statute mile.
pub const METERS_PER_MILE: f64 = 1_609.344;

/// Square metres in one international acre.
pub const SQUARE_METERS_PER_ACRE: f64 = 4_046.856_422_4;

/// Square metres in one hectare.
pub const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;

/// Unit system used to pick display units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    /// Feet, miles and acres.
    #[default]
    Imperial,
    /// Metres, kilometres and hectares.
    Metric,
}

impl UnitSystem {
    /// Pick the distance unit for a length in metres.
    ///
    /// Short lengths read better in feet or metres; longer ones switch to
    /// miles or kilometres.
    pub fn distance_unit_for(&self, meters: f64) -> DistanceUnit {
        match self {
            UnitSystem::Imperial if meters < METERS_PER_MILE / 10.0 => DistanceUnit::Feet,
            UnitSystem::Imperial => DistanceUnit::Miles,
            UnitSystem::Metric if meters < 1_000.0 => DistanceUnit::Meters,
            UnitSystem::Metric => DistanceUnit::Kilometers,
        }
    }

    /// Pick the area unit for an area in square metres.
    ///
    /// Imperial areas are always reported in acres, the unit parcels are sold in.
    pub fn area_unit_for(&self, square_meters: f64) -> AreaUnit {
        match self {
            UnitSystem::Imperial => AreaUnit::Acres,
            UnitSystem::Metric if square_meters < SQUARE_METERS_PER_HECTARE => {
                AreaUnit::SquareMeters
            }
            UnitSystem::Metric => AreaUnit::Hectares,
        }
    }

    /// Configuration-file spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitSystem::Imperial => "imperial",
            UnitSystem::Metric => "metric",
        }
    }
}

impl FromStr for UnitSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "imperial" | "us" => Ok(UnitSystem::Imperial),
            "metric" | "si" => Ok(UnitSystem::Metric),
            other => Err(format!("unknown unit system '{}'", other)),
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Length display unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    Meters,
    Kilometers,
    Feet,
    Miles,
}

impl DistanceUnit {
    /// Convert a length in metres into this unit.
    pub fn from_meters(&self, meters: f64) -> f64 {
        match self {
            DistanceUnit::Meters => meters,
            DistanceUnit::Kilometers => meters / 1_000.0,
            DistanceUnit::Feet => meters / METERS_PER_FOOT,
            DistanceUnit::Miles => meters / METERS_PER_MILE,
        }
    }

    /// Short label for display.
    pub fn abbreviation(&self) -> &'static str {
        match self {
            DistanceUnit::Meters => "m",
            DistanceUnit::Kilometers => "km",
            DistanceUnit::Feet => "ft",
            DistanceUnit::Miles => "mi",
        }
    }
}

/// Area display unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaUnit {
    SquareMeters,
    Hectares,
    SquareFeet,
    Acres,
}

impl AreaUnit {
    /// Convert an area in square metres into this unit.
    pub fn from_square_meters(&self, square_meters: f64) -> f64 {
        match self {
            AreaUnit::SquareMeters => square_meters,
            AreaUnit::Hectares => square_meters / SQUARE_METERS_PER_HECTARE,
            AreaUnit::SquareFeet => square_meters / (METERS_PER_FOOT * METERS_PER_FOOT),
            AreaUnit::Acres => square_meters / SQUARE_METERS_PER_ACRE,
        }
    }

    /// Short label for display.
    pub fn abbreviation(&self) -> &'static str {
        match self {
            AreaUnit::SquareMeters => "m²",
            AreaUnit::Hectares => "ha",
            AreaUnit::SquareFeet => "ft²",
            AreaUnit::Acres => "ac",
        }
    }
}
