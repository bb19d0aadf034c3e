//! Coordinate and bounding-box value types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum valid latitude in degrees.
pub const MIN_LAT: f64 = -90.0;

/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;

/// Minimum valid longitude in degrees.
pub const MIN_LNG: f64 = -180.0;

/// Maximum valid longitude in degrees.
pub const MAX_LNG: f64 = 180.0;

/// Errors produced by geometry validation and computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// Latitude outside [-90, 90] or not finite.
    #[error("Invalid latitude: {0}")]
    InvalidLatitude(f64),

    /// Longitude outside [-180, 180] or not finite.
    #[error("Invalid longitude: {0}")]
    InvalidLongitude(f64),

    /// A polygon ring needs at least three distinct vertices.
    #[error("Polygon ring needs at least 3 distinct points, got {0}")]
    DegenerateRing(usize),

    /// A radius must be finite and positive.
    #[error("Invalid radius: {0}")]
    InvalidRadius(f64),
}

/// A geographic position in WGS84 degrees.
///
/// Longitude comes first, matching GeoJSON axis order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    /// Longitude in degrees (-180 to 180)
    pub lng: f64,
    /// Latitude in degrees (-90 to 90)
    pub lat: f64,
}

impl LngLat {
    /// Create a new position without validation.
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Create a validated position.
    pub fn try_new(lng: f64, lat: f64) -> Result<Self, GeometryError> {
        let position = Self { lng, lat };
        position.validate()?;
        Ok(position)
    }

    /// Check that both axes are finite and in range.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if !self.lat.is_finite() || !(MIN_LAT..=MAX_LAT).contains(&self.lat) {
            return Err(GeometryError::InvalidLatitude(self.lat));
        }
        if !self.lng.is_finite() || !(MIN_LNG..=MAX_LNG).contains(&self.lng) {
            return Err(GeometryError::InvalidLongitude(self.lng));
        }
        Ok(())
    }
}

impl fmt::Display for LngLat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lng, self.lat)
    }
}

impl From<LngLat> for geo::Coord<f64> {
    fn from(p: LngLat) -> Self {
        geo::coord! { x: p.lng, y: p.lat }
    }
}

impl From<LngLat> for geo::Point<f64> {
    fn from(p: LngLat) -> Self {
        geo::Point::new(p.lng, p.lat)
    }
}

impl From<geo::Coord<f64>> for LngLat {
    fn from(c: geo::Coord<f64>) -> Self {
        Self { lng: c.x, lat: c.y }
    }
}

impl From<geo::Point<f64>> for LngLat {
    fn from(p: geo::Point<f64>) -> Self {
        Self { lng: p.x(), lat: p.y() }
    }
}

/// Geographic bounding box.
///
/// Viewport bounds and fallback queries are keyed on this type, so two
/// boxes compare equal only when all four edges match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Westernmost longitude
    pub west: f64,
    /// Southernmost latitude
    pub south: f64,
    /// Easternmost longitude
    pub east: f64,
    /// Northernmost latitude
    pub north: f64,
}

impl Bounds {
    /// Create a new bounding box.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Smallest box containing every point, or `None` for an empty slice.
    pub fn from_points(points: &[LngLat]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = Self::new(first.lng, first.lat, first.lng, first.lat);
        for p in &points[1..] {
            bounds.extend(*p);
        }
        Some(bounds)
    }

    /// Grow the box to include a point.
    pub fn extend(&mut self, p: LngLat) {
        self.west = self.west.min(p.lng);
        self.east = self.east.max(p.lng);
        self.south = self.south.min(p.lat);
        self.north = self.north.max(p.lat);
    }

    /// Check if a point lies inside the box (edges inclusive).
    pub fn contains(&self, p: LngLat) -> bool {
        p.lng >= self.west && p.lng <= self.east && p.lat >= self.south && p.lat <= self.north
    }

    /// Check if two boxes overlap.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.west <= other.east
            && self.east >= other.west
            && self.south <= other.north
            && self.north >= other.south
    }

    /// Center of the box.
    pub fn center(&self) -> LngLat {
        LngLat::new(
            (self.west + self.east) / 2.0,
            (self.south + self.north) / 2.0,
        )
    }

    /// Comma-separated `west,south,east,north`, the usual `bbox` query form.
    pub fn to_bbox_param(&self) -> String {
        format!("{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.5}, {:.5}, {:.5}, {:.5}]",
            self.west, self.south, self.east, self.north
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lng_lat_validation() {
        assert!(LngLat::try_new(-74.0060, 40.7128).is_ok());
        assert_eq!(
            LngLat::try_new(0.0, 91.0),
            Err(GeometryError::InvalidLatitude(91.0))
        );
        assert_eq!(
            LngLat::try_new(-181.0, 0.0),
            Err(GeometryError::InvalidLongitude(-181.0))
        );
        assert!(LngLat::try_new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_bounds_from_points() {
        let points = [
            LngLat::new(-1.0, 2.0),
            LngLat::new(3.0, -4.0),
            LngLat::new(0.5, 0.5),
        ];
        let bounds = Bounds::from_points(&points).unwrap();
        assert_eq!(bounds, Bounds::new(-1.0, -4.0, 3.0, 2.0));
        assert!(Bounds::from_points(&[]).is_none());
    }

    #[test]
    fn test_bounds_contains_and_intersects() {
        let a = Bounds::new(0.0, 0.0, 1.0, 1.0);
        let b = Bounds::new(0.5, 0.5, 2.0, 2.0);
        let c = Bounds::new(1.5, 1.5, 2.0, 2.0);

        assert!(a.contains(LngLat::new(1.0, 1.0)));
        assert!(!a.contains(LngLat::new(1.01, 0.5)));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_bbox_param_order() {
        let bounds = Bounds::new(-75.5, 39.5, -75.0, 40.0);
        assert_eq!(bounds.to_bbox_param(), "-75.5,39.5,-75,40");
    }
}
