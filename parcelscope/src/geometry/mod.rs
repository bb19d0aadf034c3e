//! Geometry utilities
//!
//! Great-circle distance, polygon area and bounding boxes for measurement
//! tools and parcel hit-testing.
//!
//! Distances use the haversine formula on the mean Earth radius. Areas are
//! computed by projecting the ring onto a local equirectangular plane centred
//! on the ring and applying the planar shoelace formula, which is accurate
//! for parcel-sized polygons.

mod features;
mod types;
mod units;

pub use features::{feature_geometry, feature_id, hit_test, FeatureGeometryError};
pub use types::{Bounds, GeometryError, LngLat, MAX_LAT, MAX_LNG, MIN_LAT, MIN_LNG};
pub use units::{
    AreaUnit, DistanceUnit, UnitSystem, METERS_PER_FOOT, METERS_PER_MILE, SQUARE_METERS_PER_ACRE,
    SQUARE_METERS_PER_HECTARE,
};

use geo::{Area, Destination, Distance, Haversine, LineString, Point, Polygon};

/// Mean Earth radius in metres (GRS80), the radius haversine distances use.
pub const EARTH_MEAN_RADIUS_METERS: f64 = 6_371_008.8;

/// Default number of vertices in a generated buffer circle.
pub const DEFAULT_BUFFER_SEGMENTS: usize = 64;

/// Great-circle distance between two positions in metres.
#[inline]
pub fn haversine_distance(a: LngLat, b: LngLat) -> f64 {
    Haversine.distance(Point::from(a), Point::from(b))
}

/// Total length of a path in metres, summing consecutive segments.
///
/// Paths with fewer than two points have zero length.
pub fn path_distance(points: &[LngLat]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance(pair[0], pair[1]))
        .sum()
}

/// Area of a polygon ring in square metres.
///
/// The ring does not need to be closed; the first point is appended when the
/// last point differs from it.
///
/// # Errors
///
/// Returns [`GeometryError::DegenerateRing`] when fewer than three distinct
/// vertices remain after closing.
pub fn ring_area(points: &[LngLat]) -> Result<f64, GeometryError> {
    let vertices = open_ring(points);
    let distinct = count_distinct(vertices);
    if distinct < 3 {
        return Err(GeometryError::DegenerateRing(distinct));
    }

    // Project onto a local plane through the ring's mean latitude.
    let origin_lat = vertices.iter().map(|p| p.lat).sum::<f64>() / vertices.len() as f64;
    let origin_lng = vertices[0].lng;
    let meters_per_degree = EARTH_MEAN_RADIUS_METERS.to_radians();
    let lng_scale = meters_per_degree * origin_lat.to_radians().cos();

    let mut projected: Vec<geo::Coord<f64>> = vertices
        .iter()
        .map(|p| geo::coord! {
            x: (p.lng - origin_lng) * lng_scale,
            y: (p.lat - origin_lat) * meters_per_degree,
        })
        .collect();
    projected.push(projected[0]);

    let polygon = Polygon::new(LineString::from(projected), vec![]);
    Ok(polygon.unsigned_area())
}

/// Closed ring of points forming a circle around `center`.
///
/// The last point repeats the first so the result can be used directly as a
/// polygon exterior.
///
/// # Errors
///
/// Returns [`GeometryError::InvalidRadius`] for a non-finite or non-positive radius.
pub fn buffer_ring(
    center: LngLat,
    radius_meters: f64,
    segments: usize,
) -> Result<Vec<LngLat>, GeometryError> {
    if !radius_meters.is_finite() || radius_meters <= 0.0 {
        return Err(GeometryError::InvalidRadius(radius_meters));
    }
    center.validate()?;

    let segments = segments.max(3);
    let origin = Point::from(center);
    let mut ring: Vec<LngLat> = (0..segments)
        .map(|i| {
            let bearing = 360.0 * i as f64 / segments as f64;
            LngLat::from(Haversine.destination(origin, bearing, radius_meters))
        })
        .collect();
    ring.push(ring[0]);
    Ok(ring)
}

/// Bounding box of a set of points.
#[inline]
pub fn bounding_box(points: &[LngLat]) -> Option<Bounds> {
    Bounds::from_points(points)
}

/// Strip the closing point of a ring if present.
fn open_ring(points: &[LngLat]) -> &[LngLat] {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() > 1 && first == last => {
            &points[..points.len() - 1]
        }
        _ => points,
    }
}

fn count_distinct(points: &[LngLat]) -> usize {
    let mut seen: Vec<LngLat> = Vec::with_capacity(points.len());
    for p in points {
        if !seen.contains(p) {
            seen.push(*p);
        }
    }
    seen.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Degrees of latitude spanning the given number of metres.
    fn lat_degrees(meters: f64) -> f64 {
        meters / EARTH_MEAN_RADIUS_METERS.to_radians()
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let d = haversine_distance(LngLat::new(0.0, 0.0), LngLat::new(0.0, 1.0));
        assert!(
            (d - 111_195.0).abs() < 10.0,
            "1° of latitude should be ~111.2 km, got {}",
            d
        );
    }

    #[test]
    fn test_path_distance_sums_segments() {
        let points = [
            LngLat::new(0.0, 0.0),
            LngLat::new(0.0, 1.0),
            LngLat::new(0.0, 2.0),
        ];
        let single = haversine_distance(points[0], points[2]);
        assert!((path_distance(&points) - single).abs() < 1e-6);
        assert_eq!(path_distance(&points[..1]), 0.0);
        assert_eq!(path_distance(&[]), 0.0);
    }

    #[test]
    fn test_ring_area_of_hundred_metre_square() {
        let side = lat_degrees(100.0);
        let square = [
            LngLat::new(0.0, 0.0),
            LngLat::new(side, 0.0),
            LngLat::new(side, side),
            LngLat::new(0.0, side),
        ];
        let area = ring_area(&square).unwrap();
        assert!((area - 10_000.0).abs() < 0.01, "got {}", area);
    }

    #[test]
    fn test_ring_area_accepts_closed_ring() {
        let side = lat_degrees(50.0);
        let open = [
            LngLat::new(10.0, 45.0),
            LngLat::new(10.0 + side, 45.0),
            LngLat::new(10.0 + side, 45.0 + side),
        ];
        let mut closed = open.to_vec();
        closed.push(open[0]);
        let a = ring_area(&open).unwrap();
        let b = ring_area(&closed).unwrap();
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_ring_area_degenerate() {
        let points = [
            LngLat::new(0.0, 0.0),
            LngLat::new(1.0, 1.0),
            LngLat::new(0.0, 0.0),
        ];
        assert_eq!(ring_area(&points), Err(GeometryError::DegenerateRing(2)));
    }

    #[test]
    fn test_buffer_ring_radius() {
        let center = LngLat::new(-75.16, 39.95);
        let ring = buffer_ring(center, 250.0, 32).unwrap();
        assert_eq!(ring.len(), 33);
        assert_eq!(ring.first(), ring.last());
        for p in &ring {
            let d = haversine_distance(center, *p);
            assert!((d - 250.0).abs() < 0.5, "vertex at {} m", d);
        }
    }

    #[test]
    fn test_buffer_ring_rejects_bad_radius() {
        let center = LngLat::new(0.0, 0.0);
        assert!(buffer_ring(center, 0.0, 16).is_err());
        assert!(buffer_ring(center, f64::NAN, 16).is_err());
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_distance_is_symmetric(
                lng1 in -180.0..180.0_f64,
                lat1 in -89.0..89.0_f64,
                lng2 in -180.0..180.0_f64,
                lat2 in -89.0..89.0_f64,
            ) {
                let a = LngLat::new(lng1, lat1);
                let b = LngLat::new(lng2, lat2);
                let ab = haversine_distance(a, b);
                let ba = haversine_distance(b, a);
                prop_assert!((ab - ba).abs() < 1e-6, "{} vs {}", ab, ba);
                prop_assert!(ab >= 0.0);
            }

            #[test]
            fn test_bounding_box_contains_all_points(
                coords in prop::collection::vec((-180.0..180.0_f64, -90.0..90.0_f64), 1..20)
            ) {
                let points: Vec<LngLat> = coords.iter().map(|(x, y)| LngLat::new(*x, *y)).collect();
                let bounds = bounding_box(&points).unwrap();
                for p in &points {
                    prop_assert!(bounds.contains(*p));
                }
            }

            #[test]
            fn test_square_area_scales_with_side(
                side_m in 10.0..2_000.0_f64,
                lat in -60.0..60.0_f64,
            ) {
                let dlat = lat_degrees(side_m);
                let lat0 = lat + dlat / 2.0;
                let dlng = dlat / lat0.to_radians().cos();
                let square = [
                    LngLat::new(0.0, lat),
                    LngLat::new(dlng, lat),
                    LngLat::new(dlng, lat + dlat),
                    LngLat::new(0.0, lat + dlat),
                ];
                let area = ring_area(&square).unwrap();
                let expected = side_m * side_m;
                prop_assert!((area - expected).abs() / expected < 1e-6, "{} vs {}", area, expected);
            }
        }
    }
}
