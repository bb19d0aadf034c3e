//! GeoJSON feature helpers shared by the surface, registry and fallback tier.

use geo::{Closest, ClosestPoint, Distance, Haversine, Intersects, Point};
use geojson::feature::Id;
use geojson::Feature;

use super::{GeometryError, LngLat};

/// Reasons a GeoJSON geometry cannot be used.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeatureGeometryError {
    /// Conversion to `geo` types failed.
    #[error("unsupported geometry: {0}")]
    Unsupported(String),

    /// A coordinate is out of range or not finite.
    #[error(transparent)]
    Coordinate(#[from] GeometryError),
}

/// Identifier of a feature, taken from its `id` member or a named property.
pub fn feature_id(feature: &Feature, id_property: &str) -> Option<String> {
    match &feature.id {
        Some(Id::String(s)) => return Some(s.clone()),
        Some(Id::Number(n)) => return Some(n.to_string()),
        None => {}
    }
    feature
        .properties
        .as_ref()
        .and_then(|props| props.get(id_property))
        .and_then(|value| match value {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Convert a feature's geometry into `geo` types, validating coordinates.
///
/// Features without geometry yield `Ok(None)`.
pub fn feature_geometry(
    feature: &Feature,
) -> Result<Option<geo::Geometry<f64>>, FeatureGeometryError> {
    let Some(geometry) = feature.geometry.clone() else {
        return Ok(None);
    };
    let converted = geo::Geometry::<f64>::try_from(geometry)
        .map_err(|e| FeatureGeometryError::Unsupported(e.to_string()))?;
    validate_geometry(&converted)?;
    Ok(Some(converted))
}

fn validate_geometry(geometry: &geo::Geometry<f64>) -> Result<(), GeometryError> {
    use geo::CoordsIter;

    for coord in geometry.coords_iter() {
        LngLat::from(coord).validate()?;
    }
    Ok(())
}

/// Check whether `point` falls on a geometry.
///
/// Areal geometries count a point on their boundary as inside, so a click
/// on an edge shared by two parcels still hits one of them. Points and
/// lines count as hit when the point is within `tolerance_meters` of them.
pub fn hit_test(geometry: &geo::Geometry<f64>, point: LngLat, tolerance_meters: f64) -> bool {
    let pt = Point::from(point);
    match geometry {
        geo::Geometry::Polygon(p) => p.intersects(&pt),
        geo::Geometry::MultiPolygon(mp) => mp.intersects(&pt),
        geo::Geometry::Rect(r) => r.intersects(&pt),
        geo::Geometry::Triangle(t) => t.intersects(&pt),
        other => match other.closest_point(&pt) {
            Closest::Intersection(_) => true,
            Closest::SinglePoint(closest) => Haversine.distance(closest, pt) <= tolerance_meters,
            Closest::Indeterminate => false,
        },
    }
}
