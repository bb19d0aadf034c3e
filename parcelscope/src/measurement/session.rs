//! Measurement session state machine.
//!
//! ```text
//! Idle --arm(tool)--> Capturing(tool, [])
//! Capturing --add_point--> Capturing | Complete   (distance: 2nd point)
//! Capturing --finish--> Complete                  (area: >= 3 distinct points)
//! Capturing --set_radius--> Complete              (buffer: with a centre point)
//! Complete --add_point--> Capturing(tool, [p])    (next measurement, same tool)
//! any --arm(other tool)--> Capturing(other, [])   (in-progress points dropped)
//! any --clear--> Idle
//! ```

use geojson::{Feature, FeatureCollection, Geometry, Value as GeoValue};
use serde_json::Map;

use super::{DisplayUnit, MeasurementError, MeasurementResult, MeasurementTool};
use crate::geometry::{
    buffer_ring, path_distance, ring_area, GeometryError, LngLat, UnitSystem,
    DEFAULT_BUFFER_SEGMENTS,
};

/// Property naming the role of an overlay feature.
const OVERLAY_ROLE_PROPERTY: &str = "role";

/// Session state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MeasurementState {
    #[default]
    Idle,
    Capturing {
        tool: MeasurementTool,
        points: Vec<LngLat>,
        /// Buffer radius given before the centre point.
        radius: Option<f64>,
    },
    Complete {
        tool: MeasurementTool,
        result: MeasurementResult,
    },
}

/// The single active measurement session.
#[derive(Debug, Clone)]
pub struct MeasurementSession {
    state: MeasurementState,
    units: UnitSystem,
    segments: usize,
}

impl MeasurementSession {
    pub fn new(units: UnitSystem) -> Self {
        Self {
            state: MeasurementState::Idle,
            units,
            segments: DEFAULT_BUFFER_SEGMENTS,
        }
    }

    /// Set the number of vertices in buffer circles.
    pub fn with_buffer_segments(mut self, segments: usize) -> Self {
        self.segments = segments;
        self
    }

    pub fn state(&self) -> &MeasurementState {
        &self.state
    }

    pub fn units(&self) -> UnitSystem {
        self.units
    }

    /// Armed tool, if any.
    pub fn tool(&self) -> Option<MeasurementTool> {
        match &self.state {
            MeasurementState::Idle => None,
            MeasurementState::Capturing { tool, .. } | MeasurementState::Complete { tool, .. } => {
                Some(*tool)
            }
        }
    }

    pub fn is_armed(&self) -> bool {
        self.tool().is_some()
    }

    /// Points captured so far in the current capture.
    pub fn points(&self) -> &[LngLat] {
        match &self.state {
            MeasurementState::Capturing { points, .. } => points.as_slice(),
            _ => &[],
        }
    }

    pub fn result(&self) -> Option<&MeasurementResult> {
        match &self.state {
            MeasurementState::Complete { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Arm a tool. Switching tools discards the current session.
    pub fn arm(&mut self, tool: MeasurementTool) {
        if let MeasurementState::Capturing { tool: current, .. } = &self.state {
            if *current == tool {
                return;
            }
        }
        tracing::debug!(tool = %tool, previous = ?self.tool(), "Measurement tool armed");
        self.state = MeasurementState::Capturing {
            tool,
            points: Vec::new(),
            radius: None,
        };
    }

    /// Deselect the tool and drop any captured points or result.
    pub fn clear(&mut self) {
        if self.is_armed() {
            tracing::debug!(tool = ?self.tool(), "Measurement cleared");
        }
        self.state = MeasurementState::Idle;
    }

    /// Capture a point. Returns the result when the point completes the
    /// measurement.
    pub fn add_point(&mut self, point: LngLat) -> Result<Option<MeasurementResult>, MeasurementError> {
        point.validate()?;

        let (tool, mut points, radius) = match std::mem::take(&mut self.state) {
            MeasurementState::Idle => return Err(MeasurementError::NotArmed),
            MeasurementState::Capturing {
                tool,
                points,
                radius,
            } => (tool, points, radius),
            MeasurementState::Complete { tool, .. } => (tool, Vec::new(), None),
        };

        match tool {
            // A buffer has exactly one centre; later clicks move it.
            MeasurementTool::Buffer => points = vec![point],
            _ => points.push(point),
        }

        let complete = match tool {
            MeasurementTool::Distance => points.len() >= 2,
            MeasurementTool::Buffer => radius.is_some(),
            MeasurementTool::Area => false,
        };

        if !complete {
            self.state = MeasurementState::Capturing {
                tool,
                points,
                radius,
            };
            return Ok(None);
        }

        let result = match (tool, radius) {
            (MeasurementTool::Buffer, Some(r)) => match self.buffer_result(points[0], r) {
                Ok(result) => result,
                Err(e) => {
                    self.state = MeasurementState::Capturing {
                        tool,
                        points,
                        radius: None,
                    };
                    return Err(e);
                }
            },
            _ => self.distance_result(points),
        };
        Ok(Some(self.complete(tool, result)))
    }

    /// Give the buffer radius in metres.
    pub fn set_radius(&mut self, radius_meters: f64) -> Result<Option<MeasurementResult>, MeasurementError> {
        let points = self.capturing_for(MeasurementTool::Buffer)?;
        match points.first().copied() {
            Some(center) => {
                let result = self.buffer_result(center, radius_meters)?;
                Ok(Some(self.complete(MeasurementTool::Buffer, result)))
            }
            None => {
                if !radius_meters.is_finite() || radius_meters <= 0.0 {
                    return Err(GeometryError::InvalidRadius(radius_meters).into());
                }
                if let MeasurementState::Capturing { radius, .. } = &mut self.state {
                    *radius = Some(radius_meters);
                }
                Ok(None)
            }
        }
    }

    /// Close the area polygon and complete the measurement.
    pub fn finish(&mut self) -> Result<MeasurementResult, MeasurementError> {
        let points = self.capturing_for(MeasurementTool::Area)?;
        let area = ring_area(points).map_err(|e| match e {
            GeometryError::DegenerateRing(actual) => {
                MeasurementError::InsufficientPoints {
                    tool: MeasurementTool::Area,
                    required: 3,
                    actual,
                }
            }
            other => other.into(),
        })?;

        let mut ring = points.to_vec();
        if ring.first() != ring.last() {
            if let Some(first) = ring.first().copied() {
                ring.push(first);
            }
        }

        let unit = self.units.area_unit_for(area);
        let result = MeasurementResult {
            tool: MeasurementTool::Area,
            value: area,
            display_value: unit.from_square_meters(area),
            unit: DisplayUnit::Area(unit),
            circle_area: None,
            geometry: ring,
        };
        Ok(self.complete(MeasurementTool::Area, result))
    }

    /// Remove the last captured point.
    pub fn undo(&mut self) -> Option<LngLat> {
        match &mut self.state {
            MeasurementState::Capturing { points, .. } => {
                let removed = points.pop();
                tracing::debug!(remaining = points.len(), "Measurement point undone");
                removed
            }
            _ => None,
        }
    }

    /// Overlay features for the current state.
    pub fn overlay(&self) -> FeatureCollection {
        let mut features = Vec::new();
        match &self.state {
            MeasurementState::Idle => {}
            MeasurementState::Capturing { points, .. } => {
                features.extend(points.iter().map(|p| overlay_feature("vertex", point_value(*p))));
                if points.len() >= 2 {
                    features.push(overlay_feature("path", line_value(points)));
                }
            }
            MeasurementState::Complete { tool, result } => match tool {
                MeasurementTool::Distance => {
                    features.push(overlay_feature("path", line_value(&result.geometry)));
                }
                MeasurementTool::Area | MeasurementTool::Buffer => {
                    features.push(overlay_feature("polygon", polygon_value(&result.geometry)));
                }
            },
        }

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }

    fn capturing_for(&self, expected: MeasurementTool) -> Result<&[LngLat], MeasurementError> {
        match &self.state {
            MeasurementState::Idle => Err(MeasurementError::NotArmed),
            MeasurementState::Capturing { tool, points, .. } if *tool == expected => Ok(points.as_slice()),
            MeasurementState::Capturing { tool, .. } => Err(MeasurementError::WrongTool {
                expected,
                armed: *tool,
            }),
            MeasurementState::Complete { tool, .. } if *tool == expected => {
                Err(MeasurementError::AlreadyComplete)
            }
            MeasurementState::Complete { tool, .. } => Err(MeasurementError::WrongTool {
                expected,
                armed: *tool,
            }),
        }
    }

    fn complete(&mut self, tool: MeasurementTool, result: MeasurementResult) -> MeasurementResult {
        tracing::info!(
            tool = %tool,
            value = result.value,
            display = %result,
            "Measurement complete"
        );
        self.state = MeasurementState::Complete {
            tool,
            result: result.clone(),
        };
        result
    }

    fn distance_result(&self, points: Vec<LngLat>) -> MeasurementResult {
        let meters = path_distance(&points);
        let unit = self.units.distance_unit_for(meters);
        MeasurementResult {
            tool: MeasurementTool::Distance,
            value: meters,
            display_value: unit.from_meters(meters),
            unit: DisplayUnit::Distance(unit),
            circle_area: None,
            geometry: points,
        }
    }

    fn buffer_result(&self, center: LngLat, radius: f64) -> Result<MeasurementResult, MeasurementError> {
        let ring = buffer_ring(center, radius, self.segments)?;
        let unit = self.units.distance_unit_for(radius);
        Ok(MeasurementResult {
            tool: MeasurementTool::Buffer,
            value: radius,
            display_value: unit.from_meters(radius),
            unit: DisplayUnit::Distance(unit),
            circle_area: Some(std::f64::consts::PI * radius * radius),
            geometry: ring,
        })
    }
}

fn overlay_feature(role: &str, value: GeoValue) -> Feature {
    let mut properties = Map::new();
    properties.insert(OVERLAY_ROLE_PROPERTY.to_string(), role.into());
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn point_value(p: LngLat) -> GeoValue {
    GeoValue::Point(vec![p.lng, p.lat])
}

fn line_value(points: &[LngLat]) -> GeoValue {
    GeoValue::LineString(points.iter().map(|p| vec![p.lng, p.lat]).collect())
}

fn polygon_value(ring: &[LngLat]) -> GeoValue {
    GeoValue::Polygon(vec![ring.iter().map(|p| vec![p.lng, p.lat]).collect()])
}
