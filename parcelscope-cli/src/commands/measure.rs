//! Measure command - distance, area and buffer over coordinate lists.

use std::path::PathBuf;

use console::style;
use parcelscope::geometry::{LngLat, UnitSystem};
use parcelscope::measurement::{
    MeasurementError, MeasurementResult, MeasurementSession, MeasurementTool,
};

use super::common::{parse_point, ToolArg, UnitsArg};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the measure command.
pub struct MeasureArgs {
    pub tool: ToolArg,
    pub points: Vec<String>,
    pub radius: Option<f64>,
    pub units: Option<UnitsArg>,
}

/// Run the measure command.
pub fn run(
    config_path: Option<PathBuf>,
    log_level: Option<String>,
    args: MeasureArgs,
) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path, log_level)?;
    runner.log_startup("measure");

    let units = args
        .units
        .map(UnitSystem::from)
        .unwrap_or(runner.config().measurement.units);
    let points = args
        .points
        .iter()
        .map(|p| parse_point(p))
        .collect::<Result<Vec<_>, _>>()?;

    let result = measure(args.tool.into(), &points, args.radius, units)?;

    println!("{} {}", style(format!("{}:", result.tool)).bold(), style(&result).green());
    if let Some(area) = result.circle_area {
        let unit = units.area_unit_for(area);
        println!(
            "  circle area: {:.2} {}",
            unit.from_square_meters(area),
            unit.abbreviation()
        );
    }
    Ok(())
}

/// Feed `points` through a measurement session the way map clicks would.
pub fn measure(
    tool: MeasurementTool,
    points: &[LngLat],
    radius: Option<f64>,
    units: UnitSystem,
) -> Result<MeasurementResult, CliError> {
    let mut session = MeasurementSession::new(units);
    session.arm(tool);

    if tool == MeasurementTool::Distance && points.len() > 2 {
        return Err(CliError::InvalidArgument(format!(
            "distance takes two points, got {}",
            points.len()
        )));
    }
    if tool == MeasurementTool::Buffer && points.len() != 1 {
        return Err(CliError::InvalidArgument(format!(
            "buffer takes one centre point, got {}",
            points.len()
        )));
    }

    let mut completed = None;
    for point in points {
        completed = session.add_point(*point)?;
    }

    let result = match (tool, completed) {
        (_, Some(result)) => result,
        (MeasurementTool::Area, None) => session.finish()?,
        (MeasurementTool::Buffer, None) => {
            let radius = radius.ok_or_else(|| {
                CliError::InvalidArgument("buffer needs --radius <metres>".to_string())
            })?;
            session.set_radius(radius)?.ok_or_else(|| {
                CliError::InvalidArgument("buffer needs a centre point".to_string())
            })?
        }
        (MeasurementTool::Distance, None) => {
            return Err(MeasurementError::InsufficientPoints {
                tool,
                required: 2,
                actual: points.len(),
            }
            .into())
        }
    };

    tracing::debug!(tool = %result.tool, value = result.value, "Measurement complete");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcelscope::measurement::DisplayUnit;

    #[test]
    fn test_distance_between_two_points() {
        let points = [LngLat::new(0.0, 0.0), LngLat::new(0.0, 1.0)];
        let result = measure(MeasurementTool::Distance, &points, None, UnitSystem::Metric).unwrap();
        assert!((result.display_value - 111.2).abs() < 0.01);
    }

    #[test]
    fn test_distance_needs_two_points() {
        let points = [LngLat::new(0.0, 0.0)];
        assert!(matches!(
            measure(MeasurementTool::Distance, &points, None, UnitSystem::Metric),
            Err(CliError::Measurement(_))
        ));
    }

    #[test]
    fn test_area_closes_polygon() {
        let points = [
            LngLat::new(0.0, 0.0),
            LngLat::new(0.001, 0.0),
            LngLat::new(0.001, 0.001),
        ];
        let result = measure(MeasurementTool::Area, &points, None, UnitSystem::Imperial).unwrap();
        assert_eq!(result.geometry.first(), result.geometry.last());
        assert!(result.value > 0.0);
    }

    #[test]
    fn test_buffer_requires_radius() {
        let points = [LngLat::new(-97.0, 35.0)];
        assert!(measure(MeasurementTool::Buffer, &points, None, UnitSystem::Metric).is_err());

        let result =
            measure(MeasurementTool::Buffer, &points, Some(250.0), UnitSystem::Metric).unwrap();
        assert_eq!(result.value, 250.0);
        assert_eq!(result.unit, DisplayUnit::Distance(parcelscope::geometry::DistanceUnit::Meters));
    }
}
