//! Basemap command - show or change the persisted basemap style.

use std::path::PathBuf;
use std::sync::Arc;

use console::style;
use parcelscope::basemap::{BasemapStyle, StaticStyleLoader, StyleChange};
use parcelscope::config::EngineConfig;
use parcelscope::geometry::LngLat;
use parcelscope::preferences::{PreferenceStore, BASEMAP_STYLE_KEY};
use parcelscope::provider::{BoxFuture, ParcelRecord, ProviderError, ReportDataProvider};
use parcelscope::surface::{HeadlessSurface, SharedSurface};
use parcelscope::{EngineServices, MapEngine};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Report provider for commands that never resolve parcels.
struct NoReports;

impl ReportDataProvider for NoReports {
    fn enrich_parcel<'a>(
        &'a self,
        _parcel_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<ParcelRecord>, ProviderError>> {
        Box::pin(async { Ok(None) })
    }

    fn lookup_parcel_by_coordinate(
        &self,
        _position: LngLat,
    ) -> BoxFuture<'_, Result<Option<ParcelRecord>, ProviderError>> {
        Box::pin(async { Ok(None) })
    }
}

/// Run the basemap command.
pub fn run(
    config_path: Option<PathBuf>,
    log_level: Option<String>,
    requested: Option<String>,
) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path, log_level)?;
    runner.log_startup("basemap");
    let preferences = runner.open_preferences()?;

    let Some(requested) = requested else {
        let persisted = preferences.get(BASEMAP_STYLE_KEY);
        let current = persisted
            .as_deref()
            .and_then(|s| s.parse::<BasemapStyle>().ok())
            .unwrap_or(runner.config().basemap.default);
        for style_option in BasemapStyle::ALL {
            let marker = if style_option == current { "*" } else { " " };
            println!(
                "{} {:10} {}",
                marker,
                style_option.as_str(),
                style_option.descriptor().name
            );
        }
        if persisted.is_none() {
            println!();
            println!("(no saved choice, using the configured default)");
        }
        return Ok(());
    };

    let target: BasemapStyle = requested.parse().map_err(|_| {
        CliError::InvalidArgument(format!(
            "unknown basemap '{}', expected one of: streets, satellite, hybrid",
            requested
        ))
    })?;

    let engine = MapEngine::new(
        EngineConfig::from_config_file(runner.config()),
        EngineServices::new(
            SharedSurface::new(HeadlessSurface::new()),
            preferences,
            Arc::new(StaticStyleLoader),
            Arc::new(NoReports),
        ),
    );

    let runtime = runner.runtime()?;
    let change = runtime.block_on(async {
        engine.start().await?;
        engine.set_style(target).await
    })?;

    match change {
        StyleChange::Unchanged => println!("Basemap is already {}.", target),
        StyleChange::Changed { previous, current } => {
            let previous = previous.map_or("none".to_string(), |p| p.to_string());
            println!("Basemap: {} -> {}", previous, style(current).green());
        }
        StyleChange::Superseded => println!("Basemap change was superseded."),
    }
    Ok(())
}
