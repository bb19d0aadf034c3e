//! Resolve command - look up the parcel at a position.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use console::style;
use parking_lot::Mutex;
use tokio::sync::Notify;

use parcelscope::basemap::StaticStyleLoader;
use parcelscope::config::EngineConfig;
use parcelscope::geometry::{Bounds, LngLat};
use parcelscope::interaction::HostCallbacks;
use parcelscope::layers::{LayerData, LayerDescriptor, LayerRole, PaintLayerSpec, SourceKind};
use parcelscope::provider::{
    AsyncReqwestClient, FallbackParcelProvider, HttpFallbackProvider, HttpReportProvider,
    ProviderError,
};
use parcelscope::resolution::{ParcelFeature, ResolutionOutcome, ViewportState};
use parcelscope::surface::{HeadlessSurface, SharedSurface};
use parcelscope::{ClickOutcome, EngineServices, MapEngine};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Half-width of the simulated viewport around the click, in degrees.
const VIEWPORT_HALF_SPAN_DEG: f64 = 0.01;

/// Layer that marks the map as parcel-bearing so clicks reach the chain.
const LOOKUP_LAYER: &str = "parcel-lookup";

/// Arguments for the resolve command.
pub struct ResolveArgs {
    pub lat: f64,
    pub lng: f64,
    pub zoom: f64,
    pub json: bool,
}

/// Wakes the command once the fallback fetch settled.
#[derive(Default)]
struct FallbackWatch {
    settled: Notify,
    error: Mutex<Option<String>>,
}

impl HostCallbacks for FallbackWatch {
    fn on_fallback_applied(&self, bounds: Bounds, parcels: usize) {
        tracing::debug!(bounds = %bounds, parcels, "Fallback parcels loaded");
        self.settled.notify_one();
    }

    fn on_fallback_error(&self, _bounds: Bounds, error: &ProviderError) {
        *self.error.lock() = Some(error.to_string());
        self.settled.notify_one();
    }
}

/// Run the resolve command.
pub fn run(
    config_path: Option<PathBuf>,
    log_level: Option<String>,
    args: ResolveArgs,
) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path, log_level)?;
    runner.log_startup("resolve");
    let config = runner.config();

    let point = LngLat::try_new(args.lng, args.lat)
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;

    let report_url = config.providers.report_url.clone().ok_or_else(|| {
        CliError::Config(format!(
            "report_url is not set under [providers] in {}",
            runner.config_path().display()
        ))
    })?;
    let timeout_secs = config.providers.request_timeout_secs;
    let report = HttpReportProvider::new(
        AsyncReqwestClient::with_timeout(timeout_secs)?,
        report_url,
        config.resolution.parcel_id_property.clone(),
    );
    let fallback = match &config.providers.fallback_url {
        Some(url) => Some(Arc::new(HttpFallbackProvider::new(
            AsyncReqwestClient::with_timeout(timeout_secs)?,
            url.clone(),
        )) as Arc<dyn FallbackParcelProvider>),
        None => None,
    };

    // Vector tiles are not decoded headlessly; lookups start at the fallback tier.
    let base = EngineConfig::from_config_file(config);
    let resolution = base
        .resolution
        .clone()
        .with_tile_opt_out(true)
        .with_fallback_debounce(Duration::ZERO);
    let engine_config = base.with_resolution(resolution);

    let watch = Arc::new(FallbackWatch::default());
    let mut services = EngineServices::new(
        SharedSurface::new(HeadlessSurface::new()),
        runner.open_preferences()?,
        Arc::new(StaticStyleLoader),
        Arc::new(report),
    )
    .with_callbacks(watch.clone());
    if let Some(fallback) = fallback {
        services = services.with_fallback(fallback);
    }
    let engine = MapEngine::new(engine_config, services);

    let runtime = runner.runtime()?;
    let outcome = runtime.block_on(async {
        engine.start().await?;
        engine.upsert_layer(lookup_layer(), LayerData::Empty)?;
        engine.set_viewport(ViewportState::new(args.zoom, viewport_around(point)));

        if engine.tier_state().fallback_active {
            let wait = Duration::from_secs(timeout_secs.saturating_add(1));
            if tokio::time::timeout(wait, watch.settled.notified()).await.is_err() {
                tracing::warn!("Fallback fetch did not settle in time");
            }
        }

        Ok::<_, CliError>(engine.click(point).await)
    })?;

    if let Some(error) = watch.error.lock().take() {
        eprintln!("{} fallback parcels unavailable: {}", style("warning:").yellow(), error);
    }

    match outcome {
        ClickOutcome::Parcel(ResolutionOutcome::Resolved(parcel)) if args.json => {
            println!("{}", serde_json::to_string_pretty(&parcel).map_err(CliError::Output)?);
        }
        ClickOutcome::Parcel(ResolutionOutcome::Resolved(parcel)) => print_parcel(&parcel),
        ClickOutcome::Parcel(ResolutionOutcome::ZoomIn { min_zoom }) => {
            println!("Zoom in to at least {} to select parcels.", min_zoom);
        }
        _ => {
            println!("No parcel found at {}.", point);
            if let Some(error) = engine.tier_state().last_error {
                println!("  last error: {}", error);
            }
        }
    }

    Ok(())
}

fn lookup_layer() -> LayerDescriptor {
    LayerDescriptor::new(LOOKUP_LAYER, SourceKind::GeoJson)
        .with_role(LayerRole::Parcel)
        .with_paint(PaintLayerSpec::outline("#264653", 1.0))
}

fn viewport_around(point: LngLat) -> Bounds {
    Bounds::new(
        point.lng - VIEWPORT_HALF_SPAN_DEG,
        point.lat - VIEWPORT_HALF_SPAN_DEG,
        point.lng + VIEWPORT_HALF_SPAN_DEG,
        point.lat + VIEWPORT_HALF_SPAN_DEG,
    )
}

fn print_parcel(parcel: &ParcelFeature) {
    let id = parcel.id.as_deref().unwrap_or("(no id)");
    let source = if parcel.enriched {
        parcel.provenance.to_string()
    } else {
        format!("{}, not enriched", parcel.provenance)
    };
    println!("{} {} ({})", style("Parcel").bold(), style(id).cyan(), source);

    let width = parcel.attributes.keys().map(String::len).max().unwrap_or(0);
    for (name, value) in &parcel.attributes {
        println!("  {:width$}  {}", name, value, width = width);
    }
}
