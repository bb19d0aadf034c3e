//! Layers command - inspect and edit persisted layer preferences.
//!
//! This is an offline editor for the preference file. It writes the same
//! `layer.<id>.*` keys the layer registry owns, which is safe only because
//! no engine is running here. A running engine reads them on its next
//! register or replay, so edits never bypass its registration path.

use std::path::PathBuf;

use clap::Subcommand;
use parcelscope::preferences::{
    layer_opacity_key, layer_preferences, layer_visibility_key, PreferenceStore,
};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Layer subcommands.
#[derive(Debug, Subcommand)]
pub enum LayersAction {
    /// List saved visibility and opacity per layer
    List,
    /// Save a layer's visibility
    Show { layer: String },
    /// Save a layer as hidden
    Hide { layer: String },
    /// Save a layer's opacity (0.0 to 1.0)
    Opacity { layer: String, value: f32 },
    /// Forget everything saved for a layer
    Reset { layer: String },
}

/// Run a layers subcommand.
pub fn run(
    config_path: Option<PathBuf>,
    log_level: Option<String>,
    action: Option<LayersAction>,
) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path, log_level)?;
    runner.log_startup("layers");
    let store = runner.open_preferences()?;

    match action.unwrap_or(LayersAction::List) {
        LayersAction::List => list(store.as_ref()),
        LayersAction::Show { layer } => {
            store.set(&layer_visibility_key(&layer), "true")?;
            println!("{}: visible", layer);
            Ok(())
        }
        LayersAction::Hide { layer } => {
            store.set(&layer_visibility_key(&layer), "false")?;
            println!("{}: hidden", layer);
            Ok(())
        }
        LayersAction::Opacity { layer, value } => {
            if !(0.0..=1.0).contains(&value) {
                return Err(CliError::InvalidArgument(format!(
                    "opacity must be between 0 and 1, got {}",
                    value
                )));
            }
            store.set(&layer_opacity_key(&layer), &value.to_string())?;
            println!("{}: opacity {}", layer, value);
            Ok(())
        }
        LayersAction::Reset { layer } => {
            store.remove(&layer_visibility_key(&layer))?;
            store.remove(&layer_opacity_key(&layer))?;
            println!("{}: preferences cleared", layer);
            Ok(())
        }
    }
}

fn list(store: &dyn PreferenceStore) -> Result<(), CliError> {
    let layers = layer_preferences(store);
    if layers.is_empty() {
        println!("No saved layer preferences.");
        return Ok(());
    }

    println!("{:24} {:8} {:8}", "LAYER", "VISIBLE", "OPACITY");
    for layer in layers {
        let visible = layer.visible.map_or("-".to_string(), |v| v.to_string());
        let opacity = layer.opacity.map_or("-".to_string(), |o| format!("{:.2}", o));
        println!("{:24} {:8} {:8}", layer.layer_id, visible, opacity);
    }
    Ok(())
}
