//! Parcelscope CLI - Command-line interface
//!
//! Runs the parcelscope engine headlessly: parcel lookups against the
//! configured providers, measurements over coordinate lists and management
//! of the persisted basemap and layer preferences.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::common::{ToolArg, UnitsArg};
use commands::layers::LayersAction;

#[derive(Debug, Parser)]
#[command(name = "parcelscope", version, about = "Parcel lookup and map measurements")]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive (overrides the config file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Resolve the parcel at a position
    Resolve {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lng: f64,

        /// Map zoom the click happens at
        #[arg(long, default_value_t = 16.0)]
        zoom: f64,

        /// Print the parcel as JSON
        #[arg(long)]
        json: bool,
    },

    /// Measure a distance, an area or a buffer
    Measure {
        #[arg(value_enum)]
        tool: ToolArg,

        /// Points as lng,lat pairs
        #[arg(required = true, allow_hyphen_values = true)]
        points: Vec<String>,

        /// Buffer radius in metres
        #[arg(long)]
        radius: Option<f64>,

        /// Unit system for the result (overrides the config file)
        #[arg(long, value_enum)]
        units: Option<UnitsArg>,
    },

    /// Show or change the basemap style
    Basemap {
        /// New style: streets, satellite or hybrid
        style: Option<String>,
    },

    /// Show or edit persisted layer preferences
    Layers {
        #[command(subcommand)]
        action: Option<LayersAction>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { force } => commands::init::run(cli.config, force),
        Commands::Resolve {
            lat,
            lng,
            zoom,
            json,
        } => commands::resolve::run(
            cli.config,
            cli.log_level,
            commands::resolve::ResolveArgs {
                lat,
                lng,
                zoom,
                json,
            },
        ),
        Commands::Measure {
            tool,
            points,
            radius,
            units,
        } => commands::measure::run(
            cli.config,
            cli.log_level,
            commands::measure::MeasureArgs {
                tool,
                points,
                radius,
                units,
            },
        ),
        Commands::Basemap { style } => commands::basemap::run(cli.config, cli.log_level, style),
        Commands::Layers { action } => commands::layers::run(cli.config, cli.log_level, action),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", console::style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
