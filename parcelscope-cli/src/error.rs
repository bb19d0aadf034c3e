//! CLI error type.

use std::fmt;

use parcelscope::basemap::StyleError;
use parcelscope::config::ConfigError;
use parcelscope::layers::LayerError;
use parcelscope::logging::LoggingError;
use parcelscope::measurement::MeasurementError;
use parcelscope::preferences::PreferenceError;
use parcelscope::provider::ProviderError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Missing or contradictory settings.
    Config(String),
    ConfigFile(ConfigError),
    Preferences(PreferenceError),
    Logging(LoggingError),
    Provider(ProviderError),
    Style(StyleError),
    Layer(LayerError),
    Measurement(MeasurementError),
    /// A command-line value could not be used.
    InvalidArgument(String),
    Runtime(std::io::Error),
    Output(serde_json::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Preferences(e) => write!(f, "Preference store error: {}", e),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Provider(e) => write!(f, "Provider error: {}", e),
            CliError::Style(e) => write!(f, "{}", e),
            CliError::Layer(e) => write!(f, "Layer error: {}", e),
            CliError::Measurement(e) => write!(f, "Measurement failed: {}", e),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Output(e) => write!(f, "Failed to format output: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Preferences(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Provider(e) => Some(e),
            CliError::Style(e) => Some(e),
            CliError::Layer(e) => Some(e),
            CliError::Measurement(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Output(e) => Some(e),
            CliError::Config(_) | CliError::InvalidArgument(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<PreferenceError> for CliError {
    fn from(e: PreferenceError) -> Self {
        CliError::Preferences(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<ProviderError> for CliError {
    fn from(e: ProviderError) -> Self {
        CliError::Provider(e)
    }
}

impl From<StyleError> for CliError {
    fn from(e: StyleError) -> Self {
        CliError::Style(e)
    }
}

impl From<MeasurementError> for CliError {
    fn from(e: MeasurementError) -> Self {
        CliError::Measurement(e)
    }
}

impl From<LayerError> for CliError {
    fn from(e: LayerError) -> Self {
        CliError::Layer(e)
    }
}
