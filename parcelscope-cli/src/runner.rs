//! Shared command setup: configuration, logging, preferences and runtime.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parcelscope::config::ConfigFile;
use parcelscope::logging::{init_logging, LoggingConfig, LoggingGuard};
use parcelscope::preferences::IniPreferenceStore;

use crate::error::CliError;

/// Everything a command needs before it does real work.
pub struct CliRunner {
    config_path: PathBuf,
    config: ConfigFile,
    _logging: LoggingGuard,
}

impl CliRunner {
    /// Load the configuration and install logging.
    ///
    /// `log_level` overrides the level from the config file.
    pub fn new(config_path: Option<PathBuf>, log_level: Option<String>) -> Result<Self, CliError> {
        let config_path = resolve_config_path(config_path)?;
        let config = ConfigFile::load(&config_path)?;

        let mut logging = LoggingConfig::from(&config.logging);
        if let Some(level) = log_level {
            logging = logging.with_level(level);
        }
        let guard = init_logging(&logging)?;

        Ok(Self {
            config_path,
            config,
            _logging: guard,
        })
    }

    pub fn log_startup(&self, command: &str) {
        tracing::info!(
            command,
            version = env!("CARGO_PKG_VERSION"),
            config = %self.config_path.display(),
            "parcelscope starting"
        );
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Open the durable preference store next to the config file.
    pub fn open_preferences(&self) -> Result<Arc<IniPreferenceStore>, CliError> {
        let path = self.config.preferences_path(&self.config_path);
        Ok(Arc::new(IniPreferenceStore::open(path)?))
    }

    /// Single-threaded runtime; the engine never needs worker threads.
    pub fn runtime(&self) -> Result<tokio::runtime::Runtime, CliError> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)
    }
}

/// Explicit path, or the default location in the user config directory.
pub fn resolve_config_path(config_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    config_path
        .or_else(ConfigFile::default_path)
        .ok_or_else(|| {
            CliError::Config(
                "Could not determine the user config directory. Use --config <path>.".to_string(),
            )
        })
}
