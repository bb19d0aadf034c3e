//! Init command - write a default configuration file.

use std::path::PathBuf;

use parcelscope::config::ConfigFile;

use crate::error::CliError;
use crate::runner::resolve_config_path;

/// Run the init command.
pub fn run(config_path: Option<PathBuf>, force: bool) -> Result<(), CliError> {
    let path = resolve_config_path(config_path)?;

    if path.exists() && !force {
        println!("Configuration file already exists:");
        println!("  {}", path.display());
        println!();
        println!("Use --force to overwrite it with the defaults.");
        return Ok(());
    }

    let config = ConfigFile::default();
    config.save(&path)?;

    println!("Configuration file: {}", path.display());
    println!(
        "Preferences file:   {}",
        config.preferences_path(&path).display()
    );
    println!();
    println!("Set report_url (and optionally fallback_url) under [providers]");
    println!("before running 'parcelscope resolve'.");
    Ok(())
}
