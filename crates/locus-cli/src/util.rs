//! Utility functions for CLI operations.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use locus_core::TrackingConfig;
use locus_core::config::default_config_path;

/// Write output to file or stdout.
pub fn write_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}

/// Path of the configuration file in effect.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(default_config_path, Path::to_path_buf)
}

/// Load and validate the tracking configuration.
///
/// An explicit path must exist; the default path falls back to defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<TrackingConfig> {
    let config = match explicit {
        Some(path) => TrackingConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => TrackingConfig::load_default().context("Failed to load default config")?,
    };
    config.validate()?;
    Ok(config)
}
