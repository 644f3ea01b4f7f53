//! Config command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use locus_core::TrackingConfig;

use crate::cli::ConfigAction;
use crate::util::{config_path, load_config, write_output};

pub fn cmd_config(
    action: ConfigAction,
    explicit: Option<&Path>,
    output: Option<&PathBuf>,
    quiet: bool,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(explicit)?;
            let rendered =
                toml::to_string_pretty(&config).context("Failed to serialize config")?;
            write_output(output, &rendered)
        }
        ConfigAction::Check => {
            let path = config_path(explicit);
            load_config(explicit)?;
            if !quiet {
                if path.exists() {
                    eprintln!("{} is valid", path.display());
                } else {
                    eprintln!("No config at {}; defaults are valid", path.display());
                }
            }
            Ok(())
        }
        ConfigAction::Init { force } => {
            let path = config_path(explicit);
            init_config(&path, force)?;
            if !quiet {
                eprintln!("Wrote default config to {}", path.display());
            }
            Ok(())
        }
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Config already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }
    TrackingConfig::default()
        .save(path)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tracking.toml");

        init_config(&path, false).unwrap();

        let loaded = TrackingConfig::load_validated(&path).unwrap();
        assert_eq!(loaded, TrackingConfig::default());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracking.toml");
        std::fs::write(&path, "[app]\n").unwrap();

        let err = init_config(&path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[app]\n");

        init_config(&path, true).unwrap();
        assert!(TrackingConfig::load(&path).is_ok());
    }

    #[test]
    fn test_check_reports_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracking.toml");
        std::fs::write(&path, "[foreground_watch]\ninterval_ms = 0\n").unwrap();

        let result = cmd_config(ConfigAction::Check, Some(&path), None, true);
        assert!(result.is_err());
    }
}
