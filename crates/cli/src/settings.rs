//! Config file resolution: `--config`, then the per-user file, then defaults.

use std::path::{Path, PathBuf};

use stocktake_recon::ReconConfig;

use crate::CliError;

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("stocktake").join("config.toml"))
}

pub fn load_config(explicit: Option<&Path>) -> Result<ReconConfig, CliError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path().filter(|p| p.is_file()) {
            Some(path) => path,
            None => {
                log::debug!("no config file; using defaults");
                return Ok(ReconConfig::default());
            }
        },
    };

    let text = std::fs::read_to_string(&path)
        .map_err(|e| CliError::io(format!("cannot read config {}: {e}", path.display())))?;
    let config = ReconConfig::from_toml(&text)
        .map_err(|e| CliError::recon(e).with_hint(format!("check {}", path.display())))?;
    log::info!("config loaded from {}", path.display());
    Ok(config)
}
