//! CLI command implementations.

pub mod replay;
pub mod show;

pub use replay::replay;
pub use show::show;

use anyhow::{Context, Result};
use serde_json::Value;
use statespace::{Space, SpaceConfig};
use std::fs;
use std::path::Path;

/// Load the configuration file, falling back to defaults when it is absent.
pub fn load_config(path: &Path) -> Result<SpaceConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(SpaceConfig::default());
    }

    let config = SpaceConfig::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::debug!(path = %path.display(), ?config, "loaded configuration");
    Ok(config)
}

/// Read a JSON state file and build a root space from it.
pub fn load_state(path: &Path, config: SpaceConfig) -> Result<Space> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse state file {}", path.display()))?;
    Space::with_config(value, config)
        .with_context(|| format!("State in {} is not an object or array", path.display()))
}
