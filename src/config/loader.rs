// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{RawSessionConfig, SessionConfig};
use crate::errors::Result;

/// Load and validate a session config from a TOML file.
pub fn load_config(path: &Path) -> Result<SessionConfig> {
    let text = fs::read_to_string(path)?;
    let raw: RawSessionConfig = toml::from_str(&text)?;
    let cfg = SessionConfig::try_from(raw)?;
    debug!(
        max_tasks = cfg.max_tasks,
        state_file = %cfg.state_file.display(),
        "loaded session config"
    );
    Ok(cfg)
}
