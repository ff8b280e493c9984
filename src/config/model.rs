// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

/// Default safety bound on the number of admitted tasks per session.
pub const DEFAULT_MAX_TASKS: usize = 10_000;

/// Default state store location: a single file in the working directory.
pub const DEFAULT_STATE_FILE: &str = ".ripple-state.json";

/// Raw on-disk configuration, as deserialized from `Ripple.toml`.
///
/// Validation happens in the `TryFrom<RawSessionConfig>` impl; use
/// [`SessionConfig`] everywhere past the loading boundary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSessionConfig {
    #[serde(default)]
    pub session: SessionSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionSection {
    /// Safety bound on admitted tasks (`hit_limit` when exceeded).
    pub max_tasks: Option<usize>,

    /// Path to the persisted state store file.
    pub state_file: Option<PathBuf>,
}

/// Validated session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_tasks: usize,
    pub state_file: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tasks: DEFAULT_MAX_TASKS,
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
        }
    }
}

impl SessionConfig {
    /// Override the admission bound.
    pub fn with_max_tasks(mut self, max_tasks: usize) -> Self {
        self.max_tasks = max_tasks;
        self
    }

    /// Override the state store location.
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = path.into();
        self
    }
}
