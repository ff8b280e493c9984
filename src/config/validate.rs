// src/config/validate.rs

use crate::config::model::{RawSessionConfig, SessionConfig};
use crate::errors::RippleError;

impl TryFrom<RawSessionConfig> for SessionConfig {
    type Error = RippleError;

    fn try_from(raw: RawSessionConfig) -> Result<Self, Self::Error> {
        let defaults = SessionConfig::default();

        let max_tasks = raw.session.max_tasks.unwrap_or(defaults.max_tasks);
        if max_tasks == 0 {
            return Err(RippleError::Config(
                "[session].max_tasks must be >= 1 (got 0)".to_string(),
            ));
        }

        Ok(SessionConfig {
            max_tasks,
            state_file: raw.session.state_file.unwrap_or(defaults.state_file),
        })
    }
}
