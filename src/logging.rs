// src/logging.rs

//! Optional tracing bootstrap for embedders.
//!
//! The engine emits structured `tracing` events throughout a session: state
//! transitions, up-to-date reasons, commit failures, merge conflicts. A
//! host application with its own subscriber should ignore this module; the
//! helper here exists for thin drivers and scripts that just want those
//! events on stderr.

use std::str::FromStr;

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::fmt;

/// Level used when neither the caller nor the environment picks one.
const FALLBACK: Level = Level::INFO;

/// Environment variable consulted when no explicit level is given. Accepts
/// anything `tracing::Level` parses ("error" through "trace").
pub const LOG_ENV_VAR: &str = "RIPPLE_LOG";

/// Install a stderr subscriber for the engine's events.
///
/// An explicit `level` overrides [`LOG_ENV_VAR`]. Events go to stderr so
/// stdout stays reserved for whatever the tasks themselves print. Fails if
/// a global subscriber is already installed.
pub fn init_logging(level: Option<Level>) -> Result<()> {
    let level = level.or_else(env_level).unwrap_or(FALLBACK);

    fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing tracing subscriber: {e}"))
}

/// Level requested through the environment, if any; unparseable values are
/// ignored rather than fatal.
fn env_level() -> Option<Level> {
    let raw = std::env::var(LOG_ENV_VAR).ok()?;
    Level::from_str(raw.trim()).ok()
}
