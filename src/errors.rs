// src/errors.rs

//! Crate-wide error types and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RippleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("Cycle detected in task graph: {0}")]
    GraphCycle(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Conflicting target '{key}' declared by both '{first}' and '{second}'")]
    DuplicateTarget {
        key: String,
        first: String,
        second: String,
    },

    #[error("State store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("State serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RippleError>;
