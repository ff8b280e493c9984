// src/exec/mod.rs

//! Action execution and the per-task runner.

pub mod action;
pub mod runner;

pub use action::{run_action, run_shell_status, ActionOutcome};
pub use runner::{run_teardowns, TaskRunner};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation handle.
///
/// The executor checks it at action boundaries: the running task fails with
/// cause "cancelled", no further tasks start, and teardowns of DONE tasks
/// still run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
