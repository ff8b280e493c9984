// src/reactive/generator.rs

//! Contract for dynamic task production.

use crate::deps::MatchStrategy;
use crate::errors::Result;
use crate::task::Task;

/// A producer of tasks from the external world.
///
/// Generators are invoked once at session start and again whenever a task
/// publishes a target key matching one of their input patterns. `generate`
/// must be deterministic for a given external world, may produce zero
/// tasks, and must terminate; the session's merger decides which of the
/// produced tasks are new, changed or already known.
pub trait Generator: Send {
    /// Stable identifier, used to de-duplicate regeneration requests
    /// within one fixed-point step.
    fn id(&self) -> &str;

    /// Key patterns registered in the affected-generators index.
    fn input_patterns(&self) -> Vec<(String, MatchStrategy)>;

    /// Produce the current task set for this generator.
    fn generate(&mut self) -> Result<Vec<Task>>;
}
