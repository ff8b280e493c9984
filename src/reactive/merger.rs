// src/reactive/merger.rs

//! Diffing regenerated tasks against the admitted set.
//!
//! Generators re-emit their whole task set on every invocation; the merger
//! compares canonical signatures to decide which of those are genuinely
//! new, which changed, and which can be ignored.

use std::collections::HashMap;

use crate::task::{Task, TaskSignature, TaskState};

/// What to do with one regenerated task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// Never seen: admit and mark PENDING.
    Add,
    /// Identical signature: ignore.
    Skip,
    /// Known but changed, and the admitted task has not run: replace and
    /// re-queue.
    Update,
    /// Known and changed, but the admitted task already ran (or is
    /// running): keep the admitted one and report the divergence.
    Conflict,
}

/// Tally of one merge batch.
#[derive(Debug, Clone, Default)]
pub struct MergeStats {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub conflicts: Vec<String>,
}

impl MergeStats {
    /// Whether the batch changed the admitted task set at all.
    pub fn has_changes(&self) -> bool {
        self.added > 0 || self.updated > 0
    }
}

/// Tracks the canonical signature of every admitted task.
#[derive(Debug, Default)]
pub struct TaskMerger {
    signatures: HashMap<String, TaskSignature>,
}

impl TaskMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a regenerated task against the admitted set.
    pub fn classify(&self, task: &Task, state: Option<TaskState>) -> MergeDecision {
        match self.signatures.get(&task.name) {
            None => MergeDecision::Add,
            Some(known) if *known == task.signature() => MergeDecision::Skip,
            Some(_) => match state {
                // Executed or executing tasks are never replaced; a task
                // runs at most once per session.
                Some(TaskState::Done)
                | Some(TaskState::Running)
                | Some(TaskState::Failed(_)) => MergeDecision::Conflict,
                _ => MergeDecision::Update,
            },
        }
    }

    /// Record the signature of an admitted (added or updated) task.
    pub fn record(&mut self, task: &Task) {
        self.signatures.insert(task.name.clone(), task.signature());
    }

    pub fn known_count(&self) -> usize {
        self.signatures.len()
    }
}
