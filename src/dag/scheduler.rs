// src/dag/scheduler.rs

//! Per-session task state transitions and ready selection.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::dag::TaskTable;
use crate::matching::MatchIndex;
use crate::task::{FailCause, Task, TaskState};

/// Tracks every admitted task's lifecycle state for one session and decides
/// which task runs next.
#[derive(Debug, Default)]
pub struct Scheduler {
    states: HashMap<String, TaskState>,
    demanded: HashSet<String>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a task (or reset a re-queued one) to PENDING.
    pub fn admit(&mut self, name: &str) {
        self.states.insert(name.to_string(), TaskState::Pending);
    }

    pub fn state(&self, name: &str) -> Option<TaskState> {
        self.states.get(name).copied()
    }

    pub fn set_state(&mut self, name: &str, state: TaskState) {
        debug!(task = %name, ?state, "state transition");
        self.states.insert(name.to_string(), state);
    }

    /// Mark a task runnable regardless of the default-run flag (used when a
    /// parent materializes its setup tasks).
    pub fn demand(&mut self, name: &str) {
        self.demanded.insert(name.to_string());
    }

    pub fn is_demanded(&self, name: &str) -> bool {
        self.demanded.contains(name)
    }

    /// Recompute which tasks this session wants to run: everything except
    /// `no_default_run` tasks, closed over explicit task-dep edges and
    /// implicit producer edges.
    pub fn recompute_demand(&mut self, table: &TaskTable, index: &MatchIndex) {
        for task in table.iter_in_order() {
            if !task.no_default_run {
                self.demanded.insert(task.name.clone());
            }
        }

        loop {
            let mut grew = false;
            for task in table.iter_in_order() {
                if !self.demanded.contains(&task.name) {
                    continue;
                }
                for dep_name in task.task_dep_names() {
                    if self.demanded.insert(dep_name.to_string()) {
                        grew = true;
                    }
                }
                for key in task.dep_keys() {
                    if let Some(producer) = index.find_producer(&key) {
                        if producer != task.name
                            && self.demanded.insert(producer.to_string())
                        {
                            grew = true;
                        }
                    }
                }
            }
            if !grew {
                break;
            }
        }
    }

    /// Whether everything this task orders after has completed successfully.
    pub fn deps_satisfied(&self, task: &Task, index: &MatchIndex) -> bool {
        for dep_name in task.task_dep_names() {
            match self.state(dep_name) {
                Some(state) if state.is_satisfied() => {}
                _ => return false,
            }
        }

        for key in task.dep_keys() {
            if let Some(producer) = index.find_producer(&key) {
                if producer == task.name {
                    continue;
                }
                match self.state(producer) {
                    Some(state) if state.is_satisfied() => {}
                    // Producer not admitted: nothing to wait for.
                    None => {}
                    _ => return false,
                }
            }
        }

        true
    }

    /// First PENDING task (admission order) that is demanded, not blocked,
    /// and whose upstream is satisfied. Promotes it to READY.
    pub fn next_ready(
        &mut self,
        table: &TaskTable,
        index: &MatchIndex,
        blocked: &HashSet<String>,
    ) -> Option<String> {
        let candidate = table.iter_in_order().find(|task| {
            matches!(self.state(&task.name), Some(TaskState::Pending))
                && self.demanded.contains(&task.name)
                && !blocked.contains(&task.name)
                && self.deps_satisfied(task, index)
        })?;

        let name = candidate.name.clone();
        self.set_state(&name, TaskState::Ready);
        Some(name)
    }

    /// Transitively fail every non-terminal task that orders after a FAILED
    /// one, through explicit task deps and implicit producer edges.
    ///
    /// Returns the newly failed task names.
    pub fn cascade_failures(&mut self, table: &TaskTable, index: &MatchIndex) -> Vec<String> {
        let mut newly_failed = Vec::new();

        loop {
            let mut changed = false;

            for task in table.iter_in_order() {
                match self.state(&task.name) {
                    Some(TaskState::Pending) | Some(TaskState::Ready) => {}
                    _ => continue,
                }

                if self.upstream_failed(task, index) {
                    warn!(
                        task = %task.name,
                        "marking failed: upstream task failed"
                    );
                    self.set_state(&task.name, TaskState::Failed(FailCause::Upstream));
                    newly_failed.push(task.name.clone());
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }

        newly_failed
    }

    fn upstream_failed(&self, task: &Task, index: &MatchIndex) -> bool {
        for dep_name in task.task_dep_names() {
            if matches!(self.state(dep_name), Some(TaskState::Failed(_))) {
                return true;
            }
        }
        for key in task.dep_keys() {
            if let Some(producer) = index.find_producer(&key) {
                if producer != task.name
                    && matches!(self.state(producer), Some(TaskState::Failed(_)))
                {
                    return true;
                }
            }
        }
        false
    }

    /// Count of tasks per terminal outcome: (done, skipped, failed).
    pub fn outcome_counts(&self) -> (usize, usize, usize) {
        let mut done = 0;
        let mut skipped = 0;
        let mut failed = 0;
        for state in self.states.values() {
            match state {
                TaskState::Done => done += 1,
                TaskState::Skipped => skipped += 1,
                TaskState::Failed(_) => failed += 1,
                _ => {}
            }
        }
        (done, skipped, failed)
    }
}
