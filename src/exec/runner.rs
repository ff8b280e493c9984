// src/exec/runner.rs

//! Per-task runner: decision, setup materialization, getargs resolution,
//! action sequence and the witness/value commit.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, error, info, warn};

use crate::dag::{Scheduler, TaskTable};
use crate::deps::{ValueMap, ValuesView};
use crate::errors::{Result, RippleError};
use crate::exec::{run_action, ActionOutcome, CancelToken};
use crate::matching::MatchIndex;
use crate::store::StateStore;
use crate::task::{ActionCtx, FailCause, GetArg, Task, TaskState};
use crate::uptodate::{self, CheckOutcome, ValueSaver};

/// Saved-values lookup visible to checks and getargs resolution: values
/// committed earlier in this session shadow the persisted store.
pub(crate) struct SessionValues<'a> {
    pub session: &'a HashMap<String, ValueMap>,
    pub store: &'a dyn StateStore,
    pub table: &'a TaskTable,
}

impl ValuesView for SessionValues<'_> {
    fn task_values(&self, task: &str) -> Result<Option<ValueMap>> {
        if let Some(values) = self.session.get(task) {
            return Ok(Some(values.clone()));
        }
        Ok(self.store.load(task)?.map(|r| r.values))
    }

    fn group_members(&self, task: &str) -> Option<Vec<String>> {
        let t = self.table.get(task)?;
        if t.is_group() {
            Some(
                t.task_dep_names()
                    .into_iter()
                    .map(|s| s.to_string())
                    .collect(),
            )
        } else {
            None
        }
    }
}

/// Borrows the session state needed to run one task to a terminal state.
///
/// The runner occupies the session from pre-check through commit: the task
/// is indivisible from the perspective of other tasks.
pub struct TaskRunner<'a> {
    pub table: &'a TaskTable,
    pub sched: &'a mut Scheduler,
    pub index: &'a MatchIndex,
    pub store: &'a mut dyn StateStore,
    pub session_values: &'a mut HashMap<String, ValueMap>,
    pub pending_savers: &'a mut HashMap<String, Vec<ValueSaver>>,
    pub decided: &'a mut HashSet<String>,
    pub waiting_setup: &'a mut HashSet<String>,
    pub published: &'a mut VecDeque<String>,
    pub teardown_stack: &'a mut Vec<String>,
    pub cancel: &'a CancelToken,
}

impl TaskRunner<'_> {
    /// Drive one picked task as far as it can go this turn.
    ///
    /// Most paths end in a terminal state; a task whose setup tasks are not
    /// yet finished parks in READY with a `waiting_setup` mark and is
    /// re-picked once they are.
    pub async fn run_task(&mut self, name: &str) -> Result<()> {
        let table = self.table;
        let task = table
            .get(name)
            .ok_or_else(|| RippleError::TaskNotFound(name.to_string()))?;

        self.sched.set_state(name, TaskState::Running);

        // Groups collapse to completion once their task deps are satisfied.
        if task.is_group() {
            debug!(task = %name, "group complete");
            if !task.teardown.is_empty() {
                self.teardown_stack.push(name.to_string());
            }
            self.sched.set_state(name, TaskState::Done);
            return Ok(());
        }

        // The execute/skip decision is made exactly once, before setups.
        if !self.decided.contains(name) {
            let record = self.store.load(name)?;
            let mut savers: Vec<ValueSaver> = Vec::new();
            let outcome = {
                let view = SessionValues {
                    session: &*self.session_values,
                    store: &*self.store,
                    table,
                };
                uptodate::check(task, record.as_ref(), &view, &mut savers).await
            };

            match outcome {
                CheckOutcome::UpToDate => {
                    info!(task = %name, "up to date; skipping");
                    self.sched.set_state(name, TaskState::Skipped);
                    return Ok(());
                }
                CheckOutcome::Error { reason } => {
                    warn!(task = %name, reason = %reason, "dependency check errored; failing without running");
                    self.sched
                        .set_state(name, TaskState::Failed(FailCause::Check));
                    self.sched.cascade_failures(table, self.index);
                    return Ok(());
                }
                CheckOutcome::Changed { reason } => {
                    info!(task = %name, reason = %reason, "task needs to run");
                    self.decided.insert(name.to_string());
                    self.pending_savers.insert(name.to_string(), savers);
                }
            }
        }

        // Materialize setup tasks: they run only now that this task is
        // actually going to execute, and only once per session.
        let setups_pending = task
            .setup
            .iter()
            .any(|s| !self.sched.state(s).is_some_and(|st| st.is_terminal()));
        if setups_pending {
            for s in &task.setup {
                self.sched.demand(s);
            }
            debug!(task = %name, "parked until setup tasks finish");
            self.waiting_setup.insert(name.to_string());
            self.sched.set_state(name, TaskState::Ready);
            return Ok(());
        }
        self.waiting_setup.remove(name);

        if task
            .setup
            .iter()
            .any(|s| !self.sched.state(s).is_some_and(|st| st.is_satisfied()))
        {
            warn!(task = %name, "a setup task failed; failing");
            self.sched
                .set_state(name, TaskState::Failed(FailCause::Upstream));
            self.sched.cascade_failures(table, self.index);
            return Ok(());
        }

        // Resolve getargs against producer values (this session or store).
        let resolved = {
            let view = SessionValues {
                session: &*self.session_values,
                store: &*self.store,
                table,
            };
            resolve_getargs(task, &view)
        };
        let args = match resolved {
            Ok(args) => args,
            Err(reason) => {
                error!(task = %name, reason = %reason, "getargs resolution failed");
                self.sched
                    .set_state(name, TaskState::Failed(FailCause::GetArgs));
                self.sched.cascade_failures(table, self.index);
                return Ok(());
            }
        };

        // Actions, strictly in declared order. First failure stops the task
        // and nothing gets persisted.
        let mut buffer = ValueMap::new();
        for (idx, action) in task.actions.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(task = %name, "cancelled at action boundary");
                self.sched
                    .set_state(name, TaskState::Failed(FailCause::Cancelled));
                self.sched.cascade_failures(table, self.index);
                return Ok(());
            }

            let ctx = ActionCtx { task: name, args: &args };
            match run_action(action, &ctx).await {
                ActionOutcome::Success(Some(values)) => {
                    for (k, v) in values {
                        buffer.insert(k, v);
                    }
                }
                ActionOutcome::Success(None) => {}
                ActionOutcome::Failure(reason) => {
                    error!(task = %name, action = idx, reason = %reason, "action failed");
                    self.sched
                        .set_state(name, TaskState::Failed(FailCause::Action));
                    self.sched.cascade_failures(table, self.index);
                    return Ok(());
                }
            }
        }

        // Commit: value savers, fresh witnesses, one atomic record.
        let savers = self.pending_savers.remove(name).unwrap_or_default();
        let record = {
            let view = SessionValues {
                session: &*self.session_values,
                store: &*self.store,
                table,
            };
            uptodate::build_record(task, &view, buffer, &savers)
        };

        match record.and_then(|rec| {
            self.store.upsert(name, rec.clone())?;
            Ok(rec)
        }) {
            Ok(rec) => {
                self.session_values.insert(name.to_string(), rec.values);
                if !task.teardown.is_empty() {
                    self.teardown_stack.push(name.to_string());
                }
                for key in task.target_keys() {
                    self.published.push_back(key);
                }
                self.sched.set_state(name, TaskState::Done);
                info!(task = %name, "task completed");
            }
            Err(e) => {
                error!(task = %name, error = %e, "commit failed; demoting to failed");
                self.sched
                    .set_state(name, TaskState::Failed(FailCause::Commit));
                self.sched.cascade_failures(table, self.index);
            }
        }

        Ok(())
    }
}

/// Resolve every getargs entry to a concrete value.
///
/// A missing producer record or value name is a task failure (not a session
/// error); the reason string becomes the failure log line.
fn resolve_getargs(
    task: &Task,
    view: &dyn ValuesView,
) -> std::result::Result<ValueMap, String> {
    let mut args = ValueMap::new();
    for (param, getarg) in &task.getargs {
        let value =
            resolve_one(getarg, view).map_err(|e| format!("parameter '{param}': {e}"))?;
        args.insert(param.clone(), value);
    }
    Ok(args)
}

fn resolve_one(
    getarg: &GetArg,
    view: &dyn ValuesView,
) -> std::result::Result<serde_json::Value, String> {
    // A group producer delivers a map of member name -> value. A member
    // without a record, or without the named value, fails the consumer
    // just like a missing non-group producer would.
    if let Some(members) = view.group_members(&getarg.task) {
        let mut map = serde_json::Map::new();
        for member in members {
            let values = view
                .task_values(&member)
                .map_err(|e| e.to_string())?
                .ok_or_else(|| {
                    format!(
                        "group '{}' member '{member}' has no saved values",
                        getarg.task
                    )
                })?;
            let entry = match &getarg.value {
                None => serde_json::Value::Object(values),
                Some(name) => values.get(name).cloned().ok_or_else(|| {
                    format!(
                        "group '{}' member '{member}' has no saved value '{name}'",
                        getarg.task
                    )
                })?,
            };
            map.insert(member, entry);
        }
        return Ok(serde_json::Value::Object(map));
    }

    let values = view
        .task_values(&getarg.task)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("producer task '{}' has no saved values", getarg.task))?;

    match &getarg.value {
        None => Ok(serde_json::Value::Object(values)),
        Some(name) => values.get(name).cloned().ok_or_else(|| {
            format!(
                "producer task '{}' has no saved value '{name}'",
                getarg.task
            )
        }),
    }
}

/// Run teardown actions for DONE tasks, in reverse execution order.
///
/// A failing teardown action is logged and stops the remaining teardown
/// actions of that task only.
pub async fn run_teardowns(table: &TaskTable, stack: &[String]) {
    let empty = ValueMap::new();
    for name in stack.iter().rev() {
        let Some(task) = table.get(name) else { continue };
        for action in &task.teardown {
            let ctx = ActionCtx {
                task: name,
                args: &empty,
            };
            match run_action(action, &ctx).await {
                ActionOutcome::Success(_) => {}
                ActionOutcome::Failure(reason) => {
                    warn!(task = %name, reason = %reason, "teardown action failed");
                    break;
                }
            }
        }
    }
}
