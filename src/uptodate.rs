// src/uptodate.rs

//! Up-to-date decision engine.
//!
//! Combines target existence, user predicates, dependency-set drift and
//! per-dependency witness comparison into a single decision with a
//! human-readable reason. The check order is observable and short-circuits;
//! see [`check`].

use std::collections::BTreeSet;

use tracing::debug;

use crate::deps::{task_result_digest, Dep, TaskDep, ValueMap, ValuesView};
use crate::errors::Result;
use crate::exec::run_shell_status;
use crate::store::TaskRecord;
use crate::task::{Task, Tristate, Uptodate, UptodatePredicate};

/// Decision for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    UpToDate,
    Changed { reason: String },
    /// A dependency's exists/witness call (or a predicate) errored; the
    /// task fails without running actions and prior witnesses survive.
    Error { reason: String },
}

impl CheckOutcome {
    fn changed(reason: impl Into<String>) -> Self {
        CheckOutcome::Changed {
            reason: reason.into(),
        }
    }

    fn error(reason: impl Into<String>) -> Self {
        CheckOutcome::Error {
            reason: reason.into(),
        }
    }
}

/// Callable registered by a predicate during evaluation, invoked after the
/// task runs; its return map merges into the task's saved values.
pub type ValueSaver = Box<dyn Fn(&dyn ValuesView) -> anyhow::Result<ValueMap> + Send + Sync>;

/// Evaluation context handed to [`UptodatePredicate`]s.
pub struct UptodateCtx<'a> {
    /// Immutable view of the task being checked.
    pub task: &'a Task,
    /// Values persisted by the task's last successful run.
    pub stored: &'a ValueMap,
    values: &'a dyn ValuesView,
    savers: &'a mut Vec<ValueSaver>,
}

impl<'a> UptodateCtx<'a> {
    /// Register a callable to run after the task's actions succeed.
    pub fn register_value_saver(&mut self, saver: ValueSaver) {
        self.savers.push(saver);
    }

    /// Saved values of another task, as visible right now.
    pub fn task_values(&self, task: &str) -> Result<Option<ValueMap>> {
        self.values.task_values(task)
    }

    pub fn values_view(&self) -> &dyn ValuesView {
        self.values
    }
}

/// Decide whether `task` may skip execution.
///
/// Order, each step short-circuiting to `Changed` (or `Error`):
/// 1. no dependencies and no up-to-date forms: a task without declared
///    inputs can never be up-to-date;
/// 2. a missing target (presence is necessary, not sufficient);
/// 3. up-to-date forms in declared order; `Undetermined` is skipped and a
///    definitive `false` decides. Predicates may register value savers.
/// 4. a missing dependency is an error: the task fails without running;
/// 5. no stored record: the task has never succeeded, so even a constant
///    `true` cannot mark it up-to-date;
/// 6. dependency-set drift against the stored witness keys;
/// 7. any dependency modified since its stored witness.
pub async fn check(
    task: &Task,
    record: Option<&TaskRecord>,
    values: &dyn ValuesView,
    savers: &mut Vec<ValueSaver>,
) -> CheckOutcome {
    // 1. A task can only be up-to-date if it declares at least one input.
    if task.deps.is_empty() && task.uptodate.is_empty() {
        return CheckOutcome::changed("no inputs declared");
    }

    // 2. Every target must exist.
    for target in &task.targets {
        match target.exists() {
            Ok(true) => {}
            Ok(false) => {
                return CheckOutcome::changed(format!("missing target '{}'", target.key()));
            }
            Err(e) => {
                return CheckOutcome::error(format!(
                    "checking target '{}': {e}",
                    target.key()
                ));
            }
        }
    }

    // 3. User predicates, declared order.
    let empty = ValueMap::new();
    let stored_values = record.map(|r| &r.values).unwrap_or(&empty);
    let mut ctx = UptodateCtx {
        task,
        stored: stored_values,
        values,
        savers,
    };

    for (idx, form) in task.uptodate.iter().enumerate() {
        let verdict = match form {
            Uptodate::Constant(true) => Tristate::True,
            Uptodate::Constant(false) => Tristate::False,
            Uptodate::Undetermined => Tristate::Undetermined,
            Uptodate::Shell(cmd) => match run_shell_status(cmd).await {
                Ok(true) => Tristate::True,
                Ok(false) => Tristate::False,
                Err(e) => {
                    return CheckOutcome::error(format!(
                        "uptodate command '{cmd}' failed to run: {e}"
                    ));
                }
            },
            Uptodate::Check(p) => match p.eval(&mut ctx) {
                Ok(v) => v,
                Err(e) => {
                    return CheckOutcome::error(format!("uptodate predicate failed: {e}"));
                }
            },
        };

        match verdict {
            Tristate::False => {
                return CheckOutcome::changed(format!(
                    "uptodate condition #{idx} returned false"
                ));
            }
            // A definitive true is noted but never sufficient on its own.
            Tristate::True | Tristate::Undetermined => {}
        }
    }

    // 4. Dependencies must exist before their witnesses mean anything; a
    // missing one is an error, not a reason to run.
    for dep in &task.deps {
        let key = dep.key();
        match dep.exists() {
            Ok(true) => {}
            Ok(false) => {
                return CheckOutcome::error(format!("dependency '{key}' does not exist"));
            }
            Err(e) => {
                return CheckOutcome::error(format!("checking dependency '{key}': {e}"));
            }
        }
    }

    // 5. Never succeeded before.
    let record = match record {
        Some(r) => r,
        None => return CheckOutcome::changed("no prior successful run"),
    };

    // 6. Dependency-set drift.
    let current_keys: BTreeSet<String> = task.dep_keys().into_iter().collect();
    let stored_keys: BTreeSet<String> = record.deps.keys().cloned().collect();
    if current_keys != stored_keys {
        return CheckOutcome::changed("dependency set changed (added/removed)");
    }

    // 7. Per-dependency witness comparison, declared order.
    for dep in &task.deps {
        let key = dep.key();

        // The drift check above guarantees a stored witness per key.
        let Some(stored) = record.deps.get(&key) else {
            return CheckOutcome::changed(format!("dependency '{key}' has no stored witness"));
        };
        match dep.modified_since(stored, values) {
            Ok(true) => {
                return CheckOutcome::changed(format!("dependency '{key}' has been modified"));
            }
            Ok(false) => {}
            Err(e) => {
                return CheckOutcome::error(format!("witnessing dependency '{key}': {e}"));
            }
        }
    }

    debug!(task = %task.name, "all witnesses unchanged");
    CheckOutcome::UpToDate
}

/// Re-query every dependency's witness and run registered value savers,
/// producing the record committed alongside a successful run.
pub fn build_record(
    task: &Task,
    values: &dyn ValuesView,
    mut task_values: ValueMap,
    savers: &[ValueSaver],
) -> Result<TaskRecord> {
    for saver in savers {
        let saved = saver(values)?;
        for (k, v) in saved {
            task_values.insert(k, v);
        }
    }

    let mut deps = std::collections::BTreeMap::new();
    for dep in &task.deps {
        deps.insert(dep.key(), dep.witness(values)?);
    }

    Ok(TaskRecord::new(deps, task_values))
}

/// Predicate comparing a producer task's result (the digest of its saved
/// values) against the digest recorded on this task's last success.
///
/// `configure_task` wires the producer in: as a setup task (the getargs
/// path) or as an explicit task dependency.
pub struct ResultDep {
    task: String,
    setup: bool,
}

impl ResultDep {
    /// Producer becomes an explicit task dependency.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            setup: false,
        }
    }

    /// Producer becomes a setup task (runs only when this task runs).
    pub fn as_setup(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            setup: true,
        }
    }

    fn result_key(&self) -> String {
        format!("_result:{}", self.task)
    }
}

impl UptodatePredicate for ResultDep {
    fn configure_task(&self, task: &mut Task) {
        if self.setup {
            if !task.setup.iter().any(|s| s == &self.task) {
                task.setup.push(self.task.clone());
            }
        } else if !task.task_dep_names().contains(&self.task.as_str()) {
            task.deps.push(Dep::Task(TaskDep::new(&self.task)));
        }
    }

    fn eval(&self, ctx: &mut UptodateCtx<'_>) -> anyhow::Result<Tristate> {
        let current = task_result_digest(&self.task, ctx.values_view())?;

        // Capture the latest producer result after this task executes.
        let producer = self.task.clone();
        let result_key = self.result_key();
        let saver_key = result_key.clone();
        ctx.register_value_saver(Box::new(move |values| {
            let digest = task_result_digest(&producer, values)?;
            let mut map = ValueMap::new();
            map.insert(saver_key.clone(), serde_json::Value::String(digest));
            Ok(map)
        }));

        match ctx.stored.get(&result_key) {
            Some(serde_json::Value::String(last)) if *last == current => Ok(Tristate::True),
            Some(_) => Ok(Tristate::False),
            None => Ok(Tristate::False),
        }
    }
}
