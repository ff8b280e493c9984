// src/task.rs

//! Task data model: actions, up-to-date forms, per-session states and the
//! canonical signature used to detect regeneration changes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::deps::{Dep, Target, ValueMap};

/// Context handed to callable actions.
pub struct ActionCtx<'a> {
    /// Name of the task being executed.
    pub task: &'a str,
    /// Parameters resolved through `getargs` from producer tasks.
    pub args: &'a ValueMap,
}

/// Callable action signature: success may carry a map of values to save;
/// failure is any error.
pub type ActionFn =
    Box<dyn Fn(&ActionCtx<'_>) -> anyhow::Result<Option<ValueMap>> + Send + Sync>;

/// One unit of work inside a task.
pub enum Action {
    /// Shell command string, run through `sh -c` (or `cmd /C` on Windows).
    /// Zero exit status is success; shell actions save no values.
    Shell(String),
    /// Named callable. The name participates in the task signature so the
    /// merger can tell regenerated actions apart.
    Func { name: String, call: ActionFn },
}

impl Action {
    pub fn shell(cmd: impl Into<String>) -> Self {
        Action::Shell(cmd.into())
    }

    pub fn func(
        name: impl Into<String>,
        call: impl Fn(&ActionCtx<'_>) -> anyhow::Result<Option<ValueMap>> + Send + Sync + 'static,
    ) -> Self {
        Action::Func {
            name: name.into(),
            call: Box::new(call),
        }
    }

    /// Stable identity used in task signatures.
    pub fn fingerprint(&self) -> String {
        match self {
            Action::Shell(cmd) => format!("shell:{cmd}"),
            Action::Func { name, .. } => format!("func:{name}"),
        }
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

/// Result of evaluating an up-to-date predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tristate {
    True,
    False,
    /// The predicate cannot decide; it is skipped.
    Undetermined,
}

/// Predicate evaluated during the up-to-date check.
///
/// Predicates see an immutable view of the task; the only supported task
/// mutation is [`UptodatePredicate::configure_task`], invoked once at
/// admission.
pub trait UptodatePredicate: Send + Sync {
    fn eval(&self, ctx: &mut crate::uptodate::UptodateCtx<'_>) -> anyhow::Result<Tristate>;

    /// Admission-time hook; may add setup tasks or dependencies.
    fn configure_task(&self, _task: &mut Task) {}
}

/// Accepted up-to-date forms.
pub enum Uptodate {
    /// Constant verdict. `true` alone never marks a task up-to-date before
    /// its first successful run.
    Constant(bool),
    /// Always skipped.
    Undetermined,
    /// Shell command; zero exit status means up-to-date.
    Shell(String),
    /// Full predicate object (shared so admission hooks can run while the
    /// task is being mutated).
    Check(Arc<dyn UptodatePredicate>),
}

impl Uptodate {
    pub fn check(p: impl UptodatePredicate + 'static) -> Self {
        Uptodate::Check(Arc::new(p))
    }
}

impl std::fmt::Debug for Uptodate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Uptodate::Constant(b) => write!(f, "Constant({b})"),
            Uptodate::Undetermined => write!(f, "Undetermined"),
            Uptodate::Shell(cmd) => write!(f, "Shell({cmd})"),
            Uptodate::Check(_) => write!(f, "Check(..)"),
        }
    }
}

/// Pointer at another task's saved value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetArg {
    /// Producer task name.
    pub task: String,
    /// Value name; `None` delivers the producer's whole saved-values map.
    pub value: Option<String>,
}

impl GetArg {
    pub fn new(task: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            task: task.into(),
            value: value.map(|s| s.to_string()),
        }
    }
}

/// Why a task ended up FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailCause {
    /// An action reported failure.
    Action,
    /// A task this one depends on failed.
    Upstream,
    /// Cooperative cancellation at an action boundary.
    Cancelled,
    /// Witnesses or saved values could not be persisted.
    Commit,
    /// A dependency's exists/witness call errored during the check.
    Check,
    /// getargs producer or value name could not be resolved.
    GetArgs,
    /// The task could never become ready (e.g. an implicit-edge cycle).
    Unsatisfiable,
}

/// Per-session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Ready,
    Running,
    Done,
    /// Up-to-date; actions were skipped and the store was not touched.
    Skipped,
    Failed(FailCause),
}

impl TaskState {
    /// Terminal states end a task for the session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Done | TaskState::Skipped | TaskState::Failed(_)
        )
    }

    /// Whether downstream tasks may treat this task as satisfied.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Skipped)
    }
}

/// Canonical comparable shape of a task, used by the merger to classify a
/// regenerated task as identical or updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSignature {
    pub actions: Vec<String>,
    pub deps: BTreeSet<String>,
    pub targets: BTreeSet<String>,
    pub setup: Vec<String>,
}

/// A uniquely named unit of work.
///
/// A task with no actions is a *group*: it completes as soon as its task
/// dependencies are satisfied and never touches the store.
pub struct Task {
    pub name: String,
    pub doc: Option<String>,
    pub actions: Vec<Action>,
    pub deps: Vec<Dep>,
    pub targets: Vec<Target>,
    /// Names of tasks materialized right before this one executes.
    pub setup: Vec<String>,
    /// Actions run after the session, in reverse execution order, for
    /// tasks that ended DONE.
    pub teardown: Vec<Action>,
    pub uptodate: Vec<Uptodate>,
    /// Action-parameter name -> producer value pointer.
    pub getargs: BTreeMap<String, GetArg>,
    /// Group-only: do not run unless another admitted task demands it.
    pub no_default_run: bool,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            actions: Vec::new(),
            deps: Vec::new(),
            targets: Vec::new(),
            setup: Vec::new(),
            teardown: Vec::new(),
            uptodate: Vec::new(),
            getargs: BTreeMap::new(),
            no_default_run: false,
        }
    }

    /// Store only the first non-blank line of a doc string.
    pub fn with_doc(mut self, doc: &str) -> Self {
        self.doc = first_line(doc);
        self
    }

    pub fn is_group(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn dep_keys(&self) -> Vec<String> {
        self.deps.iter().map(|d| d.key()).collect()
    }

    pub fn target_keys(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.key()).collect()
    }

    /// Names of tasks this one explicitly orders after.
    pub fn task_dep_names(&self) -> Vec<&str> {
        self.deps.iter().filter_map(|d| d.task_name()).collect()
    }

    pub fn signature(&self) -> TaskSignature {
        TaskSignature {
            actions: self.actions.iter().map(|a| a.fingerprint()).collect(),
            deps: self.dep_keys().into_iter().collect(),
            targets: self.target_keys().into_iter().collect(),
            setup: self.setup.clone(),
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("actions", &self.actions.len())
            .field("deps", &self.dep_keys())
            .field("targets", &self.target_keys())
            .finish()
    }
}

/// Extract the first non-blank line from a doc string.
fn first_line(doc: &str) -> Option<String> {
    doc.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}
