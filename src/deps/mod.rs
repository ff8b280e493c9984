// src/deps/mod.rs

//! Dependency and target capability contract.
//!
//! Every resource kind a task can depend on (or produce) is represented as a
//! variant of the [`Dep`] / [`Target`] sums. Each kind knows its stable key,
//! whether it currently exists, and how to produce a [`Witness`] describing
//! its present state. The up-to-date engine compares witnesses against the
//! ones persisted by the last successful run.
//!
//! Built-in kinds: local file, directory prefix, another task, calc
//! (predicate output). Anything else plugs in through the [`CustomDep`] /
//! [`CustomTarget`] traits and is dispatched through the `Custom` variants.

pub mod file;
pub mod task;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

pub use file::{DirDep, DirTarget, FileChecker, FileDep, FileTarget};
pub use task::{task_result_digest, task_result_value, CalcDep, CalcFn, TaskDep};

/// Saved-values payload: string-keyed maps of JSON values.
///
/// With default `serde_json` features this map is ordered by key, so its
/// serialization (and therefore any digest of it) is deterministic.
pub type ValueMap = serde_json::Map<String, serde_json::Value>;

/// How a dependency key is compared against a target key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchStrategy {
    /// Keys must be identical.
    Exact,
    /// The target key is a prefix; it matches any key under it.
    Prefix,
    /// The kind supplies its own `matches()` predicate.
    Custom,
}

/// Opaque comparable state of a dependency at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "v", rename_all = "snake_case")]
pub enum Witness {
    /// Full file state: mtime fast path, then size, then content digest.
    FileStat {
        mtime: (i64, u32),
        size: u64,
        digest: String,
    },
    /// Timestamp-only file state.
    Mtime((i64, u32)),
    /// Digest of a derived listing or value set.
    Digest(String),
    /// Arbitrary serializable state (calc and custom kinds).
    Value(serde_json::Value),
}

/// Read-only view of other tasks' saved values, as visible at check time.
///
/// Values committed earlier in the running session shadow the persisted
/// store. The task kind uses this to digest its producer's values.
pub trait ValuesView {
    /// Saved values of `task`, or `None` if it has never succeeded.
    fn task_values(&self, task: &str) -> Result<Option<ValueMap>>;

    /// Member task names when `task` is a group, `None` otherwise.
    fn group_members(&self, task: &str) -> Option<Vec<String>>;
}

/// Plug-in contract for dependency kinds not built into the engine.
pub trait CustomDep: Send + Sync {
    fn key(&self) -> String;
    fn exists(&self) -> Result<bool>;
    fn witness(&self, values: &dyn ValuesView) -> Result<Witness>;

    fn strategy(&self) -> MatchStrategy {
        MatchStrategy::Exact
    }

    /// Only consulted when `strategy()` is [`MatchStrategy::Custom`].
    fn matches(&self, _other_key: &str) -> bool {
        false
    }

    fn modified_since(&self, stored: &Witness, values: &dyn ValuesView) -> Result<bool> {
        Ok(&self.witness(values)? != stored)
    }
}

/// Plug-in contract for target kinds not built into the engine.
pub trait CustomTarget: Send + Sync {
    fn key(&self) -> String;
    fn exists(&self) -> Result<bool>;

    fn strategy(&self) -> MatchStrategy {
        MatchStrategy::Custom
    }

    /// Whether a dependency with the given key binds to this target.
    fn matches(&self, dep_key: &str) -> bool;
}

/// A typed reference to a task input.
pub enum Dep {
    File(FileDep),
    Dir(DirDep),
    Task(TaskDep),
    Calc(CalcDep),
    Custom(Box<dyn CustomDep>),
}

impl Dep {
    /// Stable string identity, unique within a namespace.
    pub fn key(&self) -> String {
        match self {
            Dep::File(d) => d.key(),
            Dep::Dir(d) => d.key(),
            Dep::Task(d) => d.key(),
            Dep::Calc(d) => d.key(),
            Dep::Custom(d) => d.key(),
        }
    }

    pub fn strategy(&self) -> MatchStrategy {
        match self {
            Dep::File(_) | Dep::Task(_) | Dep::Calc(_) => MatchStrategy::Exact,
            Dep::Dir(_) => MatchStrategy::Prefix,
            Dep::Custom(d) => d.strategy(),
        }
    }

    pub fn exists(&self) -> Result<bool> {
        match self {
            Dep::File(d) => d.exists(),
            Dep::Dir(d) => d.exists(),
            Dep::Task(d) => d.exists(),
            Dep::Calc(d) => d.exists(),
            Dep::Custom(d) => d.exists(),
        }
    }

    /// Current state of the resource. May perform I/O.
    pub fn witness(&self, values: &dyn ValuesView) -> Result<Witness> {
        match self {
            Dep::File(d) => d.witness(),
            Dep::Dir(d) => d.witness(),
            Dep::Task(d) => d.witness(values),
            Dep::Calc(d) => d.witness(),
            Dep::Custom(d) => d.witness(values),
        }
    }

    /// Whether the resource changed relative to a stored witness.
    pub fn modified_since(&self, stored: &Witness, values: &dyn ValuesView) -> Result<bool> {
        match self {
            Dep::File(d) => d.modified_since(stored),
            Dep::Dir(d) => Ok(&d.witness()? != stored),
            Dep::Task(d) => Ok(&d.witness(values)? != stored),
            Dep::Calc(d) => Ok(&d.witness()? != stored),
            Dep::Custom(d) => d.modified_since(stored, values),
        }
    }

    /// The task name this dependency orders after, if it is a task kind.
    pub fn task_name(&self) -> Option<&str> {
        match self {
            Dep::Task(d) => Some(d.task_name()),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Dep").field(&self.key()).finish()
    }
}

/// A typed reference to a task output.
///
/// Custom targets are shared (`Arc`) so the match index can retain their
/// `matches()` predicate past task replacement.
pub enum Target {
    File(FileTarget),
    Dir(DirTarget),
    Custom(std::sync::Arc<dyn CustomTarget>),
}

impl Target {
    pub fn key(&self) -> String {
        match self {
            Target::File(t) => t.key(),
            Target::Dir(t) => t.key(),
            Target::Custom(t) => t.key(),
        }
    }

    pub fn strategy(&self) -> MatchStrategy {
        match self {
            Target::File(_) => MatchStrategy::Exact,
            Target::Dir(_) => MatchStrategy::Prefix,
            Target::Custom(t) => t.strategy(),
        }
    }

    pub fn exists(&self) -> Result<bool> {
        match self {
            Target::File(t) => t.exists(),
            Target::Dir(t) => t.exists(),
            Target::Custom(t) => t.exists(),
        }
    }

    /// Custom-strategy match predicate; exact/prefix targets are matched
    /// through the index instead.
    pub fn matches(&self, dep_key: &str) -> bool {
        match self {
            Target::File(t) => t.key() == dep_key,
            Target::Dir(t) => dep_key.starts_with(&t.key()),
            Target::Custom(t) => t.matches(dep_key),
        }
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Target").field(&self.key()).finish()
    }
}

/// blake3 digest of a serializable value, used for task-result witnesses.
pub fn value_digest(value: &serde_json::Value) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}
