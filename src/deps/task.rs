// src/deps/task.rs

//! Task and calc dependency kinds.

use crate::deps::{value_digest, ValuesView, Witness};
use crate::errors::Result;

/// Dependency on another task. Key is `task:<name>`.
///
/// The witness is the digest of the producer's saved values, so a consumer
/// re-runs exactly when the producer's saved values changed. A producer that
/// re-ran but saved identical values does not invalidate its consumers.
#[derive(Debug, Clone)]
pub struct TaskDep {
    name: String,
}

impl TaskDep {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn task_name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> String {
        format!("task:{}", self.name)
    }

    /// Task existence is validated at admission, not here.
    pub fn exists(&self) -> Result<bool> {
        Ok(true)
    }

    pub fn witness(&self, values: &dyn ValuesView) -> Result<Witness> {
        Ok(Witness::Digest(task_result_digest(&self.name, values)?))
    }
}

/// Digest of a task's saved values; for groups, of the map from member
/// name to that member's saved values.
pub fn task_result_digest(task: &str, values: &dyn ValuesView) -> Result<String> {
    let combined = task_result_value(task, values)?;
    Ok(value_digest(&combined))
}

/// The value a task "resulted in": its saved-values map, or for a group
/// task the map member-name -> member saved values.
pub fn task_result_value(task: &str, values: &dyn ValuesView) -> Result<serde_json::Value> {
    if let Some(members) = values.group_members(task) {
        let mut combined = serde_json::Map::new();
        for member in members {
            let member_values = values
                .task_values(&member)?
                .map(serde_json::Value::Object)
                .unwrap_or(serde_json::Value::Null);
            combined.insert(member, member_values);
        }
        return Ok(serde_json::Value::Object(combined));
    }

    Ok(values
        .task_values(task)?
        .map(serde_json::Value::Object)
        .unwrap_or(serde_json::Value::Null))
}

/// Callable signature for calc dependencies.
pub type CalcFn = Box<dyn Fn() -> anyhow::Result<serde_json::Value> + Send + Sync>;

/// Dependency on the output of a user-supplied predicate. Key is
/// `calc:<name>`; the predicate's return value is the witness, so the
/// owning task re-runs whenever the computed value changes.
pub struct CalcDep {
    name: String,
    func: CalcFn,
}

impl CalcDep {
    pub fn new(name: impl Into<String>, func: CalcFn) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    pub fn key(&self) -> String {
        format!("calc:{}", self.name)
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(true)
    }

    pub fn witness(&self) -> Result<Witness> {
        let value = (self.func)()?;
        Ok(Witness::Value(value))
    }
}

impl std::fmt::Debug for CalcDep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalcDep").field("name", &self.name).finish()
    }
}
