// src/store.rs

//! Persisted per-task state: dependency witnesses and saved values.
//!
//! The engine treats the store as opaque; any backend with atomic per-task
//! upsert and point lookup will do. `FileStateStore` keeps everything in a
//! single JSON document and swaps it in atomically on each upsert;
//! `MemoryStateStore` backs tests and throwaway sessions.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::deps::{ValueMap, Witness};
use crate::errors::{Result, RippleError};

/// Everything persisted for one task after a successful run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Witness per dependency key, exactly as declared at commit time.
    pub deps: BTreeMap<String, Witness>,

    /// Values saved by actions and value savers.
    pub values: ValueMap,

    /// Unix timestamp of the last successful run.
    pub last_success: i64,
}

impl TaskRecord {
    pub fn new(deps: BTreeMap<String, Witness>, values: ValueMap) -> Self {
        Self {
            deps,
            values,
            last_success: unix_now(),
        }
    }
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Abstract storage for task records.
pub trait StateStore: Send {
    fn load(&self, task: &str) -> Result<Option<TaskRecord>>;

    /// Replace the whole record for a task. Replacement (not merge) is what
    /// guarantees no stale witness keys survive a successful commit.
    fn upsert(&mut self, task: &str, record: TaskRecord) -> Result<()>;
}

/// Stores records in a single JSON file.
pub struct FileStateStore {
    path: PathBuf,
    records: HashMap<String, TaskRecord>,
}

impl FileStateStore {
    /// Open (or create) the store at `path`, loading any existing records.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            let text = fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            HashMap::new()
        };
        debug!(path = %path.display(), tasks = records.len(), "opened state store");
        Ok(Self { path, records })
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write to a sibling temp file and rename so a crashed commit never
        // leaves a truncated store behind.
        let tmp = self.path.with_extension("tmp");
        let text = serde_json::to_string_pretty(&self.records)?;
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            RippleError::Store(format!(
                "replacing state file {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn load(&self, task: &str) -> Result<Option<TaskRecord>> {
        Ok(self.records.get(task).cloned())
    }

    fn upsert(&mut self, task: &str, record: TaskRecord) -> Result<()> {
        self.records.insert(task.to_string(), record);
        self.persist()?;
        debug!(task = %task, "committed task record (file)");
        Ok(())
    }
}

/// Stores records in memory only (lost when the session ends).
#[derive(Default)]
pub struct MemoryStateStore {
    records: HashMap<String, TaskRecord>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, task: &str) -> Result<Option<TaskRecord>> {
        Ok(self.records.get(task).cloned())
    }

    fn upsert(&mut self, task: &str, record: TaskRecord) -> Result<()> {
        self.records.insert(task.to_string(), record);
        debug!(task = %task, "committed task record (memory)");
        Ok(())
    }
}
