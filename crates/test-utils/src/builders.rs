#![allow(dead_code)]

use std::path::Path;

use ripple::deps::{CalcDep, CalcFn, Dep, DirDep, DirTarget, FileDep, FileTarget, Target, TaskDep, ValueMap};
use ripple::task::{Action, ActionCtx, GetArg, Task, Uptodate};

/// Builder for [`Task`] to simplify test setup.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            task: Task::new(name),
        }
    }

    pub fn shell(mut self, cmd: &str) -> Self {
        self.task.actions.push(Action::shell(cmd));
        self
    }

    pub fn action(
        mut self,
        name: &str,
        f: impl Fn(&ActionCtx<'_>) -> anyhow::Result<Option<ValueMap>> + Send + Sync + 'static,
    ) -> Self {
        self.task.actions.push(Action::func(name, f));
        self
    }

    /// Action that succeeds and returns a fixed value under `key`.
    pub fn returns(mut self, action_name: &str, key: &str, value: serde_json::Value) -> Self {
        let key = key.to_string();
        self.task.actions.push(Action::func(action_name, move |_ctx| {
            let mut map = ValueMap::new();
            map.insert(key.clone(), value.clone());
            Ok(Some(map))
        }));
        self
    }

    /// Action that always fails with the given reason.
    pub fn failing(mut self, action_name: &str, reason: &str) -> Self {
        let reason = reason.to_string();
        self.task.actions.push(Action::func(action_name, move |_ctx| {
            Err(anyhow::anyhow!("{reason}"))
        }));
        self
    }

    pub fn file_dep(mut self, path: impl AsRef<Path>) -> Self {
        self.task.deps.push(Dep::File(FileDep::new(path)));
        self
    }

    pub fn dir_dep(mut self, path: impl AsRef<Path>) -> Self {
        self.task.deps.push(Dep::Dir(DirDep::new(path)));
        self
    }

    pub fn task_dep(mut self, name: &str) -> Self {
        self.task.deps.push(Dep::Task(TaskDep::new(name)));
        self
    }

    pub fn calc_dep(mut self, name: &str, f: CalcFn) -> Self {
        self.task.deps.push(Dep::Calc(CalcDep::new(name, f)));
        self
    }

    pub fn file_target(mut self, path: impl AsRef<Path>) -> Self {
        self.task.targets.push(Target::File(FileTarget::new(path)));
        self
    }

    pub fn dir_target(mut self, path: impl AsRef<Path>) -> Self {
        self.task.targets.push(Target::Dir(DirTarget::new(path)));
        self
    }

    pub fn setup(mut self, name: &str) -> Self {
        self.task.setup.push(name.to_string());
        self
    }

    pub fn teardown_shell(mut self, cmd: &str) -> Self {
        self.task.teardown.push(Action::shell(cmd));
        self
    }

    pub fn uptodate(mut self, form: Uptodate) -> Self {
        self.task.uptodate.push(form);
        self
    }

    pub fn getarg(mut self, param: &str, task: &str, value: Option<&str>) -> Self {
        self.task
            .getargs
            .insert(param.to_string(), GetArg::new(task, value));
        self
    }

    pub fn no_default_run(mut self) -> Self {
        self.task.no_default_run = true;
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}
