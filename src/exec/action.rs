// src/exec/action.rs

//! Running a single action: shell strings and callables.

use tokio::process::Command;
use tracing::debug;

use crate::deps::ValueMap;
use crate::errors::Result;
use crate::task::{Action, ActionCtx};

/// Outcome of one action.
#[derive(Debug)]
pub enum ActionOutcome {
    /// The action succeeded, optionally returning values to save.
    Success(Option<ValueMap>),
    /// The action failed; the task stops here.
    Failure(String),
}

/// Execute one action to completion.
///
/// Shell strings run through the platform shell with captured output;
/// a non-zero exit status is a failure. Callables fail on error.
pub async fn run_action(action: &Action, ctx: &ActionCtx<'_>) -> ActionOutcome {
    match action {
        Action::Shell(cmd) => run_shell_action(ctx.task, cmd).await,
        Action::Func { name, call } => {
            debug!(task = %ctx.task, action = %name, "running callable action");
            match call(ctx) {
                Ok(values) => ActionOutcome::Success(values),
                Err(e) => ActionOutcome::Failure(format!("action '{name}' failed: {e:#}")),
            }
        }
    }
}

async fn run_shell_action(task: &str, cmd: &str) -> ActionOutcome {
    debug!(task = %task, cmd = %cmd, "running shell action");

    let mut command = shell_command(cmd);
    command
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());

    let output = match command.output().await {
        Ok(out) => out,
        Err(e) => {
            return ActionOutcome::Failure(format!("spawning '{cmd}': {e}"));
        }
    };

    if !output.stdout.is_empty() {
        debug!(task = %task, "stdout: {}", String::from_utf8_lossy(&output.stdout).trim_end());
    }
    if !output.stderr.is_empty() {
        debug!(task = %task, "stderr: {}", String::from_utf8_lossy(&output.stderr).trim_end());
    }

    if output.status.success() {
        ActionOutcome::Success(None)
    } else {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        ActionOutcome::Failure(format!(
            "'{cmd}' exited with code {code}: {}",
            stderr.trim_end()
        ))
    }
}

/// Run a shell command and report whether it exited zero.
///
/// Used by shell-string up-to-date conditions; a spawn failure is an error,
/// a non-zero exit is a plain `false`.
pub async fn run_shell_status(cmd: &str) -> Result<bool> {
    let mut command = shell_command(cmd);
    command
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    let status = command.status().await?;
    Ok(status.success())
}

/// Build a platform shell invocation for a command string.
fn shell_command(cmd: &str) -> Command {
    let mut c = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };
    c.stdin(std::process::Stdio::null());
    c.kill_on_drop(true);
    c
}
