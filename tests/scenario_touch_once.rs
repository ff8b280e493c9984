// tests/scenario_touch_once.rs

//! Single task with a file target and a constant-true uptodate condition:
//! first run executes and commits, second run is up-to-date.

mod common;

use std::fs;

use ripple::{Session, SessionConfig, TaskState};
use ripple::task::Uptodate;
use ripple_test_utils::TaskBuilder;
use tempfile::TempDir;

fn config(dir: &TempDir) -> SessionConfig {
    SessionConfig::default().with_state_file(dir.path().join("state.json"))
}

#[tokio::test]
async fn touch_once() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("out.txt");

    let make_task = |target: std::path::PathBuf| {
        TaskBuilder::new("touch")
            .uptodate(Uptodate::Constant(true))
            .file_target(&target)
            .action("write-target", move |_ctx| {
                fs::write(&target, "touched")?;
                Ok(None)
            })
            .build()
    };

    // Run 1: target absent, action runs, record committed.
    let mut session = Session::new(config(&dir)).unwrap();
    session.add_task(make_task(target.clone())).unwrap();
    let report = session.run().await.unwrap();

    assert!(report.converged);
    assert_eq!(report.executed, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(session.task_state("touch"), Some(TaskState::Done));
    assert!(target.exists());

    // Run 2: target present, record unchanged, task skipped.
    let mut session = Session::new(config(&dir)).unwrap();
    session.add_task(make_task(target.clone())).unwrap();
    let report = session.run().await.unwrap();

    assert!(report.converged);
    assert_eq!(report.executed, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(session.task_state("touch"), Some(TaskState::Skipped));
    assert_eq!(report.exit_code(), 0);
}
