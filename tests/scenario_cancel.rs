// tests/scenario_cancel.rs

//! Cooperative cancellation: the running task fails at the next action
//! boundary, no further tasks start, teardowns of DONE tasks still run.

mod common;

use std::sync::{Arc, Mutex};

use ripple::task::{Action, FailCause};
use ripple::{Session, SessionConfig, TaskState};
use ripple_test_utils::TaskBuilder;
use tempfile::TempDir;

type Log = Arc<Mutex<Vec<String>>>;

#[tokio::test]
async fn cancellation_stops_at_an_action_boundary() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let mut session = Session::new(
        SessionConfig::default().with_state_file(dir.path().join("state.json")),
    )
    .unwrap();
    let token = session.cancel_token();

    // Finishes before the cancellation and carries a teardown.
    let log_done = log.clone();
    let mut done_first = TaskBuilder::new("done-first")
        .action("work", move |_ctx| {
            log_done.lock().unwrap().push("done-first".into());
            Ok(None)
        })
        .build();
    let log_teardown = log.clone();
    done_first.teardown.push(Action::func("cleanup", move |_ctx| {
        log_teardown.lock().unwrap().push("teardown".into());
        Ok(None)
    }));

    // First action requests cancellation; the second must never run.
    let cancel_token = token.clone();
    let log_first = log.clone();
    let log_second = log.clone();
    let interrupted = TaskBuilder::new("interrupted")
        .action("request-cancel", move |_ctx| {
            log_first.lock().unwrap().push("action-1".into());
            cancel_token.cancel();
            Ok(None)
        })
        .action("never-runs", move |_ctx| {
            log_second.lock().unwrap().push("action-2".into());
            Ok(None)
        })
        .build();

    // Admitted after the cancelling task; must never start.
    let log_late = log.clone();
    let late = TaskBuilder::new("late")
        .action("late-work", move |_ctx| {
            log_late.lock().unwrap().push("late".into());
            Ok(None)
        })
        .build();

    session.add_task(done_first).unwrap();
    session.add_task(interrupted).unwrap();
    session.add_task(late).unwrap();
    let report = session.run().await.unwrap();

    assert_eq!(session.task_state("done-first"), Some(TaskState::Done));
    assert_eq!(
        session.task_state("interrupted"),
        Some(TaskState::Failed(FailCause::Cancelled))
    );
    // Never started.
    assert_eq!(session.task_state("late"), Some(TaskState::Pending));

    assert!(!report.converged);
    assert_eq!(report.exit_code(), 1);

    let entries = log.lock().unwrap().clone();
    assert_eq!(entries, ["done-first", "action-1", "teardown"]);
}
