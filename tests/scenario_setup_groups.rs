// tests/scenario_setup_groups.rs

//! Setup materialization, group collapse, the no-default-run flag, and
//! group-valued getargs.

mod common;

use std::sync::{Arc, Mutex};

use ripple::task::Action;
use ripple::{Session, SessionConfig, TaskState};
use ripple_test_utils::TaskBuilder;
use tempfile::TempDir;

type Log = Arc<Mutex<Vec<String>>>;

fn logging_action(log: Log, entry: &str) -> Action {
    let entry = entry.to_string();
    Action::func(format!("log-{entry}"), move |_ctx| {
        log.lock().unwrap().push(entry.clone());
        Ok(None)
    })
}

fn config(dir: &TempDir) -> SessionConfig {
    SessionConfig::default().with_state_file(dir.path().join("state.json"))
}

#[tokio::test]
async fn setup_runs_before_its_parent_and_only_once() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    // Both parents share the same setup task; it runs once.
    let mut first = TaskBuilder::new("first").setup("prep").build();
    first.actions.push(logging_action(log.clone(), "first"));
    let mut second = TaskBuilder::new("second").setup("prep").build();
    second.actions.push(logging_action(log.clone(), "second"));
    let mut prep = TaskBuilder::new("prep").build();
    prep.actions.push(logging_action(log.clone(), "prep"));

    let mut session = Session::new(config(&dir)).unwrap();
    session.add_task(first).unwrap();
    session.add_task(second).unwrap();
    session.add_task(prep).unwrap();
    let report = session.run().await.unwrap();

    assert!(report.converged);
    let entries = log.lock().unwrap().clone();
    assert_eq!(entries, ["prep", "first", "second"]);
}

#[tokio::test]
async fn unknown_setup_task_is_a_fatal_config_error() {
    let dir = TempDir::new().unwrap();
    let task = TaskBuilder::new("main")
        .setup("no-such-task")
        .action("noop", |_ctx| Ok(None))
        .build();

    let mut session = Session::new(config(&dir)).unwrap();
    session.add_task(task).unwrap();
    let err = session.run().await.unwrap_err();
    assert!(err.to_string().contains("unknown setup task"));
}

#[tokio::test]
async fn task_dep_cycle_is_a_fatal_config_error() {
    let dir = TempDir::new().unwrap();
    let a = TaskBuilder::new("a")
        .task_dep("b")
        .action("noop", |_ctx| Ok(None))
        .build();
    let b = TaskBuilder::new("b")
        .task_dep("a")
        .action("noop", |_ctx| Ok(None))
        .build();

    let mut session = Session::new(config(&dir)).unwrap();
    session.add_task(a).unwrap();
    session.add_task(b).unwrap();
    let err = session.run().await.unwrap_err();
    assert!(err.to_string().contains("Cycle"));
}

#[tokio::test]
async fn duplicate_task_names_are_rejected() {
    let dir = TempDir::new().unwrap();
    let mut session = Session::new(config(&dir)).unwrap();
    session
        .add_task(TaskBuilder::new("twin").action("noop", |_ctx| Ok(None)).build())
        .unwrap();
    let err = session
        .add_task(TaskBuilder::new("twin").action("noop", |_ctx| Ok(None)).build())
        .unwrap_err();
    assert!(err.to_string().contains("Duplicate task name"));
}

#[tokio::test]
async fn group_collapses_and_delivers_member_values() {
    let dir = TempDir::new().unwrap();
    let observed: Arc<Mutex<Option<serde_json::Value>>> = Arc::new(Mutex::new(None));

    let m1 = TaskBuilder::new("m1")
        .returns("emit", "v", serde_json::json!(1))
        .build();
    let m2 = TaskBuilder::new("m2")
        .returns("emit", "v", serde_json::json!(2))
        .build();

    // A group is a task with no actions; its task deps are its members.
    let group = TaskBuilder::new("grp").task_dep("m1").task_dep("m2").build();

    let observed_in_action = observed.clone();
    let consumer = TaskBuilder::new("consumer")
        .getarg("all", "grp", Some("v"))
        .action("observe", move |ctx| {
            *observed_in_action.lock().unwrap() = ctx.args.get("all").cloned();
            Ok(None)
        })
        .build();

    let mut session = Session::new(config(&dir)).unwrap();
    session.add_task(m1).unwrap();
    session.add_task(m2).unwrap();
    session.add_task(group).unwrap();
    session.add_task(consumer).unwrap();
    let report = session.run().await.unwrap();

    assert!(report.converged);
    assert_eq!(session.task_state("grp"), Some(TaskState::Done));
    assert_eq!(
        observed.lock().unwrap().clone(),
        Some(serde_json::json!({"m1": 1, "m2": 2}))
    );
}

#[tokio::test]
async fn no_default_run_group_is_left_alone_unless_demanded() {
    let dir = TempDir::new().unwrap();
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let hidden = TaskBuilder::new("hidden").no_default_run().build();
    let mut member = TaskBuilder::new("member").build();
    member.actions.push(logging_action(log.clone(), "member"));

    let mut session = Session::new(config(&dir)).unwrap();
    session.add_task(hidden).unwrap();
    session.add_task(member).unwrap();
    let report = session.run().await.unwrap();

    assert!(report.converged);
    assert_eq!(session.task_state("hidden"), Some(TaskState::Skipped));
    assert_eq!(session.task_state("member"), Some(TaskState::Done));
    assert_eq!(report.exit_code(), 0);

    // Demanded through a task dep: the group now completes.
    let log2: Log = Arc::new(Mutex::new(Vec::new()));
    let hidden = TaskBuilder::new("hidden").no_default_run().build();
    let mut wants_it = TaskBuilder::new("wants-it").task_dep("hidden").build();
    wants_it.actions.push(logging_action(log2.clone(), "wants-it"));

    let mut session = Session::new(
        SessionConfig::default().with_state_file(dir.path().join("state2.json")),
    )
    .unwrap();
    session.add_task(hidden).unwrap();
    session.add_task(wants_it).unwrap();
    session.run().await.unwrap();

    assert_eq!(session.task_state("hidden"), Some(TaskState::Done));
    assert_eq!(session.task_state("wants-it"), Some(TaskState::Done));
}
