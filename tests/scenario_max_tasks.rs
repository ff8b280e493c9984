// tests/scenario_max_tasks.rs

//! Safety bound: a generator that keeps producing tasks whose outputs
//! match its own input pattern is stopped at `max_tasks`.

mod common;

use std::fs;
use std::path::Path;

use ripple::deps::MatchStrategy;
use ripple::{Session, SessionConfig};
use ripple_test_utils::{FnGenerator, TaskBuilder};
use tempfile::TempDir;

/// Emits one task per regeneration: the task writes the next link of the
/// chain, which matches the generator's own input pattern.
fn self_feeding_generator(root: &Path) -> FnGenerator {
    let chain = root.join("chain");
    let pattern = format!("{}/", chain.display());

    FnGenerator::new("ouroboros", vec![(pattern, MatchStrategy::Prefix)], move || {
        let existing = fs::read_dir(&chain)
            .map(|entries| entries.count())
            .unwrap_or(0);
        let next = existing + 1;
        let link = chain.join(format!("{next}.link"));
        let chain_dir = chain.clone();
        vec![TaskBuilder::new(&format!("link:{next}"))
            .file_target(&link)
            .action("forge-link", move |_ctx| {
                fs::create_dir_all(&chain_dir)?;
                fs::write(chain_dir.join(format!("{next}.link")), next.to_string())?;
                Ok(None)
            })
            .build()]
    })
}

#[tokio::test]
async fn admission_bound_stops_the_feedback_loop() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();

    let config = SessionConfig::default()
        .with_state_file(dir.path().join("state.json"))
        .with_max_tasks(5);

    let mut session = Session::new(config).unwrap();
    session.add_generator(self_feeding_generator(dir.path()));
    let report = session.run().await.unwrap();

    assert!(report.hit_limit);
    assert!(!report.converged);
    assert_eq!(report.total_tasks, 5);
    assert_eq!(report.executed, 5);
    assert_eq!(report.exit_code(), 1);

    // The store stayed consistent: one record per executed task.
    use ripple::store::StateStore;
    let store =
        ripple::store::FileStateStore::open(dir.path().join("state.json")).unwrap();
    for i in 1..=5 {
        assert!(store.load(&format!("link:{i}")).unwrap().is_some());
    }
}
