// tests/scenario_cascade.rs

//! Two-stage cascade: stage 1 extracts files under a prefix target, a
//! stage-2 generator produces one task per extracted file once the keys
//! are published. Fixed point is reached with at least one regeneration.

mod common;

use std::fs;
use std::path::{Path, PathBuf};

use ripple::deps::MatchStrategy;
use ripple::{Session, SessionConfig, TaskState};
use ripple_test_utils::{write_file, FnGenerator, TaskBuilder};
use tempfile::TempDir;

fn stage2_generator(root: &Path) -> FnGenerator {
    let extracted = root.join("extracted");
    let processed = root.join("processed");
    let pattern = format!("{}/", extracted.display());

    FnGenerator::new("stage2", vec![(pattern, MatchStrategy::Prefix)], move || {
        let mut tasks = Vec::new();
        let Ok(entries) = fs::read_dir(&extracted) else {
            return tasks;
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
            .collect();
        files.sort();

        for file in files {
            let stem = file.file_stem().unwrap().to_string_lossy().to_string();
            let out = processed.join(format!("{stem}.out"));
            let file_for_action = file.clone();
            let out_for_action = out.clone();
            tasks.push(
                TaskBuilder::new(&format!("process:{stem}"))
                    .file_dep(&file)
                    .file_target(&out)
                    .action("process", move |_ctx| {
                        fs::create_dir_all(out_for_action.parent().unwrap())?;
                        let text = fs::read_to_string(&file_for_action)?;
                        fs::write(&out_for_action, text.to_uppercase())?;
                        Ok(None)
                    })
                    .build(),
            );
        }
        tasks
    })
}

#[tokio::test]
async fn cascade_reaches_fixed_point() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("input.zip");
    write_file(&archive, "one=hello\ntwo=world\n");

    let extracted = dir.path().join("extracted");
    let extract_archive = archive.clone();
    let extract_dir = extracted.clone();
    let extract = TaskBuilder::new("extract")
        .file_dep(&archive)
        .dir_target(&extracted)
        .action("unpack", move |_ctx| {
            fs::create_dir_all(&extract_dir)?;
            for line in fs::read_to_string(&extract_archive)?.lines() {
                if let Some((name, content)) = line.split_once('=') {
                    fs::write(extract_dir.join(format!("{name}.txt")), content)?;
                }
            }
            Ok(None)
        })
        .build();

    let mut session = Session::new(
        SessionConfig::default().with_state_file(dir.path().join("state.json")),
    )
    .unwrap();
    session.add_task(extract).unwrap();
    session.add_generator(stage2_generator(dir.path()));

    let report = session.run().await.unwrap();

    assert!(report.converged);
    assert!(report.regenerations >= 1);
    assert_eq!(report.total_tasks, 3);
    assert_eq!(report.executed, 3);
    assert_eq!(session.task_state("process:one"), Some(TaskState::Done));
    assert_eq!(session.task_state("process:two"), Some(TaskState::Done));
    assert_eq!(
        fs::read_to_string(dir.path().join("processed/one.out")).unwrap(),
        "HELLO"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("processed/two.out")).unwrap(),
        "WORLD"
    );
}
