#![allow(dead_code)]

use std::fs;
use std::path::Path;

use ripple::deps::MatchStrategy;
use ripple::errors::Result;
use ripple::reactive::Generator;
use ripple::task::Task;

/// Generator driven by a closure; regenerates by calling it again.
pub struct FnGenerator {
    id: String,
    patterns: Vec<(String, MatchStrategy)>,
    gen: Box<dyn FnMut() -> Vec<Task> + Send>,
}

impl FnGenerator {
    pub fn new(
        id: &str,
        patterns: Vec<(String, MatchStrategy)>,
        gen: impl FnMut() -> Vec<Task> + Send + 'static,
    ) -> Self {
        Self {
            id: id.to_string(),
            patterns,
            gen: Box::new(gen),
        }
    }
}

impl Generator for FnGenerator {
    fn id(&self) -> &str {
        &self.id
    }

    fn input_patterns(&self) -> Vec<(String, MatchStrategy)> {
        self.patterns.clone()
    }

    fn generate(&mut self) -> Result<Vec<Task>> {
        Ok((self.gen)())
    }
}

/// Write a file, creating parent directories as needed.
pub fn write_file(path: impl AsRef<Path>, content: &str) {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("creating parent dirs");
    }
    fs::write(path, content).expect("writing fixture file");
}
