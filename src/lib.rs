// src/lib.rs

//! `ripple` is a reactive, incremental task automation engine.
//!
//! Tasks declare typed dependencies and targets. The engine executes them
//! in dependency order, skips tasks whose persisted witnesses prove they
//! are up-to-date, threads saved values between tasks, and re-invokes
//! generators as new target keys are published until no new work appears.
//!
//! Typical use:
//!
//! ```no_run
//! use ripple::{Session, SessionConfig, Task};
//! use ripple::deps::{Dep, FileDep, Target, FileTarget};
//! use ripple::task::Action;
//!
//! # async fn demo() -> ripple::Result<()> {
//! let mut session = Session::new(SessionConfig::default())?;
//!
//! let mut compile = Task::new("compile");
//! compile.deps.push(Dep::File(FileDep::new("src/main.c")));
//! compile.targets.push(Target::File(FileTarget::new("build/main.o")));
//! compile.actions.push(Action::shell("cc -c src/main.c -o build/main.o"));
//! session.add_task(compile)?;
//!
//! let report = session.run().await?;
//! std::process::exit(report.exit_code());
//! # }
//! ```

pub mod config;
pub mod dag;
pub mod deps;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod matching;
pub mod reactive;
pub mod store;
pub mod task;
pub mod uptodate;

pub use config::SessionConfig;
pub use errors::{Result, RippleError};
pub use reactive::{Generator, RunReport, Session};
pub use task::{Action, GetArg, Task, TaskState};
