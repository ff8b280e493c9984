// src/reactive/mod.rs

//! Reactive fixed-point controller.
//!
//! A [`Session`] owns everything a run needs: admitted tasks, scheduling
//! state, the match and generator indexes, the state store and the
//! published-key queue. `run` drives generators and the executor until no
//! generator produces new or changed tasks (converged) or the admission
//! bound is hit.

pub mod generator;
pub mod merger;

pub use generator::Generator;
pub use merger::{MergeDecision, MergeStats, TaskMerger};

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::dag::{validate_batch, Scheduler, TaskTable};
use crate::deps::ValueMap;
use crate::errors::{Result, RippleError};
use crate::exec::runner::run_teardowns;
use crate::exec::{CancelToken, TaskRunner};
use crate::matching::{GeneratorIndex, MatchIndex};
use crate::store::{FileStateStore, StateStore};
use crate::task::{FailCause, Task, TaskState, Uptodate, UptodatePredicate};
use crate::uptodate::{ResultDep, ValueSaver};

/// Outcome of one session.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Tasks that executed their actions (groups count once completed).
    pub executed: usize,
    /// Tasks skipped as up-to-date (or never demanded).
    pub skipped: usize,
    /// Tasks that ended FAILED, for any cause.
    pub failed: usize,
    /// Total admitted tasks.
    pub total_tasks: usize,
    /// Affected-generator invocations after the initial generation.
    pub regenerations: usize,
    /// The admission bound was hit; the controller stopped early.
    pub hit_limit: bool,
    /// A full pass produced no new or changed tasks.
    pub converged: bool,
}

impl RunReport {
    /// Session succeeded: converged with no failed task.
    pub fn success(&self) -> bool {
        self.converged && self.failed == 0
    }

    /// Exit-code semantics for an outer driver: zero iff [`Self::success`].
    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }
}

/// One top-level invocation of the reactive loop over a single state store.
pub struct Session {
    config: SessionConfig,
    store: Box<dyn StateStore>,
    table: TaskTable,
    sched: Scheduler,
    index: MatchIndex,
    gen_index: GeneratorIndex,
    generators: Vec<Box<dyn Generator>>,
    merger: TaskMerger,
    session_values: HashMap<String, ValueMap>,
    pending_savers: HashMap<String, Vec<ValueSaver>>,
    decided: HashSet<String>,
    waiting_setup: HashSet<String>,
    published: VecDeque<String>,
    teardown_stack: Vec<String>,
    regenerations: usize,
    hit_limit: bool,
    cancel: CancelToken,
}

impl Session {
    /// Open a session over the configured state file.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let store = FileStateStore::open(config.state_file.clone())?;
        Ok(Self::with_store(config, Box::new(store)))
    }

    /// Open a session over an explicit store backend.
    pub fn with_store(config: SessionConfig, store: Box<dyn StateStore>) -> Self {
        Self {
            config,
            store,
            table: TaskTable::new(),
            sched: Scheduler::new(),
            index: MatchIndex::new(),
            gen_index: GeneratorIndex::new(),
            generators: Vec::new(),
            merger: TaskMerger::new(),
            session_values: HashMap::new(),
            pending_savers: HashMap::new(),
            decided: HashSet::new(),
            waiting_setup: HashSet::new(),
            published: VecDeque::new(),
            teardown_stack: Vec::new(),
            regenerations: 0,
            hit_limit: false,
            cancel: CancelToken::new(),
        }
    }

    /// Handle for cooperative cancellation; checked at action boundaries.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Register a generator and its input patterns.
    pub fn add_generator(&mut self, gen: impl Generator + 'static) {
        for (pattern, strategy) in gen.input_patterns() {
            self.gen_index.register_pattern(&pattern, strategy, gen.id());
        }
        self.generators.push(Box::new(gen));
    }

    /// Admit a statically declared task.
    ///
    /// Duplicate names are a fatal configuration error; generator-produced
    /// tasks go through the merger instead.
    pub fn add_task(&mut self, task: Task) -> Result<()> {
        if self.table.contains(&task.name) {
            return Err(RippleError::DuplicateTask(task.name));
        }
        if self.table.len() >= self.config.max_tasks {
            return Err(RippleError::Config(format!(
                "cannot admit task '{}': max_tasks ({}) reached",
                task.name, self.config.max_tasks
            )));
        }

        let mut task = task;
        self.prepare_task(&mut task);
        self.register_targets(&task)?;
        self.merger.record(&task);
        self.sched.admit(&task.name);
        self.table.upsert(task);
        Ok(())
    }

    /// State of an admitted task, for inspection after a run.
    pub fn task_state(&self, name: &str) -> Option<TaskState> {
        self.sched.state(name)
    }

    /// Run the reactive loop to fixed point.
    pub async fn run(&mut self) -> Result<RunReport> {
        // Statically added tasks are validated before anything executes.
        validate_batch(&self.table)?;
        self.sched.recompute_demand(&self.table, &self.index);

        // Initial generation from every generator.
        for i in 0..self.generators.len() {
            if self.hit_limit {
                break;
            }
            let batch = self.generators[i].generate()?;
            self.admit_batch(batch)?;
        }

        let mut converged = false;
        while !self.hit_limit {
            self.drive_executor().await?;

            if self.cancel.is_cancelled() {
                break;
            }
            if self.published.is_empty() {
                converged = true;
                break;
            }

            // Drain published keys and regenerate every affected generator,
            // de-duplicated within this step.
            let keys: Vec<String> = self.published.drain(..).collect();
            let mut affected: Vec<String> = Vec::new();
            for key in &keys {
                for id in self.gen_index.affected(key) {
                    if !affected.contains(&id) {
                        affected.push(id);
                    }
                }
            }
            debug!(
                published = keys.len(),
                affected = affected.len(),
                "drained published target keys"
            );

            for id in affected {
                if self.hit_limit {
                    break;
                }
                let Some(pos) = self.generators.iter().position(|g| g.id() == id) else {
                    continue;
                };
                self.regenerations += 1;
                let batch = self.generators[pos].generate()?;
                let stats = self.admit_batch(batch)?;
                if stats.has_changes() {
                    debug!(
                        generator = %id,
                        added = stats.added,
                        updated = stats.updated,
                        "regeneration produced work"
                    );
                }
            }
        }

        self.finish_residue(converged);
        run_teardowns(&self.table, &self.teardown_stack).await;

        let (executed, skipped, failed) = self.sched.outcome_counts();
        let report = RunReport {
            executed,
            skipped,
            failed,
            total_tasks: self.table.len(),
            regenerations: self.regenerations,
            hit_limit: self.hit_limit,
            converged,
        };
        info!(
            executed = report.executed,
            skipped = report.skipped,
            failed = report.failed,
            total = report.total_tasks,
            regenerations = report.regenerations,
            converged = report.converged,
            hit_limit = report.hit_limit,
            "session finished"
        );
        Ok(report)
    }

    /// Run tasks until nothing is runnable.
    async fn drive_executor(&mut self) -> Result<()> {
        loop {
            if self.cancel.is_cancelled() {
                warn!("cancellation requested; no further tasks will start");
                break;
            }
            let Some(name) = self.pick_runnable() else {
                break;
            };
            let mut runner = TaskRunner {
                table: &self.table,
                sched: &mut self.sched,
                index: &self.index,
                store: &mut *self.store,
                session_values: &mut self.session_values,
                pending_savers: &mut self.pending_savers,
                decided: &mut self.decided,
                waiting_setup: &mut self.waiting_setup,
                published: &mut self.published,
                teardown_stack: &mut self.teardown_stack,
                cancel: &self.cancel,
            };
            runner.run_task(&name).await?;
        }
        Ok(())
    }

    /// Next task to occupy the executor: parked tasks whose setup tasks
    /// have finished take precedence, then the first ready PENDING task in
    /// admission order.
    fn pick_runnable(&mut self) -> Option<String> {
        for name in self.table.order() {
            if !self.waiting_setup.contains(name) {
                continue;
            }
            let Some(task) = self.table.get(name) else {
                continue;
            };
            let setups_done = task
                .setup
                .iter()
                .all(|s| self.sched.state(s).is_some_and(|st| st.is_terminal()));
            if setups_done {
                return Some(name.clone());
            }
        }

        self.sched
            .next_ready(&self.table, &self.index, &self.waiting_setup)
    }

    /// Merge one generator batch into the admitted set.
    fn admit_batch(&mut self, batch: Vec<Task>) -> Result<MergeStats> {
        let mut stats = MergeStats::default();

        for mut task in batch {
            if self.hit_limit {
                break;
            }
            self.prepare_task(&mut task);

            match self.merger.classify(&task, self.sched.state(&task.name)) {
                MergeDecision::Add => {
                    if self.table.len() >= self.config.max_tasks {
                        warn!(
                            max_tasks = self.config.max_tasks,
                            task = %task.name,
                            "admission bound reached; stopping the controller"
                        );
                        self.hit_limit = true;
                        break;
                    }
                    self.register_targets(&task)?;
                    self.merger.record(&task);
                    self.sched.admit(&task.name);
                    self.table.upsert(task);
                    stats.added += 1;
                }
                MergeDecision::Skip => stats.skipped += 1,
                MergeDecision::Update => {
                    info!(task = %task.name, "regenerated task changed; replacing and re-queueing");
                    self.register_targets(&task)?;
                    self.merger.record(&task);
                    self.decided.remove(&task.name);
                    self.pending_savers.remove(&task.name);
                    self.waiting_setup.remove(&task.name);
                    self.sched.admit(&task.name);
                    self.table.upsert(task);
                    stats.updated += 1;
                }
                MergeDecision::Conflict => {
                    warn!(
                        task = %task.name,
                        "regenerated task diverges from one that already ran; keeping the admitted task"
                    );
                    stats.conflicts.push(task.name.clone());
                }
            }
        }

        validate_batch(&self.table)?;
        self.sched.recompute_demand(&self.table, &self.index);
        Ok(stats)
    }

    /// Admission-time task preparation: getargs expand into result-tracking
    /// setup predicates, then every predicate's `configure_task` hook runs.
    /// That hook is the single supported post-admission mutation.
    fn prepare_task(&self, task: &mut Task) {
        let mut producers: Vec<String> = task
            .getargs
            .values()
            .map(|g| g.task.clone())
            .collect();
        producers.sort();
        producers.dedup();
        for producer in producers {
            if !task.setup.iter().any(|s| s == &producer) {
                task.uptodate
                    .push(Uptodate::check(ResultDep::as_setup(producer)));
            }
        }

        let predicates: Vec<Arc<dyn UptodatePredicate>> = task
            .uptodate
            .iter()
            .filter_map(|u| match u {
                Uptodate::Check(p) => Some(Arc::clone(p)),
                _ => None,
            })
            .collect();
        for predicate in predicates {
            predicate.configure_task(task);
        }
    }

    fn register_targets(&mut self, task: &Task) -> Result<()> {
        for target in &task.targets {
            self.index.register_target(target, &task.name)?;
        }
        Ok(())
    }

    /// Close out tasks that never reached a terminal state.
    fn finish_residue(&mut self, converged: bool) {
        let names: Vec<String> = self.table.order().to_vec();
        for name in names {
            let Some(state) = self.sched.state(&name) else {
                continue;
            };
            if state.is_terminal() {
                continue;
            }
            if !self.sched.is_demanded(&name) {
                debug!(task = %name, "not demanded this session; skipping");
                self.sched.set_state(&name, TaskState::Skipped);
            } else if converged {
                warn!(task = %name, "never became runnable; unsatisfiable dependencies");
                self.sched
                    .set_state(&name, TaskState::Failed(FailCause::Unsatisfiable));
            }
            // After hit_limit or cancellation the leftover tasks simply did
            // not get a turn; the report is already non-converged.
        }
    }
}
