// src/dag/graph.rs

//! Admission-time validation of the task graph.

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::TaskTable;
use crate::errors::{Result, RippleError};

/// Validate the admitted task set after a merge batch.
///
/// Checks that every referenced task exists (setup lists, getargs
/// producers, explicit task dependencies) and that the combined
/// task-dep/setup/getargs edges form a DAG. All failures here are fatal
/// configuration errors, raised before any action of the batch runs.
pub fn validate_batch(table: &TaskTable) -> Result<()> {
    for task in table.iter_in_order() {
        for dep_name in task.task_dep_names() {
            if !table.contains(dep_name) {
                return Err(RippleError::Config(format!(
                    "task '{}' depends on unknown task '{}'",
                    task.name, dep_name
                )));
            }
        }

        for setup in &task.setup {
            if !table.contains(setup) {
                return Err(RippleError::Config(format!(
                    "task '{}' has unknown setup task '{}'",
                    task.name, setup
                )));
            }
            if setup == &task.name {
                return Err(RippleError::Config(format!(
                    "task '{}' cannot be its own setup task",
                    task.name
                )));
            }
        }

        for (param, getarg) in &task.getargs {
            if !table.contains(&getarg.task) {
                return Err(RippleError::Config(format!(
                    "task '{}' getargs '{}' references unknown task '{}'",
                    task.name, param, getarg.task
                )));
            }
        }
    }

    validate_acyclic(table)
}

/// Cycle check over the ordering edges.
///
/// Edge direction: dependency -> dependent, so a topological sort failing
/// pinpoints a cycle.
fn validate_acyclic(table: &TaskTable) -> Result<()> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for task in table.iter_in_order() {
        graph.add_node(task.name.as_str());
    }

    for task in table.iter_in_order() {
        for dep_name in task.task_dep_names() {
            graph.add_edge(dep_name, task.name.as_str(), ());
        }
        for setup in &task.setup {
            graph.add_edge(setup.as_str(), task.name.as_str(), ());
        }
        for getarg in task.getargs.values() {
            graph.add_edge(getarg.task.as_str(), task.name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(RippleError::GraphCycle(format!(
            "cycle involving task '{}'",
            cycle.node_id()
        ))),
    }
}
