//! Workload generators.

use crate::config::{TaskSpec, GB, GFLOP, MAX_NUM_TASKS, MB};
use crate::dag::TaskGraph;
use crate::error::{ActivityError, Result};

/// Number of parallel tasks of the [fork-join](fork_join) workflow.
pub const FORK_JOIN_WIDTH: usize = 20;

/// Builds independent single-core tasks, each reading one pre-staged input and writing one output.
///
/// Task `i` is named `task<i>` and uses files `task<i>::0.in` and `task<i>::0.out`.
pub fn bag_of_tasks(specs: &[TaskSpec]) -> Result<TaskGraph> {
    if specs.is_empty() {
        return Err(ActivityError::EmptyWorkload);
    }
    if specs.len() > MAX_NUM_TASKS {
        return Err(ActivityError::invalid_parameter(
            "number of tasks",
            format!("{} tasks given, at most {} are allowed", specs.len(), MAX_NUM_TASKS),
        ));
    }
    let mut dag = TaskGraph::new();
    for (i, spec) in specs.iter().enumerate() {
        spec.validate()?;
        let name = format!("task{}", i);
        let task = dag.add_task(&name, spec.flops, 0, 1, 1, 1.);
        let input = dag.add_file(&format!("{}::0.in", name), spec.input * MB);
        dag.add_data_dependency(input, task);
        dag.add_task_output(task, &format!("{}::0.out", name), spec.output * MB);
    }
    Ok(dag)
}

/// Builds the fork-join workflow.
///
/// The `final` task (id 0, 1000 Gflop, 2 GB of memory) reads the outputs of [`FORK_JOIN_WIDTH`] tasks
/// `pre_<i>` (ids `1..=FORK_JOIN_WIDTH`, 1000 Gflop, 8 GB) and writes a 1 MB `output`.
/// Task `pre_<i>` reads a 50 MB `in_<i>` and writes a 50 MB `out_<i>`.
pub fn fork_join() -> TaskGraph {
    let mut dag = TaskGraph::new();
    let join = dag.add_task("final", 1000. * GFLOP, (2. * GB) as u64, 1, 1, 1.);
    for i in 1..=FORK_JOIN_WIDTH {
        let input = dag.add_file(&format!("in_{}", i), 50. * MB);
        let task = dag.add_task(&format!("pre_{}", i), 1000. * GFLOP, (8. * GB) as u64, 1, 1, 1.);
        dag.add_data_dependency(input, task);
        let output = dag.add_task_output(task, &format!("out_{}", i), 50. * MB);
        dag.add_data_dependency(output, join);
    }
    dag.add_task_output(join, "output", MB);
    dag
}
