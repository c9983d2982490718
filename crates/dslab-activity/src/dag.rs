//! Task graph.

use std::collections::VecDeque;

use crate::error::{ActivityError, Result};
use crate::file::File;
use crate::task::Task;

/// Directed acyclic graph of tasks linked by producer/consumer file relationships.
///
/// Tasks and files are identified by their insertion index. The graph is immutable once built:
/// the execution state of tasks is tracked separately by [`ReadinessTracker`](crate::readiness::ReadinessTracker).
#[derive(Clone, Debug, Default)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    files: Vec<File>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task and returns its id.
    pub fn add_task(
        &mut self,
        name: &str,
        flops: f64,
        memory: u64,
        min_cores: u32,
        max_cores: u32,
        efficiency: f64,
    ) -> usize {
        self.tasks
            .push(Task::new(name, flops, memory, min_cores, max_cores, efficiency));
        self.tasks.len() - 1
    }

    /// Adds a file which is pre-staged on the storage and returns its id.
    pub fn add_file(&mut self, name: &str, size: f64) -> usize {
        self.files.push(File::new(name, size, None));
        self.files.len() - 1
    }

    /// Adds a file produced by the given task and returns its id.
    pub fn add_task_output(&mut self, producer: usize, name: &str, size: f64) -> usize {
        self.files.push(File::new(name, size, Some(producer)));
        let file_id = self.files.len() - 1;
        self.tasks[producer].outputs.push(file_id);
        file_id
    }

    /// Makes the file an input of the given task. Repeated calls for the same pair are ignored.
    pub fn add_data_dependency(&mut self, file_id: usize, consumer: usize) {
        if self.tasks[consumer].inputs.contains(&file_id) {
            return;
        }
        self.files[file_id].consumers.push(consumer);
        self.tasks[consumer].inputs.push(file_id);
    }

    pub fn get_task(&self, task_id: usize) -> &Task {
        &self.tasks[task_id]
    }

    pub fn get_tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get_file(&self, file_id: usize) -> &File {
        &self.files[file_id]
    }

    pub fn get_files(&self) -> &[File] {
        &self.files
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Ids of files available before the execution starts.
    pub fn prestaged_files(&self) -> impl Iterator<Item = usize> + '_ {
        self.files
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_prestaged())
            .map(|(id, _)| id)
    }

    /// Total size of task inputs in bytes.
    pub fn input_size(&self, task_id: usize) -> f64 {
        self.tasks[task_id].inputs.iter().map(|&f| self.files[f].size).sum()
    }

    /// Total size of task outputs in bytes.
    pub fn output_size(&self, task_id: usize) -> f64 {
        self.tasks[task_id].outputs.iter().map(|&f| self.files[f].size).sum()
    }

    /// Total I/O volume of the task (inputs plus outputs) in bytes.
    pub fn total_io(&self, task_id: usize) -> f64 {
        self.input_size(task_id) + self.output_size(task_id)
    }

    /// Returns true if every input of the task satisfies `is_available`.
    pub fn dependencies_satisfied<F>(&self, task_id: usize, is_available: F) -> bool
    where
        F: Fn(usize) -> bool,
    {
        self.tasks[task_id].inputs.iter().all(|&f| is_available(f))
    }

    /// Checks that the graph is non-empty, tasks are well-formed and there are no dependency cycles.
    pub fn validate(&self) -> Result<()> {
        if self.tasks.is_empty() {
            return Err(ActivityError::EmptyWorkload);
        }
        for task in self.tasks.iter() {
            if !(task.flops.is_finite() && task.flops >= 0.) {
                return Err(ActivityError::InvalidGraph(format!(
                    "task {} has invalid flops {}",
                    task.name, task.flops
                )));
            }
            if task.min_cores == 0 || task.min_cores > task.max_cores {
                return Err(ActivityError::InvalidGraph(format!(
                    "task {} has invalid cores range {}..{}",
                    task.name, task.min_cores, task.max_cores
                )));
            }
            if !(0. ..=1.).contains(&task.efficiency) {
                return Err(ActivityError::InvalidGraph(format!(
                    "task {} has parallel efficiency {} outside of [0, 1]",
                    task.name, task.efficiency
                )));
            }
        }
        for file in self.files.iter() {
            if !(file.size.is_finite() && file.size >= 0.) {
                return Err(ActivityError::InvalidGraph(format!(
                    "file {} has invalid size {}",
                    file.name, file.size
                )));
            }
        }

        // Kahn's algorithm over producer -> consumer edges
        let mut pending_inputs: Vec<usize> = self
            .tasks
            .iter()
            .map(|t| t.inputs.iter().filter(|&&f| !self.files[f].is_prestaged()).count())
            .collect();
        let mut queue: VecDeque<usize> = (0..self.tasks.len()).filter(|&t| pending_inputs[t] == 0).collect();
        let mut visited = 0;
        while let Some(task_id) = queue.pop_front() {
            visited += 1;
            for &file_id in self.tasks[task_id].outputs.iter() {
                for &consumer in self.files[file_id].consumers.iter() {
                    pending_inputs[consumer] -= 1;
                    if pending_inputs[consumer] == 0 {
                        queue.push_back(consumer);
                    }
                }
            }
        }
        if visited != self.tasks.len() {
            let stuck = (0..self.tasks.len())
                .filter(|&t| pending_inputs[t] > 0)
                .map(|t| self.tasks[t].name.as_str())
                .collect::<Vec<_>>();
            return Err(ActivityError::InvalidGraph(format!(
                "dependency cycle involving tasks {}",
                stuck.join(", ")
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::TaskGraph;
    use crate::error::ActivityError;

    #[test]
    fn io_volume_sums_inputs_and_outputs() {
        let mut dag = TaskGraph::new();
        let a = dag.add_task("a", 10., 0, 1, 1, 1.);
        let b = dag.add_task("b", 20., 0, 1, 1, 1.);
        let input = dag.add_file("in", 5.);
        dag.add_data_dependency(input, a);
        dag.add_data_dependency(input, a);
        let out = dag.add_task_output(a, "out", 7.);
        dag.add_data_dependency(out, b);
        assert_eq!(dag.get_task(a).inputs, vec![input]);
        assert_eq!(dag.total_io(a), 12.);
        assert_eq!(dag.total_io(b), 7.);
        assert_eq!(dag.prestaged_files().collect::<Vec<_>>(), vec![input]);
        assert!(dag.dependencies_satisfied(b, |f| f == out));
        assert!(!dag.dependencies_satisfied(b, |_| false));
        assert!(dag.validate().is_ok());
    }

    #[test]
    fn cycles_are_rejected() {
        let mut dag = TaskGraph::new();
        let a = dag.add_task("a", 1., 0, 1, 1, 1.);
        let b = dag.add_task("b", 1., 0, 1, 1, 1.);
        let ab = dag.add_task_output(a, "ab", 1.);
        let ba = dag.add_task_output(b, "ba", 1.);
        dag.add_data_dependency(ab, b);
        dag.add_data_dependency(ba, a);
        assert!(matches!(dag.validate(), Err(ActivityError::InvalidGraph(_))));
    }

    #[test]
    fn empty_graph_is_rejected() {
        assert!(matches!(TaskGraph::new().validate(), Err(ActivityError::EmptyWorkload)));
    }
}
