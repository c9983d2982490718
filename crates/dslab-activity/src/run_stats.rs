use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Contains metrics collected from a simulation run.
#[derive(Serialize, Deserialize, Clone, Default, Debug)]
pub struct RunStats {
    /// Completion time of the last task.
    pub makespan: f64,
    /// Total time from dispatch to completion over all tasks (in seconds).
    pub total_task_time: f64,
    /// Total amount of data moved between the storage and the resources (in bytes).
    pub total_transferred: f64,
    /// Total time tasks spent on staging data in and out (in seconds).
    pub total_transfer_time: f64,
    /// Total time tasks spent on computations (in seconds).
    pub total_compute_time: f64,
    /// The number of resources on which at least one task has been executed.
    pub used_resource_count: usize,
    /// Maximum number of cores used at once.
    pub max_used_cores: u32,
    /// Maximum amount of memory used at once.
    pub max_used_memory: u64,
    /// Completion time of each task by task name.
    pub completion_times: IndexMap<String, f64>,

    #[serde(skip)]
    task_starts: HashMap<usize, (u32, u64, f64)>,
    #[serde(skip)]
    current_cores: u32,
    #[serde(skip)]
    current_memory: u64,
    #[serde(skip)]
    used_resources: HashSet<usize>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_task_start(&mut self, task: usize, resource: usize, cores: u32, memory: u64, time: f64) {
        self.current_cores += cores;
        self.max_used_cores = self.max_used_cores.max(self.current_cores);
        self.current_memory += memory;
        self.max_used_memory = self.max_used_memory.max(self.current_memory);
        self.task_starts.insert(task, (cores, memory, time));
        self.used_resources.insert(resource);
        self.used_resource_count = self.used_resources.len();
    }

    pub fn set_task_finish(&mut self, task: usize, name: &str, time: f64) {
        if let Some((cores, memory, start_time)) = self.task_starts.remove(&task) {
            self.current_cores -= cores;
            self.current_memory -= memory;
            self.total_task_time += time - start_time;
        }
        self.completion_times.insert(name.to_string(), time);
        self.makespan = self.makespan.max(time);
    }

    pub fn add_transfers(&mut self, bytes: f64, time: f64) {
        self.total_transferred += bytes;
        self.total_transfer_time += time;
    }

    pub fn add_compute_time(&mut self, time: f64) {
        self.total_compute_time += time;
    }

    /// Returns true if no task is running.
    pub fn is_idle(&self) -> bool {
        self.task_starts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::RunStats;

    #[test]
    fn tracks_peaks_and_completion_times() {
        let mut stats = RunStats::new();
        stats.set_task_start(0, 0, 2, 100, 0.);
        stats.set_task_start(1, 1, 1, 50, 1.);
        stats.set_task_finish(0, "a", 4.);
        stats.set_task_start(2, 0, 1, 10, 4.);
        stats.set_task_finish(1, "b", 5.);
        stats.set_task_finish(2, "c", 6.);
        stats.add_transfers(10., 0.5);
        assert_eq!(stats.max_used_cores, 3);
        assert_eq!(stats.max_used_memory, 150);
        assert_eq!(stats.used_resource_count, 2);
        assert_eq!(stats.total_task_time, 10.);
        assert_eq!(stats.makespan, 6.);
        assert_eq!(stats.completion_times.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert!(stats.is_idle());
    }
}
