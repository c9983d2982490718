//! Workflow task.

use enum_iterator::IntoEnumIterator;
use serde::Serialize;

/// Represents a task state.
#[derive(Eq, PartialEq, Copy, Clone, Debug, Serialize, IntoEnumIterator)]
pub enum TaskState {
    /// Waiting for some of its input files.
    NotReady,
    /// All input files are available, waiting to be dispatched.
    Ready,
    /// Dispatched to a resource.
    Running,
    /// Finished, outputs are stored.
    Completed,
}

/// Represents a workflow task.
///
/// Described by the amount of computations in flops, the minimum and maximum number of used cores,
/// the parallel efficiency and the amount of used memory.
/// Each task consumes and produces zero or more [files](crate::file::File).
#[derive(Clone, Debug, Serialize)]
pub struct Task {
    pub name: String,
    /// The amount of computations performed by this task in flops.
    pub flops: f64,
    /// Memory demand of this task in bytes.
    pub memory: u64,
    pub min_cores: u32,
    pub max_cores: u32,
    /// Fraction of an extra core's speed actually gained by running on it, in `[0, 1]`.
    pub efficiency: f64,
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
}

impl Task {
    pub(crate) fn new(name: &str, flops: f64, memory: u64, min_cores: u32, max_cores: u32, efficiency: f64) -> Self {
        Self {
            name: name.to_string(),
            flops,
            memory,
            min_cores,
            max_cores,
            efficiency,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Speedup achieved when running on the given number of cores.
    pub fn speedup(&self, cores: u32) -> f64 {
        1. + cores.saturating_sub(1) as f64 * self.efficiency
    }

    /// Number of cores allotted to the task on a resource with `free_cores` idle cores.
    pub fn cores_on(&self, free_cores: u32) -> u32 {
        free_cores.clamp(self.min_cores, self.max_cores)
    }
}

#[cfg(test)]
mod tests {
    use super::Task;

    #[test]
    fn speedup_follows_efficiency() {
        let task = Task::new("t", 100., 0, 1, 4, 0.5);
        assert_eq!(task.speedup(1), 1.);
        assert_eq!(task.speedup(3), 2.);
        assert_eq!(task.cores_on(8), 4);
        assert_eq!(task.cores_on(2), 2);
    }
}
