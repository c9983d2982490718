//! Resource model.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{ActivityError, Result};
use crate::task::Task;

/// Scheduler-side view of a compute resource.
///
/// Described by the number of cores, their speed in flop/s, the amount of memory and the bandwidth
/// of the link to the storage. Tracks the cores and memory held by the tasks running on it.
#[derive(Clone, Debug, Serialize)]
pub struct Resource {
    pub name: String,
    /// Per-core processing rate in flop/s.
    pub speed: f64,
    pub cores: u32,
    pub memory: u64,
    /// Bandwidth of the link to the storage in bytes/s.
    pub bandwidth: f64,
    pub cores_available: u32,
    pub memory_available: u64,
    #[serde(skip)]
    running: BTreeMap<usize, (u32, u64)>,
}

impl Resource {
    pub fn new(name: &str, speed: f64, cores: u32, memory: u64, bandwidth: f64) -> Self {
        Self {
            name: name.to_string(),
            speed,
            cores,
            memory,
            bandwidth,
            cores_available: cores,
            memory_available: memory,
            running: BTreeMap::new(),
        }
    }

    /// Returns true if at least one core is free.
    pub fn is_idle(&self) -> bool {
        self.cores_available > 0
    }

    /// Returns true if the task fits into the currently free cores and memory.
    pub fn can_run(&self, task: &Task) -> bool {
        self.cores_available >= task.min_cores && self.memory_available >= task.memory
    }

    /// Returns true if the task fits into the resource when nothing else is running on it.
    pub fn can_ever_run(&self, task: &Task) -> bool {
        self.cores >= task.min_cores && self.memory >= task.memory
    }

    pub(crate) fn allocate(&mut self, task_id: usize, cores: u32, memory: u64) -> Result<()> {
        if cores > self.cores_available || memory > self.memory_available {
            return Err(ActivityError::InvariantViolation(format!(
                "resource {} has {} cores and {} bytes free, task {} needs {} cores and {} bytes",
                self.name, self.cores_available, self.memory_available, task_id, cores, memory
            )));
        }
        if self.running.contains_key(&task_id) {
            return Err(ActivityError::InvariantViolation(format!(
                "task {} is already running on {}",
                task_id, self.name
            )));
        }
        self.running.insert(task_id, (cores, memory));
        self.cores_available -= cores;
        self.memory_available -= memory;
        Ok(())
    }

    /// Frees the cores and memory held by the task and returns them.
    pub(crate) fn release(&mut self, task_id: usize) -> Result<(u32, u64)> {
        let (cores, memory) = self.running.remove(&task_id).ok_or_else(|| {
            ActivityError::InvariantViolation(format!("task {} is not running on {}", task_id, self.name))
        })?;
        self.cores_available += cores;
        self.memory_available += memory;
        Ok((cores, memory))
    }
}
