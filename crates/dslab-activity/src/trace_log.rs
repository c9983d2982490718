//! Execution log.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use simcore::{log_debug, SimulationContext};

use crate::dag::TaskGraph;
use crate::resource::Resource;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TaskScheduled {
        time: f64,
        task_id: usize,
        task_name: String,
        location: String,
        cores: u32,
        memory: u64,
    },
    TaskCompleted {
        time: f64,
        task_id: usize,
        task_name: String,
        location: String,
        input_time: f64,
        compute_time: f64,
        output_time: f64,
    },
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Event::TaskScheduled {
                task_name,
                location,
                cores,
                ..
            } => write!(f, "scheduled task {task_name} to {location} on {cores} cores"),
            Event::TaskCompleted {
                task_name, location, ..
            } => write!(f, "completed task {task_name} on {location}"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ResourceEntry {
    pub name: String,
    pub speed: f64,
    pub cores: u32,
    pub memory: u64,
    pub bandwidth: f64,
}

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct Task {
    pub name: String,
    pub flops: f64,
    pub memory: u64,
    pub min_cores: u32,
    pub max_cores: u32,
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
}

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct FileEntry {
    pub name: String,
    pub size: f64,
    pub consumers: Vec<usize>,
}

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct Graph {
    pub tasks: Vec<Task>,
    pub files: Vec<FileEntry>,
}

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct TraceLog {
    pub resources: Vec<ResourceEntry>,
    pub graph: Graph,
    pub events: Vec<Event>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_event(&mut self, ctx: &SimulationContext, event: Event) {
        log_debug!(ctx, "{}", event);
        self.events.push(event);
    }

    pub fn log_resources(&mut self, resources: &[Resource]) {
        self.resources = resources
            .iter()
            .map(|r| ResourceEntry {
                name: r.name.clone(),
                speed: r.speed,
                cores: r.cores,
                memory: r.memory,
                bandwidth: r.bandwidth,
            })
            .collect();
    }

    pub fn log_dag(&mut self, dag: &TaskGraph) {
        self.graph.tasks = dag
            .get_tasks()
            .iter()
            .map(|task| Task {
                name: task.name.clone(),
                flops: task.flops,
                memory: task.memory,
                min_cores: task.min_cores,
                max_cores: task.max_cores,
                inputs: task.inputs.clone(),
                outputs: task.outputs.clone(),
            })
            .collect();
        self.graph.files = dag
            .get_files()
            .iter()
            .map(|file| FileEntry {
                name: file.name.clone(),
                size: file.size,
                consumers: file.consumers().to_vec(),
            })
            .collect();
    }

    /// Returns the highest number of cores in use at once on each resource.
    pub fn peak_cores(&self) -> Vec<u32> {
        let mut used = vec![0u32; self.resources.len()];
        let mut peak = used.clone();
        let index = |location: &str| self.resources.iter().position(|r| r.name == location);
        let mut running = HashMap::new();
        for event in self.events.iter() {
            match event {
                Event::TaskScheduled {
                    task_id,
                    location,
                    cores,
                    ..
                } => {
                    if let Some(r) = index(location) {
                        used[r] += cores;
                        peak[r] = peak[r].max(used[r]);
                        running.insert(*task_id, (r, *cores));
                    }
                }
                Event::TaskCompleted { task_id, .. } => {
                    if let Some((r, cores)) = running.remove(task_id) {
                        used[r] -= cores;
                    }
                }
            }
        }
        peak
    }
}
