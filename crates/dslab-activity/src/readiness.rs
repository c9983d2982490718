//! Tracking of task readiness.

use std::collections::BTreeSet;

use crate::dag::TaskGraph;
use crate::error::{ActivityError, Result};
use crate::task::TaskState;

/// Maintains task states and the set of tasks whose inputs are all available and which are not yet dispatched.
///
/// Tasks move strictly forward: `NotReady -> Ready -> Running -> Completed`.
pub struct ReadinessTracker {
    states: Vec<TaskState>,
    missing_inputs: Vec<usize>,
    file_available: Vec<bool>,
    ready: BTreeSet<usize>,
    completed_count: usize,
}

impl ReadinessTracker {
    /// Creates a tracker with no files available. Tasks without inputs are immediately ready.
    pub fn new(graph: &TaskGraph) -> Self {
        let missing_inputs: Vec<usize> = graph.get_tasks().iter().map(|t| t.inputs.len()).collect();
        let mut states = vec![TaskState::NotReady; graph.task_count()];
        let mut ready = BTreeSet::new();
        for (task_id, &missing) in missing_inputs.iter().enumerate() {
            if missing == 0 {
                states[task_id] = TaskState::Ready;
                ready.insert(task_id);
            }
        }
        Self {
            states,
            missing_inputs,
            file_available: vec![false; graph.get_files().len()],
            ready,
            completed_count: 0,
        }
    }

    /// Marks the file available and returns the tasks which became ready as a result.
    pub fn on_file_available(&mut self, graph: &TaskGraph, file_id: usize) -> Result<Vec<usize>> {
        if self.file_available[file_id] {
            return Err(ActivityError::InvariantViolation(format!(
                "file {} is marked available twice",
                graph.get_file(file_id).name
            )));
        }
        self.file_available[file_id] = true;
        let mut became_ready = Vec::new();
        for &consumer in graph.get_file(file_id).consumers() {
            self.missing_inputs[consumer] -= 1;
            if self.missing_inputs[consumer] > 0 {
                continue;
            }
            if self.states[consumer] != TaskState::NotReady {
                return Err(ActivityError::InvariantViolation(format!(
                    "task {} got all inputs in state {:?}",
                    graph.get_task(consumer).name,
                    self.states[consumer]
                )));
            }
            self.states[consumer] = TaskState::Ready;
            self.ready.insert(consumer);
            became_ready.push(consumer);
        }
        Ok(became_ready)
    }

    /// Moves a ready task to the running state.
    pub fn on_task_dispatched(&mut self, task_id: usize) -> Result<()> {
        if self.states[task_id] != TaskState::Ready {
            return Err(ActivityError::InvariantViolation(format!(
                "dispatching task {} in state {:?}",
                task_id, self.states[task_id]
            )));
        }
        self.states[task_id] = TaskState::Running;
        self.ready.remove(&task_id);
        Ok(())
    }

    /// Completes a running task and makes its outputs available.
    ///
    /// Returns the tasks which became ready as a result.
    pub fn on_task_completed(&mut self, graph: &TaskGraph, task_id: usize) -> Result<Vec<usize>> {
        if self.states[task_id] != TaskState::Running {
            return Err(ActivityError::InvariantViolation(format!(
                "completing task {} in state {:?}",
                graph.get_task(task_id).name,
                self.states[task_id]
            )));
        }
        self.states[task_id] = TaskState::Completed;
        self.completed_count += 1;
        let mut became_ready = Vec::new();
        for &file_id in graph.get_task(task_id).outputs.iter() {
            became_ready.extend(self.on_file_available(graph, file_id)?);
        }
        Ok(became_ready)
    }

    /// Currently ready tasks, ordered by task id.
    pub fn ready_set(&self) -> &BTreeSet<usize> {
        &self.ready
    }

    pub fn state(&self, task_id: usize) -> TaskState {
        self.states[task_id]
    }

    /// Number of tasks in the given state.
    pub fn count(&self, state: TaskState) -> usize {
        self.states.iter().filter(|&&s| s == state).count()
    }

    /// Returns true when every task is completed.
    pub fn is_completed(&self) -> bool {
        self.completed_count == self.states.len()
    }
}

#[cfg(test)]
mod tests {
    use super::ReadinessTracker;
    use crate::dag::TaskGraph;
    use crate::error::ActivityError;
    use crate::task::TaskState;

    fn chain() -> (TaskGraph, usize, usize, usize) {
        let mut dag = TaskGraph::new();
        let a = dag.add_task("a", 1., 0, 1, 1, 1.);
        let b = dag.add_task("b", 1., 0, 1, 1, 1.);
        let input = dag.add_file("in", 1.);
        dag.add_data_dependency(input, a);
        let out = dag.add_task_output(a, "out", 1.);
        dag.add_data_dependency(out, b);
        (dag, a, b, input)
    }

    #[test]
    fn readiness_cascades_through_outputs() {
        let (dag, a, b, input) = chain();
        let mut tracker = ReadinessTracker::new(&dag);
        assert!(tracker.ready_set().is_empty());
        assert_eq!(tracker.on_file_available(&dag, input).unwrap(), vec![a]);
        assert_eq!(tracker.state(a), TaskState::Ready);
        tracker.on_task_dispatched(a).unwrap();
        assert!(tracker.ready_set().is_empty());
        assert_eq!(tracker.state(b), TaskState::NotReady);
        assert_eq!(tracker.on_task_completed(&dag, a).unwrap(), vec![b]);
        assert_eq!(tracker.ready_set().iter().copied().collect::<Vec<_>>(), vec![b]);
        tracker.on_task_dispatched(b).unwrap();
        tracker.on_task_completed(&dag, b).unwrap();
        assert!(tracker.is_completed());
        assert_eq!(tracker.count(TaskState::Completed), 2);
    }

    #[test]
    fn double_availability_is_a_violation() {
        let (dag, _, _, input) = chain();
        let mut tracker = ReadinessTracker::new(&dag);
        tracker.on_file_available(&dag, input).unwrap();
        assert!(matches!(
            tracker.on_file_available(&dag, input),
            Err(ActivityError::InvariantViolation(_))
        ));
    }

    #[test]
    fn completing_task_which_is_not_running_is_a_violation() {
        let (dag, a, b, input) = chain();
        let mut tracker = ReadinessTracker::new(&dag);
        assert!(tracker.on_task_completed(&dag, a).is_err());
        tracker.on_file_available(&dag, input).unwrap();
        assert!(tracker.on_task_completed(&dag, a).is_err());
        assert!(tracker.on_task_dispatched(b).is_err());
        tracker.on_task_dispatched(a).unwrap();
        assert!(tracker.on_task_dispatched(a).is_err());
    }
}
