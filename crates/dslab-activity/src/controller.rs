//! Dispatch of ready tasks to resources.

use std::collections::BTreeSet;

use enum_iterator::IntoEnumIterator;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::Serialize;

use simcore::{log_debug, log_info, SimulationContext};

use crate::config::SchedulerConfig;
use crate::dag::TaskGraph;
use crate::error::{ActivityError, Result};
use crate::policy::{ResourceCandidate, ResourcePolicy, TaskPolicy};
use crate::readiness::ReadinessTracker;
use crate::resource::Resource;
use crate::task::TaskState;

/// Request to execute a task on a resource.
#[derive(Clone, Debug, Serialize)]
pub struct Job {
    pub task: usize,
    pub resource: usize,
    pub cores: u32,
    pub flops: f64,
    pub speedup: f64,
    pub memory: u64,
    /// Input files as `(file id, size)` pairs.
    pub inputs: Vec<(usize, f64)>,
    /// Output files as `(file id, size)` pairs.
    pub outputs: Vec<(usize, f64)>,
}

/// Executes jobs submitted by the [`DispatchController`].
///
/// Completion and failure of a job are reported back asynchronously via
/// [`DispatchController::on_job_completed`] and [`DispatchController::on_job_failed`].
pub trait ExecutionService {
    fn submit(&mut self, job: Job) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ControllerState {
    Init,
    Scheduling,
    AwaitingEvent,
    Done,
}

/// Event-driven loop which keeps resources busy until every task of the graph is completed.
///
/// On each scheduling opportunity the task policy picks a ready task and the resource policy picks
/// an eligible resource for it. A ready task without eligible resources stays ready and the next task
/// in the task policy's order is tried instead.
pub struct DispatchController {
    dag: TaskGraph,
    readiness: ReadinessTracker,
    resources: Vec<Resource>,
    task_policy: TaskPolicy,
    resource_policy: ResourcePolicy,
    rng: Pcg64,
    storage: String,
    task_location: Vec<Option<usize>>,
    state: ControllerState,
}

impl DispatchController {
    /// Creates a controller for the graph and resources.
    ///
    /// Fails if the configuration is invalid, the graph is malformed or some task does not fit any resource.
    pub fn new(dag: TaskGraph, mut resources: Vec<Resource>, config: &SchedulerConfig) -> Result<Self> {
        config.validate()?;
        let (task_policy, resource_policy) = config.policies()?;
        dag.validate()?;
        if resources.is_empty() {
            return Err(ActivityError::EmptyPlatform);
        }
        for resource in resources.iter_mut() {
            if let Some(&bandwidth) = config.link_speed.get(&resource.name) {
                resource.bandwidth = bandwidth;
            }
        }
        if let Some(task) = dag
            .get_tasks()
            .iter()
            .find(|task| !resources.iter().any(|r| r.can_ever_run(task)))
        {
            return Err(ActivityError::Unschedulable {
                task: task.name.clone(),
            });
        }
        Ok(Self {
            readiness: ReadinessTracker::new(&dag),
            task_location: vec![None; dag.task_count()],
            dag,
            resources,
            task_policy,
            resource_policy,
            rng: Pcg64::seed_from_u64(config.seed),
            storage: config.storage.clone(),
            state: ControllerState::Init,
        })
    }

    pub fn dag(&self) -> &TaskGraph {
        &self.dag
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn readiness(&self) -> &ReadinessTracker {
        &self.readiness
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ControllerState::Done
    }

    pub fn task_policy(&self) -> TaskPolicy {
        self.task_policy
    }

    pub fn resource_policy(&self) -> ResourcePolicy {
        self.resource_policy
    }

    /// Resource the task was dispatched to, if any.
    pub fn task_location(&self, task_id: usize) -> Option<usize> {
        self.task_location[task_id]
    }

    /// Makes pre-staged files available and dispatches the initially ready tasks.
    pub fn start(&mut self, service: &mut dyn ExecutionService, ctx: &SimulationContext) -> Result<Vec<Job>> {
        if self.state != ControllerState::Init {
            return Err(ActivityError::InvariantViolation(format!(
                "controller started in state {:?}",
                self.state
            )));
        }
        log_info!(
            ctx,
            "scheduling {} tasks on {} resources with storage at {}: task policy \"{}\", resource policy \"{}\"",
            self.dag.task_count(),
            self.resources.len(),
            self.storage,
            self.task_policy,
            self.resource_policy
        );
        let prestaged = self.dag.prestaged_files().collect::<Vec<_>>();
        for file_id in prestaged {
            self.readiness.on_file_available(&self.dag, file_id)?;
        }
        self.state = ControllerState::Scheduling;
        self.schedule(service, ctx)
    }

    /// Frees the resource held by the completed task, updates readiness and dispatches more tasks.
    pub fn on_job_completed(
        &mut self,
        task_id: usize,
        service: &mut dyn ExecutionService,
        ctx: &SimulationContext,
    ) -> Result<Vec<Job>> {
        if self.state != ControllerState::AwaitingEvent {
            return Err(ActivityError::InvariantViolation(format!(
                "completion of task {} received in state {:?}",
                task_id, self.state
            )));
        }
        let location = self.task_location[task_id].ok_or_else(|| {
            ActivityError::InvariantViolation(format!("completed task {} was never dispatched", task_id))
        })?;
        self.resources[location].release(task_id)?;
        let ready = self.readiness.on_task_completed(&self.dag, task_id)?;
        log_debug!(
            ctx,
            "task {} completed on {}, {} tasks became ready",
            self.dag.get_task(task_id).name,
            self.resources[location].name,
            ready.len()
        );
        self.state = ControllerState::Scheduling;
        self.schedule(service, ctx)
    }

    /// Handles a failure reported by the execution service. Failures are never retried.
    pub fn on_job_failed(&mut self, task_id: usize, reason: &str) -> Result<()> {
        self.state = ControllerState::Done;
        Err(ActivityError::JobFailed {
            task: self.dag.get_task(task_id).name.clone(),
            reason: reason.to_string(),
        })
    }

    fn schedule(&mut self, service: &mut dyn ExecutionService, ctx: &SimulationContext) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();
        let mut skipped = BTreeSet::new();
        while self.resources.iter().any(|r| r.is_idle()) {
            let candidates = self
                .readiness
                .ready_set()
                .iter()
                .filter(|t| !skipped.contains(*t))
                .copied()
                .collect::<Vec<_>>();
            let task_id = match self.task_policy.select(&candidates, &self.dag, &mut self.rng) {
                Some(task_id) => task_id,
                None => break,
            };
            let task = self.dag.get_task(task_id);
            let eligible = self
                .resources
                .iter()
                .enumerate()
                .filter(|(_, r)| r.can_run(task))
                .map(|(id, r)| ResourceCandidate {
                    id,
                    speed: r.speed,
                    bandwidth: r.bandwidth,
                    cores: task.cores_on(r.cores_available),
                })
                .collect::<Vec<_>>();
            match self
                .resource_policy
                .select(task_id, &eligible, &self.dag, ctx.time(), &mut self.rng)
            {
                Some(resource_id) => {
                    let cores = task.cores_on(self.resources[resource_id].cores_available);
                    jobs.push(self.dispatch(task_id, resource_id, cores, service, ctx)?);
                }
                None => {
                    log_debug!(ctx, "no eligible resource for task {}", task.name);
                    skipped.insert(task_id);
                }
            }
        }
        self.state = if self.readiness.is_completed() {
            log_info!(ctx, "all {} tasks completed", self.dag.task_count());
            ControllerState::Done
        } else {
            ControllerState::AwaitingEvent
        };
        Ok(jobs)
    }

    fn dispatch(
        &mut self,
        task_id: usize,
        resource_id: usize,
        cores: u32,
        service: &mut dyn ExecutionService,
        ctx: &SimulationContext,
    ) -> Result<Job> {
        let task = self.dag.get_task(task_id);
        self.readiness.on_task_dispatched(task_id)?;
        self.resources[resource_id].allocate(task_id, cores, task.memory)?;
        self.task_location[task_id] = Some(resource_id);
        let file_sizes = |files: &[usize]| {
            files
                .iter()
                .map(|&f| (f, self.dag.get_file(f).size))
                .collect::<Vec<_>>()
        };
        let job = Job {
            task: task_id,
            resource: resource_id,
            cores,
            flops: task.flops,
            speedup: task.speedup(cores),
            memory: task.memory,
            inputs: file_sizes(&task.inputs),
            outputs: file_sizes(&task.outputs),
        };
        log_debug!(
            ctx,
            "dispatching task {} to {} on {} cores",
            task.name,
            self.resources[resource_id].name,
            cores
        );
        service.submit(job.clone())?;
        Ok(job)
    }

    /// Number of tasks in each state, skipping empty states.
    pub fn task_state_counts(&self) -> Vec<(TaskState, usize)> {
        TaskState::into_enum_iter()
            .map(|state| (state, self.readiness.count(state)))
            .filter(|&(_, count)| count > 0)
            .collect()
    }
}
