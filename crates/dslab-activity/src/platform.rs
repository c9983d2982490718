//! Execution platform model.
//!
//! Compute hosts are connected to the storage by links shared fairly between concurrent transfers.
//! A job stages its inputs in from the storage, computes on the allotted cores and stages its outputs
//! back to the storage, after which the runner is notified.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use serde::Serialize;

use simcore::{cast, log_debug, log_trace, log_warn, Event, EventHandler, EventId, Id, SimulationContext};

use crate::config::PlatformConfig;
use crate::controller::{ExecutionService, Job};
use crate::error::{ActivityError, Result};
use crate::link::SharedLink;

/// Job has finished and its outputs are on the storage.
#[derive(Clone, Serialize)]
pub struct JobCompleted {
    pub task: usize,
    pub resource: usize,
    /// Time spent on staging inputs in.
    pub input_time: f64,
    pub compute_time: f64,
    /// Time spent on staging outputs out.
    pub output_time: f64,
    /// Total bytes moved over the network by the job.
    pub transferred: f64,
}

#[derive(Clone, Serialize)]
pub struct JobFailed {
    pub task: usize,
    pub reason: String,
}

#[derive(Clone, Serialize)]
struct LinkTimer {
    link: usize,
}

#[derive(Clone, Serialize)]
struct TransferDelivered {
    transfer: u64,
}

#[derive(Clone, Serialize)]
struct ComputeFinished {
    task: usize,
}

struct Host {
    name: String,
    speed: f64,
    cores_available: u32,
    memory_available: u64,
    link: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    StageIn,
    Compute,
    StageOut,
}

struct JobExecution {
    job: Job,
    stage: Stage,
    stage_start: f64,
    pending_transfers: usize,
    input_time: f64,
    compute_time: f64,
    transferred: f64,
}

struct Transfer {
    task: usize,
    file: usize,
    size: f64,
    link: usize,
}

pub struct Platform {
    hosts: Vec<Host>,
    links: Vec<SharedLink>,
    link_names: Vec<String>,
    link_timers: Vec<Option<EventId>>,
    storage: String,
    stored_files: BTreeSet<usize>,
    jobs: BTreeMap<usize, JobExecution>,
    transfers: HashMap<u64, Transfer>,
    next_transfer: u64,
    runner: Id,
    ctx: SimulationContext,
}

impl Platform {
    /// Creates the platform with `prestaged` files already on the storage.
    /// Job notifications are sent to the `runner` component.
    pub fn new(
        config: &PlatformConfig,
        prestaged: impl IntoIterator<Item = usize>,
        runner: Id,
        ctx: SimulationContext,
    ) -> Result<Self> {
        config.validate()?;
        let link_names = config.links.iter().map(|l| l.name.clone()).collect::<Vec<_>>();
        let mut hosts = Vec::with_capacity(config.hosts.len());
        for host in config.hosts.iter() {
            let link = link_names.iter().position(|l| *l == host.link).ok_or_else(|| {
                ActivityError::invalid_parameter(format!("link of {}", host.name), format!("unknown link {}", host.link))
            })?;
            hosts.push(Host {
                name: host.name.clone(),
                speed: host.speed,
                cores_available: host.cores,
                memory_available: host.memory,
                link,
            });
        }
        Ok(Self {
            hosts,
            links: config
                .links
                .iter()
                .map(|l| SharedLink::new(l.bandwidth, l.latency))
                .collect(),
            link_timers: vec![None; link_names.len()],
            link_names,
            storage: config.storage.clone(),
            stored_files: prestaged.into_iter().collect(),
            jobs: BTreeMap::new(),
            transfers: HashMap::new(),
            next_transfer: 0,
            runner,
            ctx,
        })
    }

    /// Files currently held by the storage.
    pub fn stored_files(&self) -> &BTreeSet<usize> {
        &self.stored_files
    }

    /// Number of jobs being executed.
    pub fn active_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Accepts a job for execution, holding its cores and memory until completion.
    pub fn submit(&mut self, job: Job) -> Result<()> {
        let host = self
            .hosts
            .get_mut(job.resource)
            .ok_or_else(|| ActivityError::SubmitRejected(format!("unknown resource {}", job.resource)))?;
        if job.cores > host.cores_available || job.memory > host.memory_available {
            return Err(ActivityError::SubmitRejected(format!(
                "task {} needs {} cores and {} bytes of memory, {} has {} cores and {} bytes free",
                job.task, job.cores, job.memory, host.name, host.cores_available, host.memory_available
            )));
        }
        if self.jobs.contains_key(&job.task) {
            return Err(ActivityError::SubmitRejected(format!("task {} is already running", job.task)));
        }
        if let Some(&(file, _)) = job.inputs.iter().find(|(f, _)| !self.stored_files.contains(f)) {
            self.ctx.emit_now(
                JobFailed {
                    task: job.task,
                    reason: format!("input file {} is missing on {}", file, self.storage),
                },
                self.runner,
            );
            return Ok(());
        }
        host.cores_available -= job.cores;
        host.memory_available -= job.memory;
        let link = host.link;
        let task = job.task;
        let inputs = job.inputs.clone();
        self.jobs.insert(
            task,
            JobExecution {
                job,
                stage: Stage::StageIn,
                stage_start: self.ctx.time(),
                pending_transfers: inputs.len(),
                input_time: 0.,
                compute_time: 0.,
                transferred: 0.,
            },
        );
        if inputs.is_empty() {
            self.start_compute(task);
        }
        for (file, size) in inputs {
            self.start_transfer(task, file, size, link);
        }
        Ok(())
    }

    fn start_transfer(&mut self, task: usize, file: usize, size: f64, link: usize) {
        let transfer = self.next_transfer;
        self.next_transfer += 1;
        log_trace!(
            self.ctx,
            "transfer {} of file {} ({} bytes) for task {} started over {}",
            transfer,
            file,
            size,
            task,
            self.link_names[link]
        );
        self.links[link].insert(self.ctx.time(), size, transfer);
        self.transfers.insert(transfer, Transfer { task, file, size, link });
        self.schedule_link_timer(link);
    }

    fn schedule_link_timer(&mut self, link: usize) {
        if let Some(timer) = self.link_timers[link].take() {
            self.ctx.cancel_event(timer);
        }
        if let Some((time, _)) = self.links[link].next_completion() {
            let delay = (time - self.ctx.time()).max(0.);
            self.link_timers[link] = Some(self.ctx.emit_self(LinkTimer { link }, delay));
        }
    }

    fn on_link_timer(&mut self, link: usize) {
        self.link_timers[link] = None;
        if let Some((_, transfer)) = self.links[link].pop() {
            let latency = self.links[link].latency();
            self.ctx.emit_self(TransferDelivered { transfer }, latency);
        }
        self.schedule_link_timer(link);
    }

    fn on_transfer_delivered(&mut self, transfer_id: u64) {
        let transfer = match self.transfers.remove(&transfer_id) {
            Some(transfer) => transfer,
            None => {
                log_warn!(self.ctx, "delivery of unknown transfer {}", transfer_id);
                return;
            }
        };
        log_trace!(
            self.ctx,
            "transfer {} of file {} over {} delivered",
            transfer_id,
            transfer.file,
            self.link_names[transfer.link]
        );
        let now = self.ctx.time();
        let execution = match self.jobs.get_mut(&transfer.task) {
            Some(execution) => execution,
            None => return,
        };
        execution.pending_transfers -= 1;
        execution.transferred += transfer.size;
        if execution.pending_transfers > 0 {
            return;
        }
        match execution.stage {
            Stage::StageIn => {
                execution.input_time = now - execution.stage_start;
                self.start_compute(transfer.task);
            }
            Stage::StageOut => self.finish_job(transfer.task),
            Stage::Compute => {}
        }
    }

    fn start_compute(&mut self, task: usize) {
        let now = self.ctx.time();
        if let Some(execution) = self.jobs.get_mut(&task) {
            let host = &self.hosts[execution.job.resource];
            let compute_time = execution.job.flops / (host.speed * execution.job.speedup);
            execution.stage = Stage::Compute;
            execution.stage_start = now;
            execution.compute_time = compute_time;
            log_debug!(
                self.ctx,
                "task {} computes on {} for {:.3}",
                task,
                host.name,
                compute_time
            );
            self.ctx.emit_self(ComputeFinished { task }, compute_time);
        }
    }

    fn on_compute_finished(&mut self, task: usize) {
        let now = self.ctx.time();
        let (outputs, link) = match self.jobs.get_mut(&task) {
            Some(execution) => {
                execution.stage = Stage::StageOut;
                execution.stage_start = now;
                execution.pending_transfers = execution.job.outputs.len();
                (
                    execution.job.outputs.clone(),
                    self.hosts[execution.job.resource].link,
                )
            }
            None => return,
        };
        if outputs.is_empty() {
            self.finish_job(task);
        }
        for (file, size) in outputs {
            self.start_transfer(task, file, size, link);
        }
    }

    fn finish_job(&mut self, task: usize) {
        let execution = match self.jobs.remove(&task) {
            Some(execution) => execution,
            None => return,
        };
        let now = self.ctx.time();
        for &(file, _) in execution.job.outputs.iter() {
            if !self.stored_files.insert(file) {
                log_warn!(self.ctx, "file {} produced by task {} is already stored", file, task);
            }
        }
        let host = &mut self.hosts[execution.job.resource];
        host.cores_available += execution.job.cores;
        host.memory_available += execution.job.memory;
        self.ctx.emit_now(
            JobCompleted {
                task,
                resource: execution.job.resource,
                input_time: execution.input_time,
                compute_time: execution.compute_time,
                output_time: now - execution.stage_start,
                transferred: execution.transferred,
            },
            self.runner,
        );
    }
}

impl EventHandler for Platform {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            LinkTimer { link } => {
                self.on_link_timer(link);
            }
            TransferDelivered { transfer } => {
                self.on_transfer_delivered(transfer);
            }
            ComputeFinished { task } => {
                self.on_compute_finished(task);
            }
        })
    }
}

/// [`ExecutionService`] submitting jobs to a shared [`Platform`].
pub struct PlatformService {
    platform: Rc<RefCell<Platform>>,
}

impl PlatformService {
    pub fn new(platform: Rc<RefCell<Platform>>) -> Self {
        Self { platform }
    }
}

impl ExecutionService for PlatformService {
    fn submit(&mut self, job: Job) -> Result<()> {
        self.platform.borrow_mut().submit(job)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use simcore::{cast, Event, EventHandler, Simulation};

    use super::{JobCompleted, JobFailed, Platform};
    use crate::config::{HostConfig, LinkConfig, PlatformConfig};
    use crate::controller::Job;

    #[derive(Default)]
    struct Sink {
        completed: Vec<(f64, JobCompleted)>,
        failed: Vec<usize>,
    }

    impl EventHandler for Sink {
        fn on(&mut self, event: Event) {
            let time = event.time;
            cast!(match event.data {
                JobCompleted {
                    task,
                    resource,
                    input_time,
                    compute_time,
                    output_time,
                    transferred,
                } => {
                    self.completed.push((
                        time,
                        JobCompleted {
                            task,
                            resource,
                            input_time,
                            compute_time,
                            output_time,
                            transferred,
                        },
                    ));
                }
                JobFailed { task, .. } => {
                    self.failed.push(task);
                }
            })
        }
    }

    fn config(latency: f64) -> PlatformConfig {
        PlatformConfig {
            storage: "storage".to_string(),
            hosts: vec![HostConfig {
                name: "host".to_string(),
                speed: 10.,
                cores: 2,
                memory: 100,
                link: "link".to_string(),
            }],
            links: vec![LinkConfig {
                name: "link".to_string(),
                bandwidth: 10.,
                latency,
            }],
        }
    }

    fn job(task: usize, inputs: Vec<(usize, f64)>, outputs: Vec<(usize, f64)>) -> Job {
        Job {
            task,
            resource: 0,
            cores: 1,
            flops: 100.,
            speedup: 1.,
            memory: 10,
            inputs,
            outputs,
        }
    }

    fn setup(latency: f64, prestaged: Vec<usize>) -> (Simulation, Rc<RefCell<Platform>>, Rc<RefCell<Sink>>) {
        let mut sim = Simulation::new();
        let sink = Rc::new(RefCell::new(Sink::default()));
        let sink_id = sim.add_handler("runner", sink.clone());
        let ctx = sim.create_context("platform");
        let platform = Rc::new(RefCell::new(Platform::new(&config(latency), prestaged, sink_id, ctx).unwrap()));
        sim.add_handler("platform", platform.clone());
        (sim, platform, sink)
    }

    #[test]
    fn job_stages_in_computes_and_stages_out() {
        let (mut sim, platform, sink) = setup(0.5, vec![0]);
        platform.borrow_mut().submit(job(0, vec![(0, 20.)], vec![(1, 30.)])).unwrap();
        sim.step_until_no_events();
        let sink = sink.borrow();
        let (time, completed) = &sink.completed[0];
        // 2 s input + 0.5 latency, 10 s compute, 3 s output + 0.5 latency
        assert_eq!(*time, 16.);
        assert_eq!(completed.input_time, 2.5);
        assert_eq!(completed.compute_time, 10.);
        assert_eq!(completed.output_time, 3.5);
        assert_eq!(completed.transferred, 50.);
        assert!(platform.borrow().stored_files().contains(&1));
        assert_eq!(platform.borrow().active_jobs(), 0);
    }

    #[test]
    fn concurrent_jobs_share_the_link() {
        let (mut sim, platform, sink) = setup(0., vec![0, 1]);
        platform.borrow_mut().submit(job(0, vec![(0, 50.)], vec![])).unwrap();
        platform.borrow_mut().submit(job(1, vec![(1, 50.)], vec![])).unwrap();
        sim.step_until_no_events();
        let times = sink.borrow().completed.iter().map(|(t, c)| (c.task, *t)).collect::<Vec<_>>();
        // both inputs take 10 s at half of the bandwidth, then 10 s of compute
        assert_eq!(times, vec![(0, 20.), (1, 20.)]);
    }

    #[test]
    fn capacity_and_missing_inputs() {
        let (mut sim, platform, sink) = setup(0., vec![]);
        let mut big = job(0, vec![], vec![]);
        big.cores = 3;
        assert!(platform.borrow_mut().submit(big).is_err());
        platform.borrow_mut().submit(job(1, vec![(5, 1.)], vec![])).unwrap();
        sim.step_until_no_events();
        assert_eq!(sink.borrow().failed, vec![1]);
        assert!(sink.borrow().completed.is_empty());
    }
}
