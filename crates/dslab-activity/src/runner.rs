//! Workflow execution runtime.

use std::fs::File;
use std::io::Write;

use serde::Serialize;

use simcore::{cast, log_error, log_info, Event, EventHandler, SimulationContext};

use crate::controller::{DispatchController, ExecutionService, Job};
use crate::error::{ActivityError, Result};
use crate::platform::{JobCompleted, JobFailed};
use crate::run_stats::RunStats;
use crate::trace_log::{self, TraceLog};

/// Drives a [`DispatchController`] from simulation events.
///
/// Starts the controller on [`Start`], forwards job notifications from the execution platform
/// and records the trace log and run statistics. Any error reported by the controller aborts the run.
pub struct ActivityRunner {
    controller: DispatchController,
    service: Box<dyn ExecutionService>,
    trace_log: TraceLog,
    run_stats: RunStats,
    trace_log_enabled: bool,
    ctx: SimulationContext,
}

#[derive(Serialize)]
struct Report<'a> {
    trace: &'a TraceLog,
    stats: &'a RunStats,
}

impl ActivityRunner {
    pub fn new(controller: DispatchController, service: Box<dyn ExecutionService>, ctx: SimulationContext) -> Self {
        Self {
            controller,
            service,
            trace_log: TraceLog::new(),
            run_stats: RunStats::new(),
            trace_log_enabled: true,
            ctx,
        }
    }

    /// Enables or disables [trace log](crate::trace_log::TraceLog).
    pub fn enable_trace_log(&mut self, flag: bool) {
        self.trace_log_enabled = flag;
    }

    pub fn controller(&self) -> &DispatchController {
        &self.controller
    }

    pub fn trace_log(&self) -> &TraceLog {
        &self.trace_log
    }

    pub fn run_stats(&self) -> &RunStats {
        &self.run_stats
    }

    pub fn is_completed(&self) -> bool {
        self.controller.is_done() && self.run_stats.is_idle()
    }

    /// Writes the trace log and run statistics as JSON.
    pub fn save_report(&self, path: &str) -> Result<()> {
        let report = Report {
            trace: &self.trace_log,
            stats: &self.run_stats,
        };
        File::create(path)?.write_all(serde_json::to_string_pretty(&report)?.as_bytes())?;
        Ok(())
    }

    fn start(&mut self) {
        log_info!(
            self.ctx,
            "started execution: total {} resources, {} tasks, {} files",
            self.controller.resources().len(),
            self.controller.dag().task_count(),
            self.controller.dag().get_files().len()
        );
        if self.trace_log_enabled {
            self.trace_log.log_resources(self.controller.resources());
            self.trace_log.log_dag(self.controller.dag());
        }
        let result = self.controller.start(self.service.as_mut(), &self.ctx);
        self.on_dispatched(result);
    }

    fn on_job_completed(&mut self, completed: JobCompleted) {
        let time = self.ctx.time();
        let task_name = self.controller.dag().get_task(completed.task).name.clone();
        self.run_stats.set_task_finish(completed.task, &task_name, time);
        self.run_stats.add_transfers(
            completed.transferred,
            completed.input_time + completed.output_time,
        );
        self.run_stats.add_compute_time(completed.compute_time);
        if self.trace_log_enabled {
            let location = self.controller.resources()[completed.resource].name.clone();
            self.trace_log.log_event(
                &self.ctx,
                trace_log::Event::TaskCompleted {
                    time,
                    task_id: completed.task,
                    task_name,
                    location,
                    input_time: completed.input_time,
                    compute_time: completed.compute_time,
                    output_time: completed.output_time,
                },
            );
        }
        let result = self
            .controller
            .on_job_completed(completed.task, self.service.as_mut(), &self.ctx);
        self.on_dispatched(result);
        if self.is_completed() {
            log_info!(self.ctx, "finished execution, makespan: {:.3}", self.run_stats.makespan);
        }
    }

    fn on_dispatched(&mut self, result: Result<Vec<Job>>) {
        let jobs = match result {
            Ok(jobs) => jobs,
            Err(err) => self.abort(err),
        };
        let time = self.ctx.time();
        for job in jobs {
            self.run_stats
                .set_task_start(job.task, job.resource, job.cores, job.memory, time);
            if self.trace_log_enabled {
                self.trace_log.log_event(
                    &self.ctx,
                    trace_log::Event::TaskScheduled {
                        time,
                        task_id: job.task,
                        task_name: self.controller.dag().get_task(job.task).name.clone(),
                        location: self.controller.resources()[job.resource].name.clone(),
                        cores: job.cores,
                        memory: job.memory,
                    },
                );
            }
        }
    }

    fn abort(&self, err: ActivityError) -> ! {
        log_error!(self.ctx, "execution aborted: {}", err);
        panic!("execution aborted: {}", err);
    }

    /// Checks that all tasks are completed and logs the task states otherwise.
    pub fn validate_completed(&self) -> Result<()> {
        if self.is_completed() {
            return Ok(());
        }
        let states = self
            .controller
            .task_state_counts()
            .into_iter()
            .map(|(state, count)| format!("{} {:?}", count, state))
            .collect::<Vec<_>>()
            .join(", ");
        log_error!(self.ctx, "execution is not completed, currently {} tasks", states);
        Err(ActivityError::InvariantViolation(format!(
            "execution is not completed, currently {} tasks",
            states
        )))
    }
}

#[derive(Serialize)]
pub struct Start {}

impl EventHandler for ActivityRunner {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            Start {} => {
                self.start();
            }
            JobCompleted {
                task,
                resource,
                input_time,
                compute_time,
                output_time,
                transferred,
            } => {
                self.on_job_completed(JobCompleted {
                    task,
                    resource,
                    input_time,
                    compute_time,
                    output_time,
                    transferred,
                });
            }
            JobFailed { task, reason } => {
                if let Err(err) = self.controller.on_job_failed(task, &reason) {
                    self.abort(err);
                }
            }
        })
    }
}
