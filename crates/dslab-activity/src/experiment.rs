//! Tool for running repeated simulations.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use threadpool::ThreadPool;

use crate::config::{PlatformConfig, SchedulerConfig};
use crate::dag::TaskGraph;
use crate::error::{ActivityError, Result};
use crate::run_stats::RunStats;
use crate::simulation::ActivitySimulation;

/// Everything needed to run one simulation.
#[derive(Clone)]
pub struct RunSetup {
    pub dag: TaskGraph,
    pub platform: PlatformConfig,
    pub scheduler: SchedulerConfig,
}

/// Contains result of one run.
#[derive(Serialize, Debug, Clone)]
pub struct RunResult {
    pub seed: u64,
    pub makespan: f64,
    pub stats: RunStats,
}

/// Runs the simulation to completion.
pub fn run_once(setup: RunSetup) -> Result<RunResult> {
    let seed = setup.scheduler.seed;
    let mut sim = ActivitySimulation::new(setup.platform, setup.scheduler);
    let runner = sim.init(setup.dag)?;
    runner.borrow_mut().enable_trace_log(false);
    sim.step_until_no_events();
    let runner = runner.borrow();
    runner.validate_completed()?;
    Ok(RunResult {
        seed,
        makespan: runner.run_stats().makespan,
        stats: runner.run_stats().clone(),
    })
}

/// Repeats a run with consecutive seeds.
pub struct Experiment {
    setup: RunSetup,
    invocations: u64,
}

impl Experiment {
    /// Invocation `i` uses the configured seed plus `i`.
    pub fn new(setup: RunSetup, invocations: u64) -> Self {
        Self { setup, invocations }
    }

    /// Run all invocations, returns the results in invocation order.
    pub fn run(self, num_threads: usize) -> Result<Vec<RunResult>> {
        let total_runs = self.invocations as usize;
        let finished_runs = Arc::new(AtomicUsize::new(0));
        let results = Arc::new(Mutex::new(Vec::new()));

        let pool = ThreadPool::new(num_threads.max(1));
        let start_time = Instant::now();
        for i in 0..self.invocations {
            let mut setup = self.setup.clone();
            setup.scheduler = setup.scheduler.with_seed(setup.scheduler.seed.wrapping_add(i));
            let finished_runs = finished_runs.clone();
            let results = results.clone();
            pool.execute(move || {
                let result = run_once(setup);
                if let Ok(mut results) = results.lock() {
                    results.push((i, result));
                }
                let finished = finished_runs.fetch_add(1, Ordering::SeqCst) + 1;
                print!(
                    "\rFinished {}/{} [{}%] runs in {:.2?}",
                    finished,
                    total_runs,
                    (finished as f64 * 100. / total_runs as f64).round() as i32,
                    start_time.elapsed()
                );
                std::io::stdout().flush().ok();
            });
        }
        pool.join();
        println!();

        let mut results = results
            .lock()
            .map_err(|_| ActivityError::InvariantViolation("experiment results are poisoned".to_string()))?
            .drain(..)
            .collect::<Vec<_>>();
        if results.len() != total_runs {
            return Err(ActivityError::InvariantViolation(format!(
                "{} of {} runs aborted",
                total_runs - results.len(),
                total_runs
            )));
        }
        results.sort_by_key(|(invocation, _)| *invocation);
        results.into_iter().map(|(_, result)| result).collect()
    }
}

/// Average makespan over the results.
pub fn average_makespan(results: &[RunResult]) -> f64 {
    if results.is_empty() {
        return 0.;
    }
    results.iter().map(|r| r.makespan).sum::<f64>() / results.len() as f64
}

#[cfg(test)]
mod tests {
    use super::{Experiment, RunSetup};
    use crate::config::{SchedulerConfig, TaskSpec};
    use crate::topology::{default_workers, star, MASTER_HOST};
    use crate::workload::bag_of_tasks;

    #[test]
    fn results_follow_invocation_order_across_seed_wrap() {
        let topology = star(&default_workers()).unwrap();
        let spec = TaskSpec {
            input: 1.,
            flops: 1e9,
            output: 1.,
        };
        let setup = RunSetup {
            dag: bag_of_tasks(&vec![spec; 4]).unwrap(),
            scheduler: SchedulerConfig::new(0, 0, u64::MAX - 1, MASTER_HOST).with_link_speed(topology.link_speed),
            platform: topology.platform,
        };
        let results = Experiment::new(setup, 4).run(2).unwrap();
        let seeds = results.iter().map(|r| r.seed).collect::<Vec<_>>();
        assert_eq!(seeds, vec![u64::MAX - 1, u64::MAX, 0, 1]);
    }
}
