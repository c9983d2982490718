//! Simulation configuration and execution.

use std::cell::RefCell;
use std::rc::Rc;

use simcore::Simulation;

use crate::config::{PlatformConfig, SchedulerConfig};
use crate::controller::DispatchController;
use crate::dag::TaskGraph;
use crate::error::Result;
use crate::platform::{Platform, PlatformService};
use crate::runner::{ActivityRunner, Start};

/// Provides a convenient API for configuring and running simulations of workflow execution.
pub struct ActivitySimulation {
    pub sim: Simulation,
    platform_config: PlatformConfig,
    scheduler_config: SchedulerConfig,
}

impl ActivitySimulation {
    pub fn new(platform_config: PlatformConfig, scheduler_config: SchedulerConfig) -> Self {
        Self {
            sim: Simulation::new(),
            platform_config,
            scheduler_config,
        }
    }

    /// Validates the configuration, creates the platform and the runner and schedules the start of execution.
    pub fn init(&mut self, dag: TaskGraph) -> Result<Rc<RefCell<ActivityRunner>>> {
        self.platform_config.validate()?;
        let prestaged = dag.prestaged_files().collect::<Vec<_>>();
        let controller = DispatchController::new(dag, self.platform_config.resources(), &self.scheduler_config)?;

        let runner_ctx = self.sim.create_context("runner");
        let platform = Rc::new(RefCell::new(Platform::new(
            &self.platform_config,
            prestaged,
            runner_ctx.id(),
            self.sim.create_context("platform"),
        )?));
        self.sim.add_handler("platform", platform.clone());

        let runner = Rc::new(RefCell::new(ActivityRunner::new(
            controller,
            Box::new(PlatformService::new(platform)),
            runner_ctx,
        )));
        let runner_id = self.sim.add_handler("runner", runner.clone());
        let mut client = self.sim.create_context("client");
        client.emit_now(Start {}, runner_id);
        Ok(runner)
    }

    /// Performs the specified number of steps through the simulation.
    ///
    /// See [Simulation::steps()](simcore::Simulation::steps).
    pub fn steps(&mut self, step_count: u64) -> bool {
        self.sim.steps(step_count)
    }

    /// Steps through the simulation until there are no pending events left.
    pub fn step_until_no_events(&mut self) {
        self.sim.step_until_no_events();
    }

    /// Returns the total number of created events.
    pub fn event_count(&self) -> u64 {
        self.sim.event_count()
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.sim.time()
    }
}
