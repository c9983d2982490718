//! Simulation configuration and execution.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::Level::Trace;
use log::{debug, log_enabled, trace};
use serde_json::json;
use serde_type_name::type_name;

use crate::component::Id;
use crate::context::SimulationContext;
use crate::handler::EventHandler;
use crate::log::{get_colored, log_undelivered_event};
use crate::state::SimulationState;

/// Represents a simulation, provides methods for its configuration and execution.
pub struct Simulation {
    sim_state: Rc<RefCell<SimulationState>>,
    name_to_id: HashMap<String, Id>,
    names: Rc<RefCell<Vec<String>>>,
    handlers: Vec<Option<Rc<RefCell<dyn EventHandler>>>>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    /// Creates an empty simulation with the clock at zero.
    pub fn new() -> Self {
        Self {
            sim_state: Rc::new(RefCell::new(SimulationState::new())),
            name_to_id: HashMap::new(),
            names: Rc::new(RefCell::new(Vec::new())),
            handlers: Vec::new(),
        }
    }

    fn register(&mut self, name: &str) -> Id {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }
        let id = self.handlers.len() as Id;
        self.name_to_id.insert(name.to_owned(), id);
        self.names.borrow_mut().push(name.to_owned());
        self.handlers.push(None);
        id
    }

    /// Returns the name of component by its identifier.
    ///
    /// Panics if component with such Id does not exist.
    pub fn lookup_name(&self, id: Id) -> String {
        self.names.borrow()[id as usize].clone()
    }

    /// Creates a context for the component with specified name, registering the component if needed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use simcore::Simulation;
    ///
    /// let mut sim = Simulation::new();
    /// let ctx = sim.create_context("comp");
    /// assert_eq!(ctx.id(), 0);
    /// assert_eq!(ctx.name(), "comp");
    /// assert_eq!(sim.create_context("comp").id(), 0);
    /// ```
    pub fn create_context<S>(&mut self, name: S) -> SimulationContext
    where
        S: AsRef<str>,
    {
        let id = self.register(name.as_ref());
        debug!(
            target: "simulation",
            "[{:.3} {} simulation] Created context: {}",
            self.time(),
            get_colored("DEBUG", colored::Color::Blue),
            json!({"name": name.as_ref(), "id": id})
        );
        SimulationContext::new(id, name.as_ref(), self.sim_state.clone(), self.names.clone())
    }

    /// Registers the event handler of component with specified name, returns the component Id.
    ///
    /// If a context was already created for this name, its Id is reused.
    pub fn add_handler<S>(&mut self, name: S, handler: Rc<RefCell<dyn EventHandler>>) -> Id
    where
        S: AsRef<str>,
    {
        let id = self.register(name.as_ref());
        self.handlers[id as usize] = Some(handler);
        debug!(
            target: "simulation",
            "[{:.3} {} simulation] Added handler: {}",
            self.time(),
            get_colored("DEBUG", colored::Color::Blue),
            json!({"name": name.as_ref(), "id": id})
        );
        id
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Returns the total number of created events, including canceled ones.
    pub fn event_count(&self) -> u64 {
        self.sim_state.borrow().event_count()
    }

    /// Delivers the next pending event to its destination.
    ///
    /// Returns `false` if there were no pending events.
    pub fn step(&mut self) -> bool {
        let next = self.sim_state.borrow_mut().next_event();
        let Some(event) = next else {
            return false;
        };
        match self.handlers.get(event.dst as usize).cloned().flatten() {
            Some(handler) => {
                if log_enabled!(Trace) {
                    let dst_name = self.lookup_name(event.dst);
                    trace!(
                        target: &dst_name,
                        "[{:.3} {} {}] {}",
                        event.time,
                        get_colored("EVENT", colored::Color::BrightBlack),
                        dst_name,
                        json!({"type": type_name(&event.data).unwrap_or("?"), "data": event.data, "src": self.lookup_name(event.src)})
                    );
                }
                handler.borrow_mut().on(event);
            }
            None => log_undelivered_event(event),
        }
        true
    }

    /// Performs at most `step_count` steps, returns `false` if the queue was exhausted earlier.
    pub fn steps(&mut self, step_count: u64) -> bool {
        (0..step_count).all(|_| self.step())
    }

    /// Steps through the simulation until there are no pending events left.
    pub fn step_until_no_events(&mut self) {
        while self.step() {}
    }

    /// Steps through the simulation until the given time, returns `true` if events remain.
    pub fn step_until_time(&mut self, time: f64) -> bool {
        loop {
            let next_time = self.sim_state.borrow_mut().peek_time();
            match next_time {
                Some(t) if t <= time => {
                    self.step();
                }
                Some(_) => return true,
                None => return false,
            }
        }
    }
}
