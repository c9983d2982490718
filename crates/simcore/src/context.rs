//! Accessing simulation from components.

use std::cell::RefCell;
use std::rc::Rc;

use crate::component::Id;
use crate::event::{EventData, EventId};
use crate::state::SimulationState;

/// A facade for reading the simulation clock and producing events from a component.
pub struct SimulationContext {
    id: Id,
    name: String,
    sim_state: Rc<RefCell<SimulationState>>,
    names: Rc<RefCell<Vec<String>>>,
}

impl SimulationContext {
    pub(crate) fn new(
        id: Id,
        name: &str,
        sim_state: Rc<RefCell<SimulationState>>,
        names: Rc<RefCell<Vec<String>>>,
    ) -> Self {
        Self {
            id,
            name: name.to_owned(),
            sim_state,
            names,
        }
    }

    /// Returns the identifier of component associated with this context.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the name of component associated with this context.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Creates new event with specified payload, destination and delay.
    pub fn emit<T>(&mut self, data: T, dst: Id, delay: f64) -> EventId
    where
        T: EventData,
    {
        self.sim_state.borrow_mut().add_event(data, self.id, dst, delay)
    }

    /// Creates new immediate (zero-delay) event with specified payload and destination.
    pub fn emit_now<T>(&mut self, data: T, dst: Id) -> EventId
    where
        T: EventData,
    {
        self.emit(data, dst, 0.)
    }

    /// Creates new event for itself with specified payload and delay.
    pub fn emit_self<T>(&mut self, data: T, delay: f64) -> EventId
    where
        T: EventData,
    {
        self.emit(data, self.id, delay)
    }

    /// Cancels the specified event.
    pub fn cancel_event(&mut self, id: EventId) {
        self.sim_state.borrow_mut().cancel_event(id);
    }

    /// Looks up component name by its identifier.
    pub fn lookup_name(&self, id: Id) -> String {
        self.names.borrow()[id as usize].clone()
    }
}
