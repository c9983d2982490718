//! Minimal discrete-event simulation core.
//!
//! Components are registered under unique names and exchange events through a single
//! time-ordered queue. Simulated time only advances when the next event is taken from the queue.

pub mod component;
pub mod context;
pub mod event;
pub mod handler;
pub mod log;
pub mod simulation;
mod state;

pub use colored;
pub use component::Id;
pub use context::SimulationContext;
pub use event::{Event, EventData, EventId};
pub use handler::EventHandler;
pub use simulation::Simulation;
pub use state::EPSILON;
