//! Simulation events.

use std::cmp::Ordering;

use downcast_rs::{impl_downcast, Downcast};
use serde::Serialize;

use crate::component::Id;

/// Event identifier, unique within a simulation.
pub type EventId = u64;

/// Payload of an event. Any serializable `'static` type qualifies.
pub trait EventData: Downcast + erased_serde::Serialize {}

impl_downcast!(EventData);

erased_serde::serialize_trait_object!(EventData);

impl<T: Serialize + 'static> EventData for T {}

/// Event delivered to a component at a given simulation time.
pub struct Event {
    /// Unique event identifier, also the creation order of events.
    pub id: EventId,
    /// Delivery time.
    pub time: f64,
    /// Component which created the event.
    pub src: Id,
    /// Component the event is delivered to.
    pub dst: Id,
    /// Event payload.
    pub data: Box<dyn EventData>,
}

impl Eq for Event {}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

// Reversed so that the max-heap yields the earliest event, ties broken by creation order.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other.time.total_cmp(&self.time).then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
