use std::collections::{BinaryHeap, HashSet};

use crate::component::Id;
use crate::event::{Event, EventData, EventId};

/// Epsilon to compare floating point values for equality.
pub const EPSILON: f64 = 1e-12;

pub(crate) struct SimulationState {
    clock: f64,
    events: BinaryHeap<Event>,
    canceled_events: HashSet<EventId>,
    event_count: u64,
}

impl SimulationState {
    pub fn new() -> Self {
        Self {
            clock: 0.,
            events: BinaryHeap::new(),
            canceled_events: HashSet::new(),
            event_count: 0,
        }
    }

    pub fn time(&self) -> f64 {
        self.clock
    }

    pub fn add_event<T>(&mut self, data: T, src: Id, dst: Id, delay: f64) -> EventId
    where
        T: EventData,
    {
        assert!(
            delay >= -EPSILON,
            "Event delay is negative ({}), events from the past are not allowed",
            delay
        );
        let id = self.event_count;
        self.events.push(Event {
            id,
            time: self.clock + delay.max(0.),
            src,
            dst,
            data: Box::new(data),
        });
        self.event_count += 1;
        id
    }

    pub fn cancel_event(&mut self, id: EventId) {
        if id < self.event_count {
            self.canceled_events.insert(id);
        }
    }

    /// Removes the next non-canceled event from the queue and advances the clock to its time.
    pub fn next_event(&mut self) -> Option<Event> {
        while let Some(event) = self.events.pop() {
            if self.canceled_events.remove(&event.id) {
                continue;
            }
            self.clock = event.time;
            return Some(event);
        }
        None
    }

    pub fn peek_time(&mut self) -> Option<f64> {
        loop {
            let id = self.events.peek()?.id;
            if self.canceled_events.remove(&id) {
                self.events.pop();
            } else {
                return self.events.peek().map(|e| e.time);
            }
        }
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }
}
