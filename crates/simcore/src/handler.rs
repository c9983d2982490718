//! Event handling.

use crate::event::Event;

/// Consumes events delivered to a simulation component.
pub trait EventHandler {
    /// Processes an event.
    fn on(&mut self, event: Event);
}

/// Pattern matching over event payload types.
///
/// Each arm downcasts the payload to the named struct and destructures it.
/// Payloads that match no arm are logged as unhandled.
///
/// # Examples
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use serde::Serialize;
/// use simcore::{cast, Event, EventHandler, Simulation};
///
/// #[derive(Serialize)]
/// pub struct Ping {
///     round: u32,
/// }
///
/// pub struct Counter {
///     rounds: u32,
/// }
///
/// impl EventHandler for Counter {
///     fn on(&mut self, event: Event) {
///         cast!(match event.data {
///             Ping { round } => {
///                 self.rounds = round;
///             }
///         })
///     }
/// }
///
/// let mut sim = Simulation::new();
/// let counter = Rc::new(RefCell::new(Counter { rounds: 0 }));
/// let counter_id = sim.add_handler("counter", counter.clone());
/// let mut client = sim.create_context("client");
/// client.emit(Ping { round: 3 }, counter_id, 1.5);
/// sim.step_until_no_events();
/// assert_eq!(counter.borrow().rounds, 3);
/// assert_eq!(sim.time(), 1.5);
/// ```
#[macro_export]
macro_rules! cast {
    ( match $event:ident.data { $( $type:ident { $($tt:tt)* } => { $($expr:tt)* } )+ } ) => {
        $(
            if $event.data.is::<$type>() {
                if let Ok(__value) = $event.data.downcast::<$type>() {
                    let $type { $($tt)* } = *__value;
                    $($expr)*
                }
            } else
        )*
        {
            $crate::log::log_unhandled_event($event);
        }
    }
}
