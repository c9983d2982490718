//! Logging facilities.
//!
//! Messages are prefixed with the current simulation time, the level and the component name:
//! `[12.500 INFO  runner] started`. The level tag is colored when stderr is a terminal.

use atty::Stream;
use colored::{Color, ColoredString, Colorize};
use log::error;
use serde_json::json;
use serde_type_name::type_name;

use crate::event::Event;

/// Applies the color to the string if stderr (log) goes to console.
pub fn get_colored(s: &str, color: Color) -> ColoredString {
    if atty::is(Stream::Stderr) {
        s.color(color)
    } else {
        s.normal()
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_with_ctx {
    ($level:ident, $tag:expr, $color:ident, $ctx:expr, $format:expr $(, $arg:expr)* $(,)?) => {
        log::$level!(
            target: $ctx.name(),
            concat!("[{:.3} {} {}] ", $format),
            $ctx.time(),
            $crate::log::get_colored($tag, $crate::colored::Color::$color),
            $ctx.name()
            $(, $arg)*
        )
    };
}

/// Logs a message at the info level using the component context.
///
/// # Examples
///
/// ```rust
/// use std::io::Write;
///
/// use env_logger::Builder;
/// use simcore::{log_info, Simulation};
///
/// Builder::from_default_env()
///     .format(|buf, record| writeln!(buf, "{}", record.args()))
///     .init();
///
/// let mut sim = Simulation::new();
/// let ctx = sim.create_context("comp");
/// log_info!(ctx, "started with {} workers", 3);
/// ```
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_ctx!(info, "INFO", Green, $ctx, $($arg)+));
}

/// Logs a message at the debug level. See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_ctx!(debug, "DEBUG", Blue, $ctx, $($arg)+));
}

/// Logs a message at the trace level. See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_trace {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_ctx!(trace, "TRACE", Cyan, $ctx, $($arg)+));
}

/// Logs a message at the warn level. See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_ctx!(warn, "WARN", Yellow, $ctx, $($arg)+));
}

/// Logs a message at the error level. See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_ctx!(error, "ERROR", Red, $ctx, $($arg)+));
}

fn describe(event: &Event) -> serde_json::Value {
    json!({
        "type": type_name(&event.data).unwrap_or("?"),
        "data": event.data,
        "src": event.src,
        "dst": event.dst,
    })
}

/// Logs an event whose payload was not matched by any [`cast!`](crate::cast!) arm.
pub fn log_unhandled_event(event: Event) {
    error!(
        target: "simulation",
        "[{:.3} {} simulation] Unhandled event: {}",
        event.time,
        get_colored("ERROR", Color::Red),
        describe(&event)
    );
}

/// Logs an event sent to a component without a registered handler.
pub(crate) fn log_undelivered_event(event: Event) {
    error!(
        target: "simulation",
        "[{:.3} {} simulation] Undelivered event: {}",
        event.time,
        get_colored("ERROR", Color::Red),
        describe(&event)
    );
}
