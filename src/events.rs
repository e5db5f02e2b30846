//! Event system for operation lifecycle and live log views.
//!
//! Provides an optional, non-intrusive way to observe generation. An
//! operation emits events when it starts, changes state, appends a log entry,
//! and finishes. Implement [`EventHandler`] to drive a live terminal view,
//! progress UI, or metrics.

use crate::logger::LogEntry;
use crate::operation::OperationState;
use std::sync::Arc;

/// Events emitted during a generation operation.
#[derive(Debug, Clone)]
pub enum Event {
    /// A new submission began. Earlier submissions are now superseded.
    OperationStart {
        /// Submission identifier.
        submission: u64,
        /// Operation name (e.g. `"linkedin"`).
        name: String,
    },
    /// The orchestrator state machine moved to a new state.
    StateChanged {
        submission: u64,
        name: String,
        state: OperationState,
    },
    /// An entry was appended to the session log.
    Log {
        submission: u64,
        entry: LogEntry,
    },
    /// A submission reached a terminal state.
    OperationEnd {
        submission: u64,
        name: String,
        /// Whether the operation succeeded.
        ok: bool,
    },
}

/// Handler for operation lifecycle events.
///
/// This is entirely optional -- the pipeline works without an event handler.
///
/// # Example
///
/// ```
/// use content_gen_pipeline::events::{Event, EventHandler};
///
/// struct Terminal;
///
/// impl EventHandler for Terminal {
///     fn on_event(&self, event: Event) {
///         if let Event::Log { entry, .. } = event {
///             println!("[{}] {}: {}", entry.timestamp, entry.level, entry.message);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called for every emitted event.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use content_gen_pipeline::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::OperationEnd { name, ok, .. } = event {
///         println!("{} finished ok={}", name, ok);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}
