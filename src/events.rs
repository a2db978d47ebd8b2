//! Per-request progress notifications.
//!
//! The engine and the dispatcher emit via [`EventBus::emit`]; front-ends
//! subscribe via [`EventBus::subscribe`] and relay progress to the user.
//! Built on [`tokio::sync::broadcast`] so several listeners can react
//! independently.

use tokio::sync::broadcast;

/// Progress of one request, labelled by the submitted file's name.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The file arrived and was written to scratch space.
    Received { request: String },
    /// Imports were extracted and are being resolved.
    Resolving {
        request: String,
        modules: Vec<String>,
    },
    /// The child process was started.
    Running { request: String },
    /// A report is ready. `ok` is false for engine-level failures.
    Finished { request: String, ok: bool },
}

impl Event {
    pub fn request(&self) -> &str {
        match self {
            Event::Received { request }
            | Event::Resolving { request, .. }
            | Event::Running { request }
            | Event::Finished { request, .. } => request,
        }
    }
}

/// A broadcast channel that any component can emit to or subscribe from.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all current subscribers.
    /// Returns the number of receivers that will see it.
    pub fn emit(&self, event: Event) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to future events (past ones are not replayed).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
