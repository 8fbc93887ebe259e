//! Progress events and the sinks that receive them

use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// Progress of a batch run, emitted in order from the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BatchEvent {
    ItemStarted {
        index: usize,
        total: usize,
        name: String,
    },
    ItemSucceeded {
        index: usize,
        name: String,
        output: PathBuf,
    },
    ItemFailed {
        index: usize,
        name: String,
        reason: String,
    },
    /// Converted fine, but the copy to the chosen destination failed
    RoutingFailed {
        index: usize,
        name: String,
        reason: String,
    },
    BatchFinished {
        completed: usize,
        total: usize,
    },
}

/// Receives batch events
///
/// Delivery is best effort: `emit` must not block the worker, and a sink
/// that panics is contained by the orchestrator.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: BatchEvent);
}

impl EventSink for UnboundedSender<BatchEvent> {
    fn emit(&self, event: BatchEvent) {
        // Receiver gone means nobody is listening any more
        let _ = self.send(event);
    }
}
