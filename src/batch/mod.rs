//! Batch conversion
//!
//! Runs a [`BatchJob`](crate::core::BatchJob) item by item, reports
//! progress through an [`EventSink`], and routes each converted file
//! according to a [`DestinationPolicy`].

mod destination;
mod events;
mod orchestrator;
mod state;

pub use destination::{CommandMediaIndexer, DestinationPolicy, MediaIndexer, NoopIndexer};
pub use events::{BatchEvent, EventSink};
pub use orchestrator::{destination_file_name, BatchOrchestrator};
pub use state::{BatchState, ItemResult};
