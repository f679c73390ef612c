//! In-memory adapters for task ports.

mod events;
mod task;

pub use events::InMemoryTaskEventSink;
pub use task::InMemoryTaskRepository;
