//! In-memory adapters for queue ports.

mod queue;

pub use queue::InMemoryQueueRepository;
