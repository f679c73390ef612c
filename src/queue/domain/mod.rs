//! Domain model for scoped work queues.

mod error;
mod ids;
mod queue;

pub use error::QueueDomainError;
pub use ids::{QueueId, TeamId, UserId};
pub use queue::{PersistedQueueData, Queue, QueueScope};
