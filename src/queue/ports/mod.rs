//! Port contracts for queue management.

pub mod repository;

pub use repository::{QueueRepository, QueueRepositoryError, QueueRepositoryResult};
