//! Port contracts for work-item lifecycle management.
//!
//! Ports define infrastructure-agnostic interfaces used by task services.

pub mod events;
pub mod repository;

pub use events::{TaskEvent, TaskEventKind, TaskEventSink};
pub use repository::{TaskRepository, TaskRepositoryError, TaskRepositoryResult};
