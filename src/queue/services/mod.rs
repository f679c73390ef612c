//! Application services for queue administration.

mod admin;

pub use admin::{CreateQueueRequest, QueueAdminError, QueueAdminResult, QueueAdminService};
