//! Error types for queue domain validation.

use thiserror::Error;

/// Errors returned while constructing domain queue values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueDomainError {
    /// The queue name is empty after trimming.
    #[error("queue name must not be empty")]
    EmptyName,
}
