//! Repository port for queue persistence.

use crate::queue::domain::{Queue, QueueId};
use crate::task::domain::TenantId;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for queue repository operations.
pub type QueueRepositoryResult<T> = Result<T, QueueRepositoryError>;

/// Queue persistence contract.
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Stores a new queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueRepositoryError::DuplicateQueue`] when the queue ID
    /// already exists.
    async fn insert(&self, queue: &Queue) -> QueueRepositoryResult<()>;

    /// Persists changes to an existing queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueRepositoryError::NotFound`] when the queue does not
    /// exist.
    async fn update(&self, queue: &Queue) -> QueueRepositoryResult<()>;

    /// Finds a queue by identifier within a tenant.
    ///
    /// Returns `None` when the queue does not exist or belongs to another
    /// tenant.
    async fn find_by_id(
        &self,
        tenant: TenantId,
        id: QueueId,
    ) -> QueueRepositoryResult<Option<Queue>>;

    /// Returns all queues of a tenant ordered by name.
    async fn list(&self, tenant: TenantId) -> QueueRepositoryResult<Vec<Queue>>;

    /// Removes a queue. Scope guards (system flag, referencing tasks) are
    /// enforced by the admin service before this is called.
    ///
    /// # Errors
    ///
    /// Returns [`QueueRepositoryError::NotFound`] when the queue does not
    /// exist.
    async fn delete(&self, tenant: TenantId, id: QueueId) -> QueueRepositoryResult<()>;
}

/// Errors returned by queue repository implementations.
#[derive(Debug, Clone, Error)]
pub enum QueueRepositoryError {
    /// A queue with the same identifier already exists.
    #[error("duplicate queue identifier: {0}")]
    DuplicateQueue(QueueId),

    /// The queue was not found in the tenant.
    #[error("queue not found: {0}")]
    NotFound(QueueId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl QueueRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
