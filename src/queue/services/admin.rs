//! Queue administration: creation and guarded deletion.

use crate::queue::domain::{Queue, QueueDomainError, QueueId, QueueScope};
use crate::queue::ports::{QueueRepository, QueueRepositoryError};
use crate::task::domain::TenantId;
use crate::task::ports::{TaskRepository, TaskRepositoryError};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;

/// Request payload for creating a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateQueueRequest {
    tenant_id: TenantId,
    name: String,
    scope: QueueScope,
    purpose: Option<String>,
    allow_bots: bool,
    system: bool,
}

impl CreateQueueRequest {
    /// Creates a request with required fields.
    #[must_use]
    pub fn new(tenant_id: TenantId, name: impl Into<String>, scope: QueueScope) -> Self {
        Self {
            tenant_id,
            name: name.into(),
            scope,
            purpose: None,
            allow_bots: false,
            system: false,
        }
    }

    /// Sets the purpose label.
    #[must_use]
    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    /// Allows automated workers to claim from the queue.
    #[must_use]
    pub const fn with_bots_allowed(mut self) -> Self {
        self.allow_bots = true;
        self
    }

    /// Marks the queue as a protected system queue.
    #[must_use]
    pub const fn as_system(mut self) -> Self {
        self.system = true;
        self
    }
}

/// Service-level errors for queue administration.
#[derive(Debug, Error)]
pub enum QueueAdminError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] QueueDomainError),

    /// Queue repository operation failed.
    #[error(transparent)]
    Repository(#[from] QueueRepositoryError),

    /// Task repository lookup failed while checking references.
    #[error(transparent)]
    TaskRepository(#[from] TaskRepositoryError),

    /// System queues may not be deleted.
    #[error("queue {0} is a system queue and cannot be deleted")]
    SystemQueueProtected(QueueId),

    /// Queues still referenced by tasks may not be deleted.
    #[error("queue {0} still has tasks referencing it")]
    QueueInUse(QueueId),
}

/// Result type for queue administration operations.
pub type QueueAdminResult<T> = Result<T, QueueAdminError>;

/// Queue administration service.
pub struct QueueAdminService<Q, T, C>
where
    Q: QueueRepository,
    T: TaskRepository,
    C: Clock + Send + Sync,
{
    queues: Arc<Q>,
    tasks: Arc<T>,
    clock: Arc<C>,
}

// Handles share state through the inner `Arc`s, so cloning must not demand
// `Clone` of the collaborators themselves.
impl<Q, T, C> Clone for QueueAdminService<Q, T, C>
where
    Q: QueueRepository,
    T: TaskRepository,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            queues: Arc::clone(&self.queues),
            tasks: Arc::clone(&self.tasks),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<Q, T, C> QueueAdminService<Q, T, C>
where
    Q: QueueRepository,
    T: TaskRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new queue administration service.
    #[must_use]
    pub const fn new(queues: Arc<Q>, tasks: Arc<T>, clock: Arc<C>) -> Self {
        Self {
            queues,
            tasks,
            clock,
        }
    }

    /// Creates and persists a new queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueAdminError`] when validation fails or the repository
    /// rejects persistence.
    pub async fn create_queue(&self, request: CreateQueueRequest) -> QueueAdminResult<Queue> {
        let mut queue = Queue::new(
            request.tenant_id,
            request.name,
            request.scope,
            &*self.clock,
        )?;
        if request.purpose.is_some() {
            queue.set_purpose(request.purpose, &*self.clock);
        }
        if request.allow_bots {
            queue.set_allow_bots(true, &*self.clock);
        }
        if request.system {
            queue.mark_system(&*self.clock);
        }
        self.queues.insert(&queue).await?;
        Ok(queue)
    }

    /// Finds a queue by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`QueueAdminError::Repository`] when the lookup fails.
    pub async fn find_queue(
        &self,
        tenant: TenantId,
        id: QueueId,
    ) -> QueueAdminResult<Option<Queue>> {
        Ok(self.queues.find_by_id(tenant, id).await?)
    }

    /// Lists all queues of a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`QueueAdminError::Repository`] when the lookup fails.
    pub async fn list_queues(&self, tenant: TenantId) -> QueueAdminResult<Vec<Queue>> {
        Ok(self.queues.list(tenant).await?)
    }

    /// Deletes a queue, refusing system queues and queues still referenced
    /// by tasks.
    ///
    /// # Errors
    ///
    /// Returns [`QueueAdminError::SystemQueueProtected`] for system queues,
    /// [`QueueAdminError::QueueInUse`] when tasks still reference the queue,
    /// and repository errors otherwise.
    pub async fn delete_queue(&self, tenant: TenantId, id: QueueId) -> QueueAdminResult<()> {
        let queue = self
            .queues
            .find_by_id(tenant, id)
            .await?
            .ok_or(QueueRepositoryError::NotFound(id))?;
        if queue.is_system() {
            return Err(QueueAdminError::SystemQueueProtected(id));
        }
        if self.tasks.exists_in_queue(tenant, id).await? {
            return Err(QueueAdminError::QueueInUse(id));
        }
        self.queues.delete(tenant, id).await?;
        Ok(())
    }
}
