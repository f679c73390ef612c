//! Repository port for work-item persistence and claim-selection queries.

use crate::queue::domain::QueueId;
use crate::task::domain::{Task, TaskId, TenantId, WorkerId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for task repository operations.
pub type TaskRepositoryResult<T> = Result<T, TaskRepositoryError>;

/// Work-item persistence contract.
///
/// The store is treated as a transactional document store: `update` is the
/// single conditional read-modify-write primitive. It applies only when the
/// stored version matches the version the caller read, so two racing
/// mutations never both win; the loser observes
/// [`TaskRepositoryError::VersionConflict`] and re-derives its decision from
/// current state. No operation here blocks waiting on another caller.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Stores a new work item.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::DuplicateTask`] when the task ID
    /// already exists.
    async fn insert(&self, task: &Task) -> TaskRepositoryResult<()>;

    /// Conditionally persists changes to an existing work item.
    ///
    /// The write applies only when the stored version equals the version
    /// carried by `task`; on success the stored (and returned) copy carries
    /// the bumped version.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not
    /// exist and [`TaskRepositoryError::VersionConflict`] when another
    /// caller committed first.
    async fn update(&self, task: &Task) -> TaskRepositoryResult<Task>;

    /// Finds a task by identifier within a tenant.
    ///
    /// Returns `None` when the task does not exist or belongs to another
    /// tenant.
    async fn find_by_id(&self, tenant: TenantId, id: TaskId) -> TaskRepositoryResult<Option<Task>>;

    /// Returns all `Queued` tasks of a tenant in claim order: priority
    /// ascending, creation time ascending, id ascending.
    async fn find_claimable(&self, tenant: TenantId) -> TaskRepositoryResult<Vec<Task>>;

    /// Returns `CheckedOut` tasks whose lease was acquired strictly before
    /// `cutoff`.
    async fn find_stale(
        &self,
        tenant: TenantId,
        cutoff: DateTime<Utc>,
    ) -> TaskRepositoryResult<Vec<Task>>;

    /// Returns `Blocked` tasks whose dependency set contains `dependency`.
    async fn find_blocked_depending_on(
        &self,
        tenant: TenantId,
        dependency: TaskId,
    ) -> TaskRepositoryResult<Vec<Task>>;

    /// Returns every task (any status) whose dependency set contains
    /// `dependency`. Drives the downstream reachability traversal.
    async fn find_dependents(
        &self,
        tenant: TenantId,
        dependency: TaskId,
    ) -> TaskRepositoryResult<Vec<Task>>;

    /// Returns tasks with no desk assigned, for auto-routing.
    async fn find_unrouted(&self, tenant: TenantId) -> TaskRepositoryResult<Vec<Task>>;

    /// Counts tasks currently leased (`CheckedOut` or `InProgress`) by the
    /// given worker.
    async fn count_leased_by(
        &self,
        tenant: TenantId,
        worker: WorkerId,
    ) -> TaskRepositoryResult<usize>;

    /// Returns whether any task references the given queue.
    async fn exists_in_queue(
        &self,
        tenant: TenantId,
        queue: QueueId,
    ) -> TaskRepositoryResult<bool>;
}

/// Errors returned by task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// The task was not found in the tenant.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The conditional update lost a race: the stored version moved on.
    #[error("version conflict on task {task_id}: expected {expected}")]
    VersionConflict {
        /// Task whose update was rejected.
        task_id: TaskId,
        /// Version the caller read before mutating.
        expected: u64,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Returns whether this error is a lost conditional-update race.
    ///
    /// Lease paths treat a lost race as an empty result rather than a hard
    /// error.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}
