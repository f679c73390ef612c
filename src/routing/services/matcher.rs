//! First-match desk routing over declarative rules.

use crate::routing::domain::{Desk, DeskId};
use crate::routing::ports::{DeskRepository, DeskRepositoryError};
use crate::task::domain::{Task, TaskId, TenantId};
use crate::task::ports::{
    TaskEvent, TaskEventKind, TaskEventSink, TaskRepository, TaskRepositoryError,
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Service-level errors for desk routing.
#[derive(Debug, Error)]
pub enum RoutingServiceError {
    /// Desk repository operation failed.
    #[error(transparent)]
    Desk(#[from] DeskRepositoryError),

    /// Task repository operation failed.
    #[error(transparent)]
    Task(#[from] TaskRepositoryError),

    /// The work item to route was not found.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
}

/// Result type for routing operations.
pub type RoutingResult<T> = Result<T, RoutingServiceError>;

/// Assigns unassigned work items to the best-matching desk.
///
/// Desks are evaluated in priority order (higher first, id ascending as the
/// tiebreak); the first active, covered desk with a matching rule wins. There
/// is no score aggregation, and an item with no match stays unassigned.
pub struct RoutingService<D, T, E, C>
where
    D: DeskRepository,
    T: TaskRepository,
    E: TaskEventSink,
    C: Clock + Send + Sync,
{
    desks: Arc<D>,
    tasks: Arc<T>,
    events: Arc<E>,
    clock: Arc<C>,
}

// Handles share state through the inner `Arc`s, so cloning must not demand
// `Clone` of the collaborators themselves.
impl<D, T, E, C> Clone for RoutingService<D, T, E, C>
where
    D: DeskRepository,
    T: TaskRepository,
    E: TaskEventSink,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            desks: Arc::clone(&self.desks),
            tasks: Arc::clone(&self.tasks),
            events: Arc::clone(&self.events),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<D, T, E, C> RoutingService<D, T, E, C>
where
    D: DeskRepository,
    T: TaskRepository,
    E: TaskEventSink,
    C: Clock + Send + Sync,
{
    /// Creates a new routing service.
    #[must_use]
    pub const fn new(desks: Arc<D>, tasks: Arc<T>, events: Arc<E>, clock: Arc<C>) -> Self {
        Self {
            desks,
            tasks,
            events,
            clock,
        }
    }

    /// Picks the winning desk for a work item without persisting anything.
    ///
    /// Returns `None` when no active, covered desk has a matching rule.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingServiceError::Desk`] when the desk listing fails.
    pub async fn route_one(&self, task: &Task) -> RoutingResult<Option<DeskId>> {
        let desks = self.desks.list(task.tenant_id()).await?;
        Ok(Self::first_match(&desks, task).map(Desk::id))
    }

    /// Routes a single work item and persists the assignment.
    ///
    /// Returns the winning desk, or `None` when no desk matched (the item
    /// stays unassigned; this is not an error).
    ///
    /// # Errors
    ///
    /// Returns [`RoutingServiceError::TaskNotFound`] when the item does not
    /// exist in the tenant, and repository errors otherwise.
    pub async fn route_task(
        &self,
        tenant: TenantId,
        task_id: TaskId,
    ) -> RoutingResult<Option<DeskId>> {
        let task = self
            .tasks
            .find_by_id(tenant, task_id)
            .await?
            .ok_or(RoutingServiceError::TaskNotFound(task_id))?;
        let desks = self.desks.list(tenant).await?;
        let Some(desk) = Self::first_match(&desks, &task) else {
            return Ok(None);
        };
        self.assign(task, desk).await?;
        Ok(Some(desk.id()))
    }

    /// Routes every work item with no desk assigned, returning how many were
    /// assigned. Items with no match remain unassigned.
    ///
    /// # Errors
    ///
    /// Returns repository errors; a lost update race on an individual item is
    /// skipped, not surfaced.
    pub async fn auto_route_unassigned(&self, tenant: TenantId) -> RoutingResult<usize> {
        let desks = self.desks.list(tenant).await?;
        let unrouted = self.tasks.find_unrouted(tenant).await?;
        let mut routed = 0;
        for task in unrouted {
            let Some(desk) = Self::first_match(&desks, &task) else {
                continue;
            };
            let desk_id = desk.id();
            match self.assign(task, desk).await {
                Ok(()) => routed += 1,
                Err(RoutingServiceError::Task(err)) if err.is_conflict() => {
                    debug!(desk = %desk_id, "skipping item updated concurrently");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(routed)
    }

    fn first_match<'d>(desks: &'d [Desk], task: &Task) -> Option<&'d Desk> {
        desks
            .iter()
            .find(|desk| desk.is_active() && desk.is_covered() && desk.matches(task))
    }

    async fn assign(&self, mut task: Task, desk: &Desk) -> RoutingResult<()> {
        task.route_to(desk.id(), desk.queue_id(), &*self.clock);
        let committed = self.tasks.update(&task).await?;
        self.events
            .record(TaskEvent::new(
                committed.tenant_id(),
                committed.id(),
                TaskEventKind::Routed { desk: desk.id() },
                &*self.clock,
            ))
            .await;
        Ok(())
    }
}
