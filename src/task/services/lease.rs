//! Atomic claim, heartbeat renewal, release, and stale-lease recovery.
//!
//! A claim is one conditional write: the candidate read as `Queued` is
//! claimed only if nobody else committed first, so N concurrent claimants
//! get at most one winner per task and every loser just moves to the next
//! candidate. Losing the race is a normal empty result, never an error.

use crate::queue::domain::QueueId;
use crate::queue::ports::{QueueRepository, QueueRepositoryError};
use crate::task::domain::{
    Task, TaskDomainError, TaskId, TaskStatus, TenantId, WorkerId, WorkerRef,
};
use crate::task::ports::{
    TaskEvent, TaskEventKind, TaskEventSink, TaskRepository, TaskRepositoryError,
};
use chrono::Duration;
use mockable::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Tuning knobs for the lease manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseConfig {
    /// Age after which a `CheckedOut` lease counts as stale.
    pub stale_after: Duration,
    /// Cap on simultaneous checkouts per automated worker, when set.
    pub max_concurrent_bot_checkouts: Option<usize>,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::minutes(30),
            max_concurrent_bot_checkouts: Some(1),
        }
    }
}

/// Service-level errors for lease operations.
#[derive(Debug, Error)]
pub enum LeaseError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),

    /// Task repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),

    /// Queue repository lookup failed while filtering candidates.
    #[error(transparent)]
    QueueRepository(#[from] QueueRepositoryError),

    /// The worker already holds its maximum number of leases.
    #[error("worker {worker} already holds {held} leases (limit {limit})")]
    ConcurrencyLimitExceeded {
        /// Worker whose claim was refused.
        worker: WorkerId,
        /// Leases currently held.
        held: usize,
        /// Configured cap.
        limit: usize,
    },

    /// The task was not found in the tenant.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
}

/// Result type for lease operations.
pub type LeaseResult<T> = Result<T, LeaseError>;

/// Outcome of a batched heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeartbeatReport {
    /// Leases successfully renewed.
    pub valid: Vec<TaskId>,
    /// Identifiers whose lease could not be renewed (not held by the
    /// caller, no longer leased, or lost to a concurrent write).
    pub invalid: Vec<TaskId>,
}

/// Queue and lease manager.
pub struct LeaseService<T, Q, E, C>
where
    T: TaskRepository,
    Q: QueueRepository,
    E: TaskEventSink,
    C: Clock + Send + Sync,
{
    tasks: Arc<T>,
    queues: Arc<Q>,
    events: Arc<E>,
    clock: Arc<C>,
    config: LeaseConfig,
}

// Handles share state through the inner `Arc`s, so cloning must not demand
// `Clone` of the collaborators themselves.
impl<T, Q, E, C> Clone for LeaseService<T, Q, E, C>
where
    T: TaskRepository,
    Q: QueueRepository,
    E: TaskEventSink,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            tasks: Arc::clone(&self.tasks),
            queues: Arc::clone(&self.queues),
            events: Arc::clone(&self.events),
            clock: Arc::clone(&self.clock),
            config: self.config,
        }
    }
}

impl<T, Q, E, C> LeaseService<T, Q, E, C>
where
    T: TaskRepository,
    Q: QueueRepository,
    E: TaskEventSink,
    C: Clock + Send + Sync,
{
    /// Creates a new lease service.
    #[must_use]
    pub const fn new(
        tasks: Arc<T>,
        queues: Arc<Q>,
        events: Arc<E>,
        clock: Arc<C>,
        config: LeaseConfig,
    ) -> Self {
        Self {
            tasks,
            queues,
            events,
            clock,
            config,
        }
    }

    /// Returns the configured tuning knobs.
    #[must_use]
    pub const fn config(&self) -> &LeaseConfig {
        &self.config
    }

    /// Atomically claims the next eligible task for a worker.
    ///
    /// Candidates are visited in claim order (priority ascending, creation
    /// time ascending, id ascending). A candidate is skipped when its
    /// dependencies are not all met, when `allowed_queues` is given and the
    /// candidate sits outside those queues, or when the caller is an
    /// automated worker and the candidate's queue does not admit bots.
    /// Returns `None` when nothing is eligible; losing every claim race
    /// also yields `None`.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::ConcurrencyLimitExceeded`] when an automated
    /// worker is at its checkout cap, and repository errors otherwise.
    pub async fn claim(
        &self,
        tenant: TenantId,
        worker: &WorkerRef,
        allowed_queues: Option<&[QueueId]>,
    ) -> LeaseResult<Option<Task>> {
        if worker.is_bot()
            && let Some(limit) = self.config.max_concurrent_bot_checkouts
        {
            let held = self.tasks.count_leased_by(tenant, worker.id()).await?;
            if held >= limit {
                return Err(LeaseError::ConcurrencyLimitExceeded {
                    worker: worker.id(),
                    held,
                    limit,
                });
            }
        }

        let mut bot_access: HashMap<QueueId, bool> = HashMap::new();
        for candidate in self.tasks.find_claimable(tenant).await? {
            if let Some(allowed) = allowed_queues
                && !candidate
                    .queue_id()
                    .is_some_and(|queue_id| allowed.contains(&queue_id))
            {
                continue;
            }
            if worker.is_bot()
                && !self
                    .queue_admits_bots(tenant, candidate.queue_id(), &mut bot_access)
                    .await?
            {
                continue;
            }
            if !self.dependencies_met(tenant, &candidate).await? {
                continue;
            }
            let mut claimed = candidate;
            if claimed.claim(worker.id(), &*self.clock).is_err() {
                continue;
            }
            match self.tasks.update(&claimed).await {
                Ok(committed) => {
                    self.events
                        .record(TaskEvent::new(
                            committed.tenant_id(),
                            committed.id(),
                            TaskEventKind::Claimed {
                                worker: worker.id(),
                            },
                            &*self.clock,
                        ))
                        .await;
                    return Ok(Some(committed));
                }
                Err(err) if err.is_conflict() => {
                    debug!(task = %claimed.id(), "lost claim race; trying next candidate");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(None)
    }

    /// Renews a batch of leases for a worker.
    ///
    /// Identifiers whose lease cannot be renewed land in `invalid`; renewal
    /// carries no cross-task ordering guarantee.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::Repository`] only on persistence-layer
    /// failures; per-task rejections are reported through the report.
    pub async fn heartbeat(
        &self,
        tenant: TenantId,
        worker: WorkerId,
        task_ids: &[TaskId],
    ) -> LeaseResult<HeartbeatReport> {
        let mut report = HeartbeatReport::default();
        for task_id in task_ids {
            if self.renew_one(tenant, worker, *task_id).await? {
                report.valid.push(*task_id);
            } else {
                report.invalid.push(*task_id);
            }
        }
        Ok(report)
    }

    /// Voluntarily releases a lease, returning the task to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::TaskNotFound`] when the task is absent,
    /// [`LeaseError::Domain`] when the caller does not hold a `CheckedOut`
    /// lease, and repository errors otherwise.
    pub async fn release(
        &self,
        tenant: TenantId,
        worker: WorkerId,
        task_id: TaskId,
    ) -> LeaseResult<Task> {
        let mut task = self
            .tasks
            .find_by_id(tenant, task_id)
            .await?
            .ok_or(LeaseError::TaskNotFound(task_id))?;
        task.release(worker, &*self.clock)?;
        let committed = self.tasks.update(&task).await?;
        self.events
            .record(TaskEvent::new(
                committed.tenant_id(),
                committed.id(),
                TaskEventKind::Released { worker },
                &*self.clock,
            ))
            .await;
        Ok(committed)
    }

    /// Resets every lease older than `stale_after` back to `Queued`,
    /// returning how many were reclaimed.
    ///
    /// One bad document cannot halt the sweep: a per-task update failure is
    /// logged and the sweep continues. Running the sweep twice is a no-op
    /// for already-reclaimed tasks.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::Repository`] only when the stale query itself
    /// fails.
    pub async fn release_stale(
        &self,
        tenant: TenantId,
        stale_after: Duration,
    ) -> LeaseResult<usize> {
        let cutoff = self.clock.utc() - stale_after;
        let mut reclaimed = 0;
        for task in self.tasks.find_stale(tenant, cutoff).await? {
            let mut candidate = task;
            if candidate.reclaim(&*self.clock).is_err() {
                continue;
            }
            match self.tasks.update(&candidate).await {
                Ok(committed) => {
                    reclaimed += 1;
                    self.events
                        .record(TaskEvent::new(
                            committed.tenant_id(),
                            committed.id(),
                            TaskEventKind::Reclaimed,
                            &*self.clock,
                        ))
                        .await;
                }
                Err(err) => {
                    warn!(task = %candidate.id(), error = %err, "failed to reclaim stale lease; continuing sweep");
                }
            }
        }
        Ok(reclaimed)
    }

    async fn renew_one(
        &self,
        tenant: TenantId,
        worker: WorkerId,
        task_id: TaskId,
    ) -> LeaseResult<bool> {
        let Some(mut task) = self.tasks.find_by_id(tenant, task_id).await? else {
            return Ok(false);
        };
        if task.touch_lease(worker, &*self.clock).is_err() {
            return Ok(false);
        }
        match self.tasks.update(&task).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_conflict() => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn queue_admits_bots(
        &self,
        tenant: TenantId,
        queue_id: Option<QueueId>,
        cache: &mut HashMap<QueueId, bool>,
    ) -> LeaseResult<bool> {
        // Unrouted items carry no queue policy and stay human-only.
        let Some(target) = queue_id else {
            return Ok(false);
        };
        if let Some(admits) = cache.get(&target) {
            return Ok(*admits);
        }
        let admits = self
            .queues
            .find_by_id(tenant, target)
            .await?
            .is_some_and(|queue| queue.allow_bots());
        cache.insert(target, admits);
        Ok(admits)
    }

    async fn dependencies_met(&self, tenant: TenantId, task: &Task) -> LeaseResult<bool> {
        for dependency in task.depends_on() {
            let met = self
                .tasks
                .find_by_id(tenant, *dependency)
                .await?
                .is_some_and(|dep| dep.status() == TaskStatus::Completed);
            if !met {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
