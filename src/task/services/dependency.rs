//! Dependency graph validation and cascade-unblock.
//!
//! Validation happens entirely before any write: a proposed dependency set
//! is rejected on self-reference, dangling reference, or cycle without
//! touching the store. The unblock cascade recomputes "are all dependencies
//! met" from current store state instead of decrementing a counter, so
//! concurrent completions of sibling dependencies converge correctly in any
//! interleaving.

use crate::task::domain::{Task, TaskDomainError, TaskId, TaskRef, TaskStatus, TenantId};
use crate::task::ports::{
    TaskEvent, TaskEventKind, TaskEventSink, TaskRepository, TaskRepositoryError,
};
use mockable::Clock;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Service-level errors for dependency operations.
#[derive(Debug, Error)]
pub enum DependencyError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),

    /// Task repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),

    /// A proposed dependency does not exist in the tenant.
    #[error("dependency {0} does not exist")]
    DanglingDependency(TaskId),

    /// The proposed edge would close a cycle.
    #[error("dependency on {dependency} would create a cycle through task {task_id}")]
    DependencyCycle {
        /// Task whose dependency set was being changed.
        task_id: TaskId,
        /// Proposed dependency that is already downstream of the task.
        dependency: TaskId,
    },
}

/// Result type for dependency operations.
pub type DependencyResult<T> = Result<T, DependencyError>;

/// Outcome of checking a task's dependency set against current store state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCheck {
    /// Whether every dependency is `Completed`.
    pub all_met: bool,
    /// Dependencies that are not yet complete.
    pub incomplete: Vec<TaskRef>,
}

/// Both directions of a task's dependency neighbourhood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyView {
    /// Tasks this task depends on.
    pub upstream: Vec<TaskRef>,
    /// Tasks that depend on this task.
    pub downstream: Vec<TaskRef>,
}

/// Dependency graph service.
pub struct DependencyService<T, E, C>
where
    T: TaskRepository,
    E: TaskEventSink,
    C: Clock + Send + Sync,
{
    tasks: Arc<T>,
    events: Arc<E>,
    clock: Arc<C>,
}

// Handles share state through the inner `Arc`s, so cloning must not demand
// `Clone` of the collaborators themselves.
impl<T, E, C> Clone for DependencyService<T, E, C>
where
    T: TaskRepository,
    E: TaskEventSink,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            tasks: Arc::clone(&self.tasks),
            events: Arc::clone(&self.events),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<T, E, C> DependencyService<T, E, C>
where
    T: TaskRepository,
    E: TaskEventSink,
    C: Clock + Send + Sync,
{
    /// Creates a new dependency service.
    #[must_use]
    pub const fn new(tasks: Arc<T>, events: Arc<E>, clock: Arc<C>) -> Self {
        Self {
            tasks,
            events,
            clock,
        }
    }

    /// Validates a proposed dependency set before any write.
    ///
    /// `subject` is `None` when the set belongs to a task that does not
    /// exist yet; a brand-new node has no dependents, so only existence is
    /// checked.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::SelfDependency`] (wrapped) on a
    /// self-reference, [`DependencyError::DanglingDependency`] when a
    /// dependency does not exist in the tenant, and
    /// [`DependencyError::DependencyCycle`] when a proposed dependency is
    /// already downstream of the subject.
    pub async fn validate(
        &self,
        tenant: TenantId,
        subject: Option<TaskId>,
        proposed: &BTreeSet<TaskId>,
    ) -> DependencyResult<()> {
        if let Some(subject_id) = subject
            && proposed.contains(&subject_id)
        {
            return Err(TaskDomainError::SelfDependency(subject_id).into());
        }
        for dependency in proposed {
            if self.tasks.find_by_id(tenant, *dependency).await?.is_none() {
                return Err(DependencyError::DanglingDependency(*dependency));
            }
        }
        if let Some(subject_id) = subject {
            let downstream = self.reachable_downstream(tenant, subject_id).await?;
            if let Some(conflict) = proposed.iter().find(|dep| downstream.contains(dep)) {
                return Err(DependencyError::DependencyCycle {
                    task_id: subject_id,
                    dependency: *conflict,
                });
            }
        }
        Ok(())
    }

    /// Checks a task's stored dependency set against current store state.
    ///
    /// A dependency that is absent from the store counts as unmet.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::Repository`] when a lookup fails.
    pub async fn dependencies_met(
        &self,
        tenant: TenantId,
        task: &Task,
    ) -> DependencyResult<DependencyCheck> {
        let mut all_met = true;
        let mut incomplete = Vec::new();
        for dependency in task.depends_on() {
            match self.tasks.find_by_id(tenant, *dependency).await? {
                Some(dep) if dep.status() == TaskStatus::Completed => {}
                Some(dep) => {
                    all_met = false;
                    incomplete.push(TaskRef::from_task(&dep));
                }
                None => all_met = false,
            }
        }
        Ok(DependencyCheck {
            all_met,
            incomplete,
        })
    }

    /// Unblocks every `Blocked` dependent of a completed task whose full
    /// dependency set is now met, returning how many were unblocked.
    ///
    /// Each unblock is a conditional write; a lost race means a concurrent
    /// sibling completion already handled (or re-blocked) the dependent, so
    /// the loser skips it. Running the cascade twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::Repository`] when a query fails.
    pub async fn unblock_dependents(
        &self,
        tenant: TenantId,
        completed: TaskId,
    ) -> DependencyResult<usize> {
        let blocked = self.tasks.find_blocked_depending_on(tenant, completed).await?;
        let mut unblocked = 0;
        for task in blocked {
            let check = self.dependencies_met(tenant, &task).await?;
            if !check.all_met {
                continue;
            }
            let mut candidate = task;
            if candidate.unblock(&*self.clock).is_err() {
                continue;
            }
            match self.tasks.update(&candidate).await {
                Ok(committed) => {
                    unblocked += 1;
                    self.events
                        .record(TaskEvent::new(
                            committed.tenant_id(),
                            committed.id(),
                            TaskEventKind::Unblocked {
                                dependency: completed,
                            },
                            &*self.clock,
                        ))
                        .await;
                }
                Err(err) if err.is_conflict() => {
                    debug!(task = %candidate.id(), "dependent changed concurrently; skipping unblock");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(unblocked)
    }

    /// Returns the task's direct upstream and downstream neighbours.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::Repository`] when a lookup fails, or
    /// [`TaskRepositoryError::NotFound`] (wrapped) when the task is absent.
    pub async fn dependency_view(
        &self,
        tenant: TenantId,
        task_id: TaskId,
    ) -> DependencyResult<DependencyView> {
        let task = self
            .tasks
            .find_by_id(tenant, task_id)
            .await?
            .ok_or(TaskRepositoryError::NotFound(task_id))?;
        let mut upstream = Vec::new();
        for dependency in task.depends_on() {
            if let Some(dep) = self.tasks.find_by_id(tenant, *dependency).await? {
                upstream.push(TaskRef::from_task(&dep));
            }
        }
        let downstream = self
            .tasks
            .find_dependents(tenant, task_id)
            .await?
            .iter()
            .map(TaskRef::from_task)
            .collect();
        Ok(DependencyView {
            upstream,
            downstream,
        })
    }

    /// Breadth-first traversal of everything that transitively depends on
    /// `root`. Bounded by the visited set, so a pre-existing (invalid) cycle
    /// cannot loop forever.
    async fn reachable_downstream(
        &self,
        tenant: TenantId,
        root: TaskId,
    ) -> DependencyResult<BTreeSet<TaskId>> {
        let mut visited = BTreeSet::new();
        let mut frontier = VecDeque::from([root]);
        while let Some(current) = frontier.pop_front() {
            for dependent in self.tasks.find_dependents(tenant, current).await? {
                if visited.insert(dependent.id()) {
                    frontier.push_back(dependent.id());
                }
            }
        }
        Ok(visited)
    }
}
