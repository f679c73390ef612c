//! Work-item lifecycle orchestration.
//!
//! Creation validates the dependency set entirely before the insert; a task
//! created with unmet dependencies lands as `Blocked` rather than `Queued`.
//! Completion commits the terminal state first and only then drives the
//! dependency cascade, so a crash between the two leaves a consistent store
//! that the next completion or sweep repairs.

use crate::task::domain::{
    ApprovalRouting, FailOutcome, Task, TaskDomainError, TaskId, TaskPhase, TaskStatus,
    TenantId, WorkerId,
};
use crate::task::ports::{
    TaskEvent, TaskEventKind, TaskEventSink, TaskRepository, TaskRepositoryError,
};
use crate::task::services::dependency::{DependencyError, DependencyService};
use crate::queue::domain::QueueId;
use mockable::Clock;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// Request payload for creating a work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    tenant_id: TenantId,
    title: String,
    queue_id: Option<QueueId>,
    kind: Option<String>,
    tags: Vec<String>,
    customer: Option<String>,
    priority: Option<i32>,
    depends_on: BTreeSet<TaskId>,
    max_retries: Option<u32>,
    approval: Option<ApprovalRouting>,
    approval_required: bool,
    assigned_to: Option<WorkerId>,
}

impl CreateTaskRequest {
    /// Creates a request with required fields.
    #[must_use]
    pub fn new(tenant_id: TenantId, title: impl Into<String>) -> Self {
        Self {
            tenant_id,
            title: title.into(),
            queue_id: None,
            kind: None,
            tags: Vec::new(),
            customer: None,
            priority: None,
            depends_on: BTreeSet::new(),
            max_retries: None,
            approval: None,
            approval_required: false,
            assigned_to: None,
        }
    }

    /// Targets a queue directly instead of waiting for routing.
    #[must_use]
    pub const fn in_queue(mut self, queue_id: QueueId) -> Self {
        self.queue_id = Some(queue_id);
        self
    }

    /// Sets the work-item kind used by routing conditions.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Sets the routing tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the customer reference.
    #[must_use]
    pub fn with_customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = Some(customer.into());
        self
    }

    /// Sets the claim priority (lower claims first).
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Declares upstream dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, depends_on: BTreeSet<TaskId>) -> Self {
        self.depends_on = depends_on;
        self
    }

    /// Sets the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Declares approval routing.
    #[must_use]
    pub const fn with_approval(mut self, approval: ApprovalRouting) -> Self {
        self.approval = Some(approval);
        self.approval_required = true;
        self
    }

    /// Sets the long-lived assignee.
    #[must_use]
    pub const fn assigned_to(mut self, worker: WorkerId) -> Self {
        self.assigned_to = Some(worker);
        self
    }
}

/// Service-level errors for lifecycle operations.
#[derive(Debug, Error)]
pub enum TaskLifecycleError {
    /// Domain validation or a state machine guard rejected the request.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),

    /// Task repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),

    /// Dependency validation or the cascade failed.
    #[error(transparent)]
    Dependency(#[from] DependencyError),

    /// The task was not found in the tenant.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
}

/// Result type for lifecycle operations.
pub type TaskLifecycleResult<T> = Result<T, TaskLifecycleError>;

/// Outcome of completing a work item.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteOutcome {
    /// The completed task as committed.
    pub task: Task,
    /// Dependents unblocked by the cascade.
    pub unblocked: usize,
}

/// Outcome of reporting a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct FailReport {
    /// The task as committed.
    pub task: Task,
    /// Whether a retry was granted or the budget is exhausted.
    pub outcome: FailOutcome,
}

/// Work-item lifecycle service.
pub struct TaskLifecycleService<T, E, C>
where
    T: TaskRepository,
    E: TaskEventSink,
    C: Clock + Send + Sync,
{
    tasks: Arc<T>,
    events: Arc<E>,
    clock: Arc<C>,
    dependencies: DependencyService<T, E, C>,
}

// Handles share state through the inner `Arc`s, so cloning must not demand
// `Clone` of the collaborators themselves.
impl<T, E, C> Clone for TaskLifecycleService<T, E, C>
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
            dependencies: self.dependencies.clone(),
        }
    }
}

impl<T, E, C> TaskLifecycleService<T, E, C>
where
    T: TaskRepository,
    E: TaskEventSink,
    C: Clock + Send + Sync,
{
    /// Creates a new lifecycle service.
    #[must_use]
    pub fn new(tasks: Arc<T>, events: Arc<E>, clock: Arc<C>) -> Self {
        let dependencies =
            DependencyService::new(Arc::clone(&tasks), Arc::clone(&events), Arc::clone(&clock));
        Self {
            tasks,
            events,
            clock,
            dependencies,
        }
    }

    /// Returns the dependency service sharing this service's store.
    #[must_use]
    pub const fn dependencies(&self) -> &DependencyService<T, E, C> {
        &self.dependencies
    }

    /// Creates and persists a work item.
    ///
    /// The dependency set is validated entirely before the insert; when any
    /// dependency is not yet complete the item is created as `Blocked`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Dependency`] on dangling or cyclic
    /// dependencies, [`TaskLifecycleError::Domain`] on validation failures,
    /// and repository errors otherwise.
    pub async fn create_task(&self, request: CreateTaskRequest) -> TaskLifecycleResult<Task> {
        self.dependencies
            .validate(request.tenant_id, None, &request.depends_on)
            .await?;

        let mut task = Task::new(request.tenant_id, request.title, &*self.clock)?;
        task.set_queue(request.queue_id, &*self.clock);
        task.set_kind(request.kind, &*self.clock);
        if !request.tags.is_empty() {
            task.set_tags(request.tags, &*self.clock);
        }
        task.set_customer(request.customer, &*self.clock);
        if let Some(priority) = request.priority {
            task.set_priority(priority, &*self.clock);
        }
        if let Some(max_retries) = request.max_retries {
            task.set_max_retries(max_retries, &*self.clock);
        }
        if request.approval.is_some() {
            task.set_approval(request.approval, request.approval_required, &*self.clock);
        }
        if request.assigned_to.is_some() {
            task.assign(request.assigned_to, &*self.clock);
        }
        if !request.depends_on.is_empty() {
            task.set_dependencies(request.depends_on, &*self.clock)?;
            let check = self
                .dependencies
                .dependencies_met(request.tenant_id, &task)
                .await?;
            if !check.all_met {
                task.block(&*self.clock)?;
            }
        }
        self.tasks.insert(&task).await?;
        Ok(task)
    }

    /// Finds a task by identifier within a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when the lookup fails.
    pub async fn find_task(
        &self,
        tenant: TenantId,
        task_id: TaskId,
    ) -> TaskLifecycleResult<Option<Task>> {
        Ok(self.tasks.find_by_id(tenant, task_id).await?)
    }

    /// Starts work on a checked-out item.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] when the caller does not hold
    /// a `CheckedOut` lease, and repository errors otherwise.
    pub async fn start(
        &self,
        tenant: TenantId,
        caller: WorkerId,
        task_id: TaskId,
    ) -> TaskLifecycleResult<Task> {
        let mut task = self.fetch(tenant, task_id).await?;
        task.start(caller, &*self.clock)?;
        let committed = self.tasks.update(&task).await?;
        self.record(&committed, TaskEventKind::Started { worker: caller })
            .await;
        Ok(committed)
    }

    /// Completes an in-progress item and cascades the unblock to its
    /// dependents.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] when the transition is
    /// invalid or the caller does not hold the lease, and repository errors
    /// otherwise.
    pub async fn complete(
        &self,
        tenant: TenantId,
        caller: WorkerId,
        task_id: TaskId,
        output: Option<Value>,
    ) -> TaskLifecycleResult<CompleteOutcome> {
        let mut task = self.fetch(tenant, task_id).await?;
        task.complete(caller, output, &*self.clock)?;
        let committed = self.tasks.update(&task).await?;
        self.record(&committed, TaskEventKind::Completed { worker: caller })
            .await;
        let unblocked = self
            .dependencies
            .unblock_dependents(tenant, committed.id())
            .await?;
        Ok(CompleteOutcome {
            task: committed,
            unblocked,
        })
    }

    /// Reports a failure, consuming a retry when requested and budgeted.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] when the transition is
    /// invalid or the caller does not hold the lease, and repository errors
    /// otherwise.
    pub async fn fail(
        &self,
        tenant: TenantId,
        caller: WorkerId,
        task_id: TaskId,
        reason: impl Into<String> + Send,
        retry: bool,
    ) -> TaskLifecycleResult<FailReport> {
        let reason_text = reason.into();
        let mut task = self.fetch(tenant, task_id).await?;
        let outcome = task.fail(caller, reason_text.clone(), retry, &*self.clock)?;
        let committed = self.tasks.update(&task).await?;
        self.record(
            &committed,
            TaskEventKind::Failed {
                worker: caller,
                reason: reason_text,
                retried: outcome == FailOutcome::Requeued,
            },
        )
        .await;
        Ok(FailReport {
            task: committed,
            outcome,
        })
    }

    /// Explicitly blocks a non-terminal item, clearing any held lease.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] when the task is already
    /// terminal, and repository errors otherwise.
    pub async fn block(&self, tenant: TenantId, task_id: TaskId) -> TaskLifecycleResult<Task> {
        let mut task = self.fetch(tenant, task_id).await?;
        task.block(&*self.clock)?;
        Ok(self.tasks.update(&task).await?)
    }

    /// Moves the workflow phase along one validated edge.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] when the phase table does not
    /// contain the requested edge, and repository errors otherwise.
    pub async fn set_phase(
        &self,
        tenant: TenantId,
        task_id: TaskId,
        phase: TaskPhase,
    ) -> TaskLifecycleResult<Task> {
        let mut task = self.fetch(tenant, task_id).await?;
        task.set_phase(phase, &*self.clock)?;
        Ok(self.tasks.update(&task).await?)
    }

    /// Replaces a task's dependency set, re-deriving its blocked state.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Dependency`] on dangling or cyclic
    /// dependencies and repository errors otherwise.
    pub async fn set_dependencies(
        &self,
        tenant: TenantId,
        task_id: TaskId,
        depends_on: BTreeSet<TaskId>,
    ) -> TaskLifecycleResult<Task> {
        self.dependencies
            .validate(tenant, Some(task_id), &depends_on)
            .await?;
        let mut task = self.fetch(tenant, task_id).await?;
        task.set_dependencies(depends_on, &*self.clock)?;
        let check = self.dependencies.dependencies_met(tenant, &task).await?;
        if check.all_met {
            if task.status() == TaskStatus::Blocked {
                task.unblock(&*self.clock)?;
            }
        } else if task.status() == TaskStatus::Queued {
            task.block(&*self.clock)?;
        }
        Ok(self.tasks.update(&task).await?)
    }

    async fn fetch(&self, tenant: TenantId, task_id: TaskId) -> TaskLifecycleResult<Task> {
        self.tasks
            .find_by_id(tenant, task_id)
            .await?
            .ok_or(TaskLifecycleError::TaskNotFound(task_id))
    }

    async fn record(&self, task: &Task, kind: TaskEventKind) {
        self.events
            .record(TaskEvent::new(
                task.tenant_id(),
                task.id(),
                kind,
                &*self.clock,
            ))
            .await;
    }
}
