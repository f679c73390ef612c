//! Work-item aggregate root and lifecycle transitions.

use super::{ApprovalRouting, TaskDomainError, TaskId, TaskPhase, TaskStatus, TenantId, WorkerId};
use crate::queue::domain::QueueId;
use crate::routing::domain::DeskId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Outcome of a failure report, decided by the retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// A retry was granted; the task re-entered the queue pool.
    Requeued,
    /// The retry budget is spent (or retry was declined); the task is
    /// terminally failed.
    Exhausted,
}

/// Work-item aggregate root.
///
/// Two state axes are tracked independently: [`TaskStatus`] (operational,
/// "is a worker holding this") and [`TaskPhase`] (workflow, "where is this
/// in the business process"). No mutation on one axis ever implicitly
/// changes the other.
///
/// Invariants maintained by every mutation:
/// - `checked_out_by` is `Some` iff `status` is `CheckedOut` or `InProgress`
/// - `retry_count <= max_retries`
/// - `depends_on` never contains the task's own id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    tenant_id: TenantId,
    queue_id: Option<QueueId>,
    desk_id: Option<DeskId>,
    title: String,
    kind: Option<String>,
    tags: Vec<String>,
    customer: Option<String>,
    status: TaskStatus,
    phase: TaskPhase,
    priority: i32,
    depends_on: BTreeSet<TaskId>,
    assigned_to: Option<WorkerId>,
    checked_out_by: Option<WorkerId>,
    checked_out_at: Option<DateTime<Utc>>,
    retry_count: u32,
    max_retries: u32,
    approval_required: bool,
    approval: Option<ApprovalRouting>,
    output: Option<Value>,
    failure_reason: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

/// Parameter object for reconstructing a persisted work item.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning queue, if routed.
    pub queue_id: Option<QueueId>,
    /// Assigned desk, if routed.
    pub desk_id: Option<DeskId>,
    /// Persisted title.
    pub title: String,
    /// Work-item kind used by routing conditions.
    pub kind: Option<String>,
    /// Tags used by routing conditions.
    pub tags: Vec<String>,
    /// Customer reference used by routing conditions.
    pub customer: Option<String>,
    /// Persisted operational status.
    pub status: TaskStatus,
    /// Persisted workflow phase.
    pub phase: TaskPhase,
    /// Claim priority (lower claims first).
    pub priority: i32,
    /// Upstream dependency identifiers.
    pub depends_on: BTreeSet<TaskId>,
    /// Long-lived assignee, if any.
    pub assigned_to: Option<WorkerId>,
    /// Current lease holder, if any.
    pub checked_out_by: Option<WorkerId>,
    /// Lease acquisition time, if leased.
    pub checked_out_at: Option<DateTime<Utc>>,
    /// Retries consumed.
    pub retry_count: u32,
    /// Retry budget.
    pub max_retries: u32,
    /// Whether approval is required before the phase may reach `Approved`.
    pub approval_required: bool,
    /// Approval routing declaration, if any.
    pub approval: Option<ApprovalRouting>,
    /// Completion output, if completed.
    pub output: Option<Value>,
    /// Failure reason, if terminally failed.
    pub failure_reason: Option<String>,
    /// When work started, if ever started.
    pub started_at: Option<DateTime<Utc>>,
    /// When work completed, if completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// When the task terminally failed, if failed.
    pub failed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency token.
    pub version: u64,
}

impl Task {
    /// Creates a new work item in `Queued` status and `Planning` phase.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] when the title is blank.
    pub fn new(
        tenant_id: TenantId,
        title: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<Self, TaskDomainError> {
        let trimmed = title.into().trim().to_owned();
        if trimmed.is_empty() {
            return Err(TaskDomainError::EmptyTitle);
        }
        let timestamp = clock.utc();
        Ok(Self {
            id: TaskId::new(),
            tenant_id,
            queue_id: None,
            desk_id: None,
            title: trimmed,
            kind: None,
            tags: Vec::new(),
            customer: None,
            status: TaskStatus::Queued,
            phase: TaskPhase::Planning,
            priority: 0,
            depends_on: BTreeSet::new(),
            assigned_to: None,
            checked_out_by: None,
            checked_out_at: None,
            retry_count: 0,
            max_retries: 0,
            approval_required: false,
            approval: None,
            output: None,
            failure_reason: None,
            started_at: None,
            completed_at: None,
            failed_at: None,
            created_at: timestamp,
            updated_at: timestamp,
            version: 0,
        })
    }

    /// Reconstructs a work item from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            tenant_id: data.tenant_id,
            queue_id: data.queue_id,
            desk_id: data.desk_id,
            title: data.title,
            kind: data.kind,
            tags: data.tags,
            customer: data.customer,
            status: data.status,
            phase: data.phase,
            priority: data.priority,
            depends_on: data.depends_on,
            assigned_to: data.assigned_to,
            checked_out_by: data.checked_out_by,
            checked_out_at: data.checked_out_at,
            retry_count: data.retry_count,
            max_retries: data.max_retries,
            approval_required: data.approval_required,
            approval: data.approval,
            output: data.output,
            failure_reason: data.failure_reason,
            started_at: data.started_at,
            completed_at: data.completed_at,
            failed_at: data.failed_at,
            created_at: data.created_at,
            updated_at: data.updated_at,
            version: data.version,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the owning queue, if routed.
    #[must_use]
    pub const fn queue_id(&self) -> Option<QueueId> {
        self.queue_id
    }

    /// Returns the assigned desk, if routed.
    #[must_use]
    pub const fn desk_id(&self) -> Option<DeskId> {
        self.desk_id
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the work-item kind used by routing conditions.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    /// Returns the routing tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the customer reference used by routing conditions.
    #[must_use]
    pub fn customer(&self) -> Option<&str> {
        self.customer.as_deref()
    }

    /// Returns the operational status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the workflow phase.
    #[must_use]
    pub const fn phase(&self) -> TaskPhase {
        self.phase
    }

    /// Returns the claim priority (lower claims first).
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns the upstream dependency identifiers.
    #[must_use]
    pub const fn depends_on(&self) -> &BTreeSet<TaskId> {
        &self.depends_on
    }

    /// Returns the long-lived assignee, if any.
    #[must_use]
    pub const fn assigned_to(&self) -> Option<WorkerId> {
        self.assigned_to
    }

    /// Returns the current lease holder, if any.
    #[must_use]
    pub const fn checked_out_by(&self) -> Option<WorkerId> {
        self.checked_out_by
    }

    /// Returns the lease acquisition time, if leased.
    #[must_use]
    pub const fn checked_out_at(&self) -> Option<DateTime<Utc>> {
        self.checked_out_at
    }

    /// Returns the retries consumed so far.
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the retry budget.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns whether approval is required.
    #[must_use]
    pub const fn approval_required(&self) -> bool {
        self.approval_required
    }

    /// Returns the approval routing declaration, if any.
    #[must_use]
    pub const fn approval(&self) -> Option<&ApprovalRouting> {
        self.approval.as_ref()
    }

    /// Returns the completion output, if completed.
    #[must_use]
    pub const fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    /// Returns the failure reason, if terminally failed.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Returns when work started, if it ever started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns when work completed, if completed.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns when the task terminally failed, if failed.
    #[must_use]
    pub const fn failed_at(&self) -> Option<DateTime<Utc>> {
        self.failed_at
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the optimistic-concurrency token.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Returns the strict-weak claim ordering key: priority ascending, then
    /// creation time ascending, then id for a deterministic tie-break.
    #[must_use]
    pub const fn claim_order_key(&self) -> (i32, DateTime<Utc>, TaskId) {
        (self.priority, self.created_at, self.id)
    }

    /// Sets the claim priority.
    pub fn set_priority(&mut self, priority: i32, clock: &impl Clock) {
        self.priority = priority;
        self.touch(clock);
    }

    /// Sets the owning queue.
    pub fn set_queue(&mut self, queue_id: Option<QueueId>, clock: &impl Clock) {
        self.queue_id = queue_id;
        self.touch(clock);
    }

    /// Sets the work-item kind.
    pub fn set_kind(&mut self, kind: Option<String>, clock: &impl Clock) {
        self.kind = kind;
        self.touch(clock);
    }

    /// Replaces the routing tags.
    pub fn set_tags(&mut self, tags: Vec<String>, clock: &impl Clock) {
        self.tags = tags;
        self.touch(clock);
    }

    /// Adds a routing tag unless already present.
    pub fn add_tag(&mut self, tag: impl Into<String>, clock: &impl Clock) {
        let tag_value = tag.into();
        if !self.tags.contains(&tag_value) {
            self.tags.push(tag_value);
            self.touch(clock);
        }
    }

    /// Sets the customer reference.
    pub fn set_customer(&mut self, customer: Option<String>, clock: &impl Clock) {
        self.customer = customer;
        self.touch(clock);
    }

    /// Sets the retry budget.
    pub fn set_max_retries(&mut self, max_retries: u32, clock: &impl Clock) {
        self.max_retries = max_retries;
        self.touch(clock);
    }

    /// Sets the approval declaration.
    pub fn set_approval(
        &mut self,
        approval: Option<ApprovalRouting>,
        required: bool,
        clock: &impl Clock,
    ) {
        self.approval = approval;
        self.approval_required = required;
        self.touch(clock);
    }

    /// Sets the long-lived assignee.
    pub fn assign(&mut self, assignee: Option<WorkerId>, clock: &impl Clock) {
        self.assigned_to = assignee;
        self.touch(clock);
    }

    /// Replaces the dependency set.
    ///
    /// Cycle and dangling-reference validation happens in the dependency
    /// service before any write; the aggregate only enforces the local
    /// self-reference invariant.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::SelfDependency`] when the set contains the
    /// task's own id.
    pub fn set_dependencies(
        &mut self,
        depends_on: BTreeSet<TaskId>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        if depends_on.contains(&self.id) {
            return Err(TaskDomainError::SelfDependency(self.id));
        }
        self.depends_on = depends_on;
        self.touch(clock);
        Ok(())
    }

    /// Records the routing decision: the winning desk, and the desk's queue
    /// when the item has none yet.
    pub fn route_to(
        &mut self,
        desk_id: DeskId,
        desk_queue: Option<QueueId>,
        clock: &impl Clock,
    ) {
        self.desk_id = Some(desk_id);
        if self.queue_id.is_none() {
            self.queue_id = desk_queue;
        }
        self.touch(clock);
    }

    /// Claims the task for `worker`: `Queued` → `CheckedOut` with the lease
    /// fields set.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] unless the task is
    /// currently `Queued`.
    pub fn claim(&mut self, worker: WorkerId, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.ensure_transition(TaskStatus::CheckedOut)?;
        self.status = TaskStatus::CheckedOut;
        self.checked_out_by = Some(worker);
        self.checked_out_at = Some(clock.utc());
        self.touch(clock);
        Ok(())
    }

    /// Starts work: `CheckedOut` → `InProgress`, recording `started_at`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::NotCheckedOut`] unless the task is
    /// `CheckedOut`, or [`TaskDomainError::LeaseOwnerMismatch`] when the
    /// caller does not hold the lease.
    pub fn start(&mut self, caller: WorkerId, clock: &impl Clock) -> Result<(), TaskDomainError> {
        if self.status != TaskStatus::CheckedOut {
            return Err(TaskDomainError::NotCheckedOut {
                task_id: self.id,
                status: self.status,
            });
        }
        self.ensure_holder(caller)?;
        self.status = TaskStatus::InProgress;
        self.started_at = Some(clock.utc());
        self.touch(clock);
        Ok(())
    }

    /// Completes work: `InProgress` → `Completed`, clearing the lease and
    /// storing the output.
    ///
    /// The phase axis is untouched; the dependency cascade is driven by the
    /// lifecycle service after this state is durably committed.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] unless the task is
    /// `InProgress`, or [`TaskDomainError::LeaseOwnerMismatch`] when the
    /// caller does not hold the lease.
    pub fn complete(
        &mut self,
        caller: WorkerId,
        output: Option<Value>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        self.ensure_transition(TaskStatus::Completed)?;
        self.ensure_holder(caller)?;
        self.status = TaskStatus::Completed;
        self.output = output;
        self.completed_at = Some(clock.utc());
        self.clear_lease();
        self.touch(clock);
        Ok(())
    }

    /// Reports a failure. With `retry` requested and budget remaining the
    /// task consumes one retry and re-enters the pool (`Queued`); otherwise
    /// it fails terminally with the reason recorded.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] unless the task is
    /// `InProgress`, or [`TaskDomainError::LeaseOwnerMismatch`] when the
    /// caller does not hold the lease.
    pub fn fail(
        &mut self,
        caller: WorkerId,
        reason: impl Into<String>,
        retry: bool,
        clock: &impl Clock,
    ) -> Result<FailOutcome, TaskDomainError> {
        if self.status != TaskStatus::InProgress {
            return Err(TaskDomainError::InvalidTransition {
                task_id: self.id,
                from: self.status,
                to: TaskStatus::Failed,
            });
        }
        self.ensure_holder(caller)?;
        if retry && self.retry_count < self.max_retries {
            self.retry_count = self.retry_count.saturating_add(1);
            self.status = TaskStatus::Queued;
            self.clear_lease();
            self.touch(clock);
            return Ok(FailOutcome::Requeued);
        }
        self.status = TaskStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.failed_at = Some(clock.utc());
        self.clear_lease();
        self.touch(clock);
        Ok(FailOutcome::Exhausted)
    }

    /// Voluntarily releases the lease: `CheckedOut` → `Queued`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] unless the task is
    /// `CheckedOut`, or [`TaskDomainError::LeaseOwnerMismatch`] when the
    /// caller does not hold the lease.
    pub fn release(&mut self, caller: WorkerId, clock: &impl Clock) -> Result<(), TaskDomainError> {
        if self.status != TaskStatus::CheckedOut {
            return Err(TaskDomainError::InvalidTransition {
                task_id: self.id,
                from: self.status,
                to: TaskStatus::Queued,
            });
        }
        self.ensure_holder(caller)?;
        self.status = TaskStatus::Queued;
        self.clear_lease();
        self.touch(clock);
        Ok(())
    }

    /// Reclaims a stale lease: `CheckedOut` → `Queued` without an ownership
    /// check. Used by the stale-lease reclaimer only.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] unless the task is
    /// `CheckedOut`.
    pub fn reclaim(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        if self.status != TaskStatus::CheckedOut {
            return Err(TaskDomainError::InvalidTransition {
                task_id: self.id,
                from: self.status,
                to: TaskStatus::Queued,
            });
        }
        self.status = TaskStatus::Queued;
        self.clear_lease();
        self.touch(clock);
        Ok(())
    }

    /// Renews the lease by bumping `checked_out_at` to now.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::NotCheckedOut`] unless the task is leased,
    /// or [`TaskDomainError::LeaseOwnerMismatch`] when the caller does not
    /// hold the lease.
    pub fn touch_lease(
        &mut self,
        caller: WorkerId,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        if !self.status.is_leased() {
            return Err(TaskDomainError::NotCheckedOut {
                task_id: self.id,
                status: self.status,
            });
        }
        self.ensure_holder(caller)?;
        self.checked_out_at = Some(clock.utc());
        self.touch(clock);
        Ok(())
    }

    /// Blocks the task: any non-terminal status → `Blocked`, clearing any
    /// lease to keep the lease invariant.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] when the task is
    /// terminal or already blocked.
    pub fn block(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.ensure_transition(TaskStatus::Blocked)?;
        self.status = TaskStatus::Blocked;
        self.clear_lease();
        self.touch(clock);
        Ok(())
    }

    /// Unblocks the task: `Blocked` → `Queued`. Callers must have verified
    /// that every dependency is complete.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] unless the task is
    /// `Blocked`.
    pub fn unblock(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        if self.status != TaskStatus::Blocked {
            return Err(TaskDomainError::InvalidTransition {
                task_id: self.id,
                from: self.status,
                to: TaskStatus::Queued,
            });
        }
        self.status = TaskStatus::Queued;
        self.touch(clock);
        Ok(())
    }

    /// Moves the workflow phase along one validated edge. The status axis is
    /// never touched: a phase change while a worker holds the item is
    /// legitimate (for example `InReview` while `InProgress`).
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidPhaseTransition`] when the phase
    /// table does not contain the requested edge.
    pub fn set_phase(
        &mut self,
        target: TaskPhase,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        if !self.phase.can_transition_to(target) {
            return Err(TaskDomainError::InvalidPhaseTransition {
                task_id: self.id,
                from: self.phase,
                to: target,
            });
        }
        self.phase = target;
        self.touch(clock);
        Ok(())
    }

    /// Bumps the optimistic-concurrency token. Called by repository
    /// adapters on successful conditional update.
    pub(crate) fn bump_version(&mut self) {
        self.version = self.version.saturating_add(1);
    }

    fn ensure_transition(&self, to: TaskStatus) -> Result<(), TaskDomainError> {
        if self.status.can_transition_to(to) {
            return Ok(());
        }
        Err(TaskDomainError::InvalidTransition {
            task_id: self.id,
            from: self.status,
            to,
        })
    }

    fn ensure_holder(&self, caller: WorkerId) -> Result<(), TaskDomainError> {
        match self.checked_out_by {
            Some(held_by) if held_by == caller => Ok(()),
            Some(held_by) => Err(TaskDomainError::LeaseOwnerMismatch {
                task_id: self.id,
                held_by,
                caller,
            }),
            None => Err(TaskDomainError::NotCheckedOut {
                task_id: self.id,
                status: self.status,
            }),
        }
    }

    #[expect(
        clippy::missing_const_for_fn,
        reason = "&mut self methods cannot be const in stable Rust"
    )]
    fn clear_lease(&mut self) {
        self.checked_out_by = None;
        self.checked_out_at = None;
    }

    /// Updates the `updated_at` timestamp to the current clock time.
    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}

/// Lightweight projection of a task for dependency diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    /// Referenced task identifier.
    pub id: TaskId,
    /// Referenced task title.
    pub title: String,
    /// Status at projection time.
    pub status: TaskStatus,
}

impl TaskRef {
    /// Projects a reference from a full task.
    #[must_use]
    pub fn from_task(task: &Task) -> Self {
        Self {
            id: task.id(),
            title: task.title().to_owned(),
            status: task.status(),
        }
    }
}
