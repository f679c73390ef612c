//! Error types for task domain validation and state transitions.

use super::{TaskId, TaskPhase, TaskStatus, WorkerId};
use thiserror::Error;

/// Errors returned while mutating or constructing domain task values.
///
/// Messages deliberately name the offending identifier and the observed
/// state so an operator can diagnose a rejected request without reading
/// process logs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The requested status edge is not in the transition table.
    #[error("task {task_id} is in status {from}, cannot transition to {to}")]
    InvalidTransition {
        /// Task whose transition was rejected.
        task_id: TaskId,
        /// Status observed at rejection time.
        from: TaskStatus,
        /// Requested target status.
        to: TaskStatus,
    },

    /// The requested phase edge is not in the phase transition table.
    #[error("task {task_id} is in phase {from}, cannot transition to {to}")]
    InvalidPhaseTransition {
        /// Task whose phase change was rejected.
        task_id: TaskId,
        /// Phase observed at rejection time.
        from: TaskPhase,
        /// Requested target phase.
        to: TaskPhase,
    },

    /// A worker-driven operation requires the task to be checked out first.
    #[error("task {task_id} is in status {status}, cannot start without checkout")]
    NotCheckedOut {
        /// Task the worker attempted to operate on.
        task_id: TaskId,
        /// Status observed at rejection time.
        status: TaskStatus,
    },

    /// The caller is not the current lease holder.
    #[error("task {task_id} is leased by {held_by}, not by caller {caller}")]
    LeaseOwnerMismatch {
        /// Task whose lease was contested.
        task_id: TaskId,
        /// Worker currently holding the lease.
        held_by: WorkerId,
        /// Worker that issued the rejected request.
        caller: WorkerId,
    },

    /// The task declared itself as its own dependency.
    #[error("task {0} cannot depend on itself")]
    SelfDependency(TaskId),

    /// The work-item title is empty after trimming.
    #[error("work item title must not be empty")]
    EmptyTitle,
}

/// Error returned while parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

/// Error returned while parsing task phases from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task phase: {0}")]
pub struct ParseTaskPhaseError(pub String);
