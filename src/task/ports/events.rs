//! Audit-event port for observable lifecycle milestones.
//!
//! Every externally meaningful transition (claim, start, complete, fail,
//! release, reclaim, unblock, route) is recorded through this port so that
//! operators can reconstruct a work item's history without reading process
//! logs.

use crate::routing::domain::DeskId;
use crate::task::domain::{TaskId, TenantId, WorkerId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Milestone category for a task audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEventKind {
    /// A worker won the claim race.
    Claimed {
        /// Worker now holding the lease.
        worker: WorkerId,
    },
    /// The lease holder started work.
    Started {
        /// Worker that started work.
        worker: WorkerId,
    },
    /// The lease holder completed work.
    Completed {
        /// Worker that completed work.
        worker: WorkerId,
    },
    /// The lease holder reported failure.
    Failed {
        /// Worker that reported the failure.
        worker: WorkerId,
        /// Operator-facing failure reason.
        reason: String,
        /// Whether a retry was granted.
        retried: bool,
    },
    /// The lease holder gave the item back voluntarily.
    Released {
        /// Worker that released the lease.
        worker: WorkerId,
    },
    /// The stale-lease reclaimer reset an expired lease.
    Reclaimed,
    /// A completed dependency unblocked this item.
    Unblocked {
        /// The dependency whose completion triggered the unblock.
        dependency: TaskId,
    },
    /// The routing matcher assigned a desk.
    Routed {
        /// Winning desk.
        desk: DeskId,
    },
}

/// A recorded lifecycle milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEvent {
    tenant_id: TenantId,
    task_id: TaskId,
    kind: TaskEventKind,
    occurred_at: DateTime<Utc>,
}

impl TaskEvent {
    /// Creates an event stamped with the current clock time.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        task_id: TaskId,
        kind: TaskEventKind,
        clock: &impl Clock,
    ) -> Self {
        Self {
            tenant_id,
            task_id,
            kind,
            occurred_at: clock.utc(),
        }
    }

    /// Returns the tenant scope.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the subject task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the milestone category.
    #[must_use]
    pub const fn kind(&self) -> &TaskEventKind {
        &self.kind
    }

    /// Returns when the milestone occurred.
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Sink contract for task audit events.
///
/// Recording is best-effort from the caller's perspective: services emit
/// events after the corresponding state is durably committed, and a sink
/// failure must not roll the transition back.
#[async_trait]
pub trait TaskEventSink: Send + Sync {
    /// Records one audit event.
    async fn record(&self, event: TaskEvent);
}
