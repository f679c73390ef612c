//! Caller identity for worker-driven operations.

use super::WorkerId;
use serde::{Deserialize, Serialize};

/// Category of a polling worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    /// A human operator.
    Human,
    /// An automated worker; queue access and concurrency limits apply.
    Bot,
}

/// Identity of the worker issuing a claim, heartbeat, or transition.
///
/// The surrounding session layer is out of scope; callers hand the core an
/// opaque identity with just enough shape for queue-access and concurrency
/// checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRef {
    id: WorkerId,
    kind: WorkerKind,
}

impl WorkerRef {
    /// Creates a worker reference.
    #[must_use]
    pub const fn new(id: WorkerId, kind: WorkerKind) -> Self {
        Self { id, kind }
    }

    /// Creates a human worker reference.
    #[must_use]
    pub const fn human(id: WorkerId) -> Self {
        Self::new(id, WorkerKind::Human)
    }

    /// Creates a bot worker reference.
    #[must_use]
    pub const fn bot(id: WorkerId) -> Self {
        Self::new(id, WorkerKind::Bot)
    }

    /// Returns the worker identifier.
    #[must_use]
    pub const fn id(&self) -> WorkerId {
        self.id
    }

    /// Returns the worker category.
    #[must_use]
    pub const fn kind(&self) -> WorkerKind {
        self.kind
    }

    /// Returns whether this worker is automated.
    #[must_use]
    pub const fn is_bot(&self) -> bool {
        matches!(self.kind, WorkerKind::Bot)
    }
}
