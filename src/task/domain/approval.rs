//! Optional approval routing attached to a work item.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of principal expected to approve a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproverKind {
    /// A named individual.
    User,
    /// Any member of a team.
    Team,
    /// Any member of a routing desk.
    Desk,
}

/// Declares who must approve a work item before its phase may reach
/// `Approved`.
///
/// The approval workflow itself (notification, sign-off capture) lives in
/// collaborating services; the core only carries the routing declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRouting {
    approver_kind: ApproverKind,
    approver_id: Uuid,
}

impl ApprovalRouting {
    /// Creates an approval routing declaration.
    #[must_use]
    pub const fn new(approver_kind: ApproverKind, approver_id: Uuid) -> Self {
        Self {
            approver_kind,
            approver_id,
        }
    }

    /// Returns the kind of approving principal.
    #[must_use]
    pub const fn approver_kind(&self) -> ApproverKind {
        self.approver_kind
    }

    /// Returns the identifier of the approving principal.
    #[must_use]
    pub const fn approver_id(&self) -> Uuid {
        self.approver_id
    }
}
