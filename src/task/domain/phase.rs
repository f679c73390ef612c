//! Workflow phase state machine for work items.

use super::ParseTaskPhaseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow-stage axis of a work item.
///
/// Phase answers "where is this item in the business workflow" and varies
/// independently of [`TaskStatus`](super::TaskStatus): phase `InReview`
/// while status `InProgress` means a reviewer is actively holding the item.
/// Neither axis ever changes the other implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    /// Work is being scoped.
    Planning,
    /// Scoped and ready for execution.
    Ready,
    /// Being executed.
    InProgress,
    /// Execution finished, awaiting a reviewer.
    PendingReview,
    /// A reviewer is examining the work.
    InReview,
    /// The reviewer requested changes.
    ChangesRequested,
    /// Accepted; the workflow is finished.
    Approved,
    /// Parked until a sub-playbook completes.
    WaitingOnSubplaybook,
}

impl TaskPhase {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Ready => "ready",
            Self::InProgress => "in_progress",
            Self::PendingReview => "pending_review",
            Self::InReview => "in_review",
            Self::ChangesRequested => "changes_requested",
            Self::Approved => "approved",
            Self::WaitingOnSubplaybook => "waiting_on_subplaybook",
        }
    }

    /// Returns whether the phase admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved)
    }

    /// Returns whether the phase machine permits moving to `target`.
    ///
    /// Allowed edges: Planning → Ready; Ready → InProgress |
    /// WaitingOnSubplaybook; InProgress → PendingReview | Approved;
    /// PendingReview → InReview; InReview → ChangesRequested | Approved;
    /// ChangesRequested → InProgress; WaitingOnSubplaybook → InProgress.
    /// Approved is absorbing.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        match self {
            Self::Planning => matches!(target, Self::Ready),
            Self::Ready => {
                matches!(target, Self::InProgress | Self::WaitingOnSubplaybook)
            }
            Self::InProgress => matches!(target, Self::PendingReview | Self::Approved),
            Self::PendingReview => matches!(target, Self::InReview),
            Self::InReview => matches!(target, Self::ChangesRequested | Self::Approved),
            Self::ChangesRequested | Self::WaitingOnSubplaybook => {
                matches!(target, Self::InProgress)
            }
            Self::Approved => false,
        }
    }
}

impl TryFrom<&str> for TaskPhase {
    type Error = ParseTaskPhaseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "planning" => Ok(Self::Planning),
            "ready" => Ok(Self::Ready),
            "in_progress" => Ok(Self::InProgress),
            "pending_review" => Ok(Self::PendingReview),
            "in_review" => Ok(Self::InReview),
            "changes_requested" => Ok(Self::ChangesRequested),
            "approved" => Ok(Self::Approved),
            "waiting_on_subplaybook" => Ok(Self::WaitingOnSubplaybook),
            _ => Err(ParseTaskPhaseError(value.to_owned())),
        }
    }
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
