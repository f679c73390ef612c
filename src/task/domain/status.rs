//! Operational status state machine for work items.

use super::ParseTaskStatusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operational lifecycle state of a work item.
///
/// Status answers "is a worker actively holding this item"; it is fully
/// independent of the workflow [`TaskPhase`](super::TaskPhase) axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Eligible for checkout once all dependencies complete.
    Queued,
    /// Exclusively leased by one worker, work not yet started.
    CheckedOut,
    /// The lease holder is actively working on the item.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully with the retry budget exhausted.
    Failed,
    /// Held back by an unmet dependency or an explicit block.
    Blocked,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::CheckedOut => "checked_out",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }

    /// Returns whether the status admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns whether a worker currently holds a lease in this status.
    #[must_use]
    pub const fn is_leased(self) -> bool {
        matches!(self, Self::CheckedOut | Self::InProgress)
    }

    /// Returns whether the status machine permits moving to `target`.
    ///
    /// Allowed edges: Queued → CheckedOut (claim); CheckedOut → InProgress
    /// (start); InProgress → Completed | Failed; CheckedOut/InProgress →
    /// Queued (release, fail-with-retry); any non-terminal → Blocked;
    /// Blocked → Queued (unblock). Completed and Failed are absorbing.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        match self {
            Self::Queued => matches!(target, Self::CheckedOut | Self::Blocked),
            Self::CheckedOut => {
                matches!(target, Self::InProgress | Self::Queued | Self::Blocked)
            }
            Self::InProgress => matches!(
                target,
                Self::Completed | Self::Failed | Self::Queued | Self::Blocked
            ),
            Self::Blocked => matches!(target, Self::Queued),
            Self::Completed | Self::Failed => false,
        }
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "queued" => Ok(Self::Queued),
            "checked_out" => Ok(Self::CheckedOut),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "blocked" => Ok(Self::Blocked),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
