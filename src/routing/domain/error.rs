//! Error types for the routing domain.

use thiserror::Error;

/// Validation errors raised by routing domain constructors and mutators.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingDomainError {
    /// Desk names must not be empty.
    #[error("desk name must not be empty")]
    EmptyDeskName,

    /// Automation rule names must not be empty.
    #[error("automation rule name must not be empty")]
    EmptyRuleName,

    /// Partial rollout percentages are bounded to 1..=99.
    #[error("rollout percentage {0} is out of range (expected 1..=99)")]
    InvalidRolloutPercentage(u8),
}
