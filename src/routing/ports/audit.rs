//! Audit sink port for automation rule evaluations.
//!
//! Every matching evaluation is recorded regardless of whether the action
//! executed. Shadow rollouts rely on this record being the rule's only
//! observable effect.

use crate::routing::domain::{RuleDecision, RuleId};
use crate::task::domain::{TaskId, TenantId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;

/// How a matching rule was dispositioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleDisposition {
    /// The match was recorded but the action was suppressed (shadow stage).
    Shadowed,
    /// The action executed.
    Executed,
    /// The entity's rollout bucket fell outside the partial percentage.
    SkippedBucket {
        /// The entity's deterministic bucket in 0..=99.
        bucket: u8,
    },
}

/// Record of one matching rule evaluation against one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEvaluation {
    tenant_id: TenantId,
    rule_id: RuleId,
    rule_name: String,
    task_id: TaskId,
    matched_conditions: Vec<usize>,
    disposition: RuleDisposition,
    occurred_at: DateTime<Utc>,
}

impl RuleEvaluation {
    /// Creates an evaluation record stamped with the current time.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        rule_id: RuleId,
        rule_name: impl Into<String>,
        task_id: TaskId,
        matched_conditions: Vec<usize>,
        disposition: RuleDisposition,
        clock: &impl Clock,
    ) -> Self {
        Self {
            tenant_id,
            rule_id,
            rule_name: rule_name.into(),
            task_id,
            matched_conditions,
            disposition,
            occurred_at: clock.utc(),
        }
    }

    /// Returns the owning tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the evaluated rule's identifier.
    #[must_use]
    pub const fn rule_id(&self) -> RuleId {
        self.rule_id
    }

    /// Returns the evaluated rule's name.
    #[must_use]
    pub fn rule_name(&self) -> &str {
        &self.rule_name
    }

    /// Returns the evaluated work item.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the indexes of the conditions that matched.
    #[must_use]
    pub fn matched_conditions(&self) -> &[usize] {
        &self.matched_conditions
    }

    /// Returns the disposition.
    #[must_use]
    pub const fn disposition(&self) -> &RuleDisposition {
        &self.disposition
    }

    /// Returns when the evaluation happened.
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

impl RuleDisposition {
    /// Derives the disposition from a matching decision, when one applies.
    ///
    /// `Off` and `NotMatched` decisions produce no audit record.
    #[must_use]
    pub fn from_decision(decision: &RuleDecision) -> Option<Self> {
        match decision {
            RuleDecision::Off | RuleDecision::NotMatched => None,
            RuleDecision::Shadowed { .. } => Some(Self::Shadowed),
            RuleDecision::SkippedBucket { bucket } => {
                Some(Self::SkippedBucket { bucket: *bucket })
            }
            RuleDecision::Execute { .. } => Some(Self::Executed),
        }
    }
}

/// Destination for rule evaluation records.
///
/// Recording is best-effort and infallible from the caller's perspective;
/// implementations log and swallow their own failures.
#[async_trait]
pub trait AutomationAuditSink: Send + Sync {
    /// Records one evaluation.
    async fn record(&self, evaluation: RuleEvaluation);
}
