//! Automation rules with staged rollout gating.
//!
//! Each rule pairs a trigger with AND-combined conditions and an action. The
//! rollout stage decides what happens on a match: `off` rules are skipped
//! entirely, `shadow` rules record the match without executing the action,
//! `partial` rules execute only for a deterministic hash bucket of entities,
//! and `full` rules always execute. Bucketing hashes the rule and task
//! identifiers together so the same entity always lands in the same bucket.

use super::condition::Condition;
use super::error::RoutingDomainError;
use super::ids::{DeskId, RuleId};
use crate::task::domain::{Task, TaskId, TenantId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Lifecycle event that causes a rule to be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationTrigger {
    /// A work item was created.
    TaskCreated,
    /// A work item completed successfully.
    TaskCompleted,
    /// A work item failed terminally.
    TaskFailed,
    /// A work item was routed to a desk.
    TaskRouted,
}

/// Action executed when a rule matches and its rollout stage allows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "value")]
pub enum AutomationAction {
    /// Route the work item to the given desk.
    AssignDesk(DeskId),
    /// Overwrite the work item's claim priority.
    SetPriority(i32),
    /// Append a tag to the work item.
    AddTag(String),
}

/// Rollout stage gating whether a matching rule's action executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "stage")]
pub enum RolloutStage {
    /// Rule is disabled; matches are not even recorded.
    Off,
    /// Matches are recorded but the action never executes.
    Shadow,
    /// Action executes for a deterministic percentage of matching entities.
    Partial {
        /// Bucket percentage in 1..=99; entities bucketed below it execute.
        percentage: u8,
    },
    /// Action always executes on a match.
    Full,
}

impl RolloutStage {
    /// Creates a partial stage, validating the percentage bound.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingDomainError::InvalidRolloutPercentage`] when the
    /// percentage is outside 1..=99.
    pub const fn partial(percentage: u8) -> Result<Self, RoutingDomainError> {
        if percentage == 0 || percentage > 99 {
            return Err(RoutingDomainError::InvalidRolloutPercentage(percentage));
        }
        Ok(Self::Partial { percentage })
    }
}

/// Outcome of evaluating one rule against one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleDecision {
    /// The rule is switched off.
    Off,
    /// The conditions did not all match.
    NotMatched,
    /// The rule matched but is shadowed; the action must not run.
    Shadowed {
        /// Indexes of the conditions that matched (all of them).
        matched_conditions: Vec<usize>,
    },
    /// The rule matched but the entity's bucket falls outside the rollout.
    SkippedBucket {
        /// The entity's deterministic bucket in 0..=99.
        bucket: u8,
    },
    /// The rule matched and the action should execute.
    Execute {
        /// Indexes of the conditions that matched (all of them).
        matched_conditions: Vec<usize>,
    },
}

/// An automation rule owned by a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationRule {
    id: RuleId,
    tenant_id: TenantId,
    name: String,
    trigger: AutomationTrigger,
    conditions: Vec<Condition>,
    action: AutomationAction,
    rollout: RolloutStage,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AutomationRule {
    /// Creates a new rule, initially in the `off` stage.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingDomainError::EmptyRuleName`] when the name is blank.
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        trigger: AutomationTrigger,
        conditions: Vec<Condition>,
        action: AutomationAction,
        clock: &impl Clock,
    ) -> Result<Self, RoutingDomainError> {
        let trimmed = name.into().trim().to_owned();
        if trimmed.is_empty() {
            return Err(RoutingDomainError::EmptyRuleName);
        }
        let now = clock.utc();
        Ok(Self {
            id: RuleId::new(),
            tenant_id,
            name: trimmed,
            trigger,
            conditions,
            action,
            rollout: RolloutStage::Off,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the rule identifier.
    #[must_use]
    pub const fn id(&self) -> RuleId {
        self.id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the trigger.
    #[must_use]
    pub const fn trigger(&self) -> AutomationTrigger {
        self.trigger
    }

    /// Returns the AND-combined conditions.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Returns the action.
    #[must_use]
    pub const fn action(&self) -> &AutomationAction {
        &self.action
    }

    /// Returns the rollout stage.
    #[must_use]
    pub const fn rollout(&self) -> RolloutStage {
        self.rollout
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last-modified timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Advances the rule to a new rollout stage.
    pub fn set_rollout(&mut self, rollout: RolloutStage, clock: &impl Clock) {
        self.rollout = rollout;
        self.updated_at = clock.utc();
    }

    /// Evaluates the rule against a work item.
    ///
    /// The decision carries everything the caller needs: whether to record
    /// the match, whether to execute the action, and which bucket gated a
    /// partial rollout.
    #[must_use]
    pub fn evaluate(&self, task: &Task) -> RuleDecision {
        if self.rollout == RolloutStage::Off {
            return RuleDecision::Off;
        }
        if !self.conditions.iter().all(|condition| condition.matches(task)) {
            return RuleDecision::NotMatched;
        }
        let matched_conditions: Vec<usize> = (0..self.conditions.len()).collect();
        match self.rollout {
            RolloutStage::Off => RuleDecision::Off,
            RolloutStage::Shadow => RuleDecision::Shadowed { matched_conditions },
            RolloutStage::Partial { percentage } => {
                let bucket = rollout_bucket(self.id, task.id());
                if bucket < percentage {
                    RuleDecision::Execute { matched_conditions }
                } else {
                    RuleDecision::SkippedBucket { bucket }
                }
            }
            RolloutStage::Full => RuleDecision::Execute { matched_conditions },
        }
    }
}

/// Deterministic bucket in 0..=99 for a (rule, entity) pair.
///
/// The same pair always buckets identically, so partial rollouts never flap
/// between invocations.
#[must_use]
#[expect(
    clippy::big_endian_bytes,
    reason = "bucket assignment must be byte-order independent across hosts"
)]
pub fn rollout_bucket(rule_id: RuleId, task_id: TaskId) -> u8 {
    let mut hasher = Sha256::new();
    hasher.update(rule_id.into_inner().as_bytes());
    hasher.update(task_id.into_inner().as_bytes());
    let digest = hasher.finalize();
    let head = digest
        .as_slice()
        .first_chunk::<8>()
        .copied()
        .unwrap_or([0; 8]);
    let hash = u64::from_be_bytes(head);
    // Multiply-shift maps the hash uniformly onto 0..=99 without division.
    let scaled = (u128::from(hash) * 100) >> 64;
    u8::try_from(scaled).unwrap_or(u8::MAX)
}
