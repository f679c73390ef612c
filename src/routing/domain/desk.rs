//! Desk aggregate: a routed destination with membership and coverage.

use super::condition::Condition;
use super::error::RoutingDomainError;
use super::ids::{DeskId, MemberId};
use crate::queue::domain::QueueId;
use crate::task::domain::{Task, TenantId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A person attached to a desk rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskMember {
    member_id: MemberId,
    active: bool,
}

impl DeskMember {
    /// Creates an active member.
    #[must_use]
    pub const fn active(member_id: MemberId) -> Self {
        Self {
            member_id,
            active: true,
        }
    }

    /// Creates an inactive member.
    #[must_use]
    pub const fn inactive(member_id: MemberId) -> Self {
        Self {
            member_id,
            active: false,
        }
    }

    /// Returns the member identifier.
    #[must_use]
    pub const fn member_id(&self) -> MemberId {
        self.member_id
    }

    /// Returns whether the member is currently active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }
}

/// Determines when a desk counts as covered and may receive work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum CoveragePolicy {
    /// Covered while at least one member is active.
    AnyActiveMember,
    /// Covered while at least one of the named members is active.
    Members {
        /// Members whose presence establishes coverage.
        required: BTreeSet<MemberId>,
    },
}

/// A routing rule held by a desk: all conditions must match.
///
/// A rule without conditions matches every work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    conditions: Vec<Condition>,
}

impl RoutingRule {
    /// Creates a rule from its conditions.
    #[must_use]
    pub const fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    /// Creates a rule matching every work item.
    #[must_use]
    pub const fn match_all() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    /// Returns the rule conditions.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Returns `true` when every condition matches the work item.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.conditions.iter().all(|condition| condition.matches(task))
    }
}

/// A desk: a named destination that work items are routed to.
///
/// Desks are evaluated in descending priority order; the first active,
/// covered desk with a matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Desk {
    id: DeskId,
    tenant_id: TenantId,
    name: String,
    priority: i32,
    queue_id: Option<QueueId>,
    active: bool,
    members: Vec<DeskMember>,
    coverage: CoveragePolicy,
    routing_rules: Vec<RoutingRule>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Desk {
    /// Creates a new active desk with no members or rules.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingDomainError::EmptyDeskName`] when the name is blank.
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<Self, RoutingDomainError> {
        let trimmed = name.into().trim().to_owned();
        if trimmed.is_empty() {
            return Err(RoutingDomainError::EmptyDeskName);
        }
        let now = clock.utc();
        Ok(Self {
            id: DeskId::new(),
            tenant_id,
            name: trimmed,
            priority: 0,
            queue_id: None,
            active: true,
            members: Vec::new(),
            coverage: CoveragePolicy::AnyActiveMember,
            routing_rules: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the desk identifier.
    #[must_use]
    pub const fn id(&self) -> DeskId {
        self.id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the desk name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the evaluation priority (higher evaluates first).
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns the queue routed work items are placed on, when set.
    #[must_use]
    pub const fn queue_id(&self) -> Option<QueueId> {
        self.queue_id
    }

    /// Returns whether the desk participates in routing.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Returns the desk members.
    #[must_use]
    pub fn members(&self) -> &[DeskMember] {
        &self.members
    }

    /// Returns the coverage policy.
    #[must_use]
    pub const fn coverage(&self) -> &CoveragePolicy {
        &self.coverage
    }

    /// Returns the routing rules.
    #[must_use]
    pub fn routing_rules(&self) -> &[RoutingRule] {
        &self.routing_rules
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

    /// Sets the evaluation priority.
    pub fn set_priority(&mut self, priority: i32, clock: &impl Clock) {
        self.priority = priority;
        self.touch(clock);
    }

    /// Links the desk to a destination queue.
    pub fn set_queue(&mut self, queue_id: Option<QueueId>, clock: &impl Clock) {
        self.queue_id = queue_id;
        self.touch(clock);
    }

    /// Activates or deactivates the desk.
    pub fn set_active(&mut self, active: bool, clock: &impl Clock) {
        self.active = active;
        self.touch(clock);
    }

    /// Replaces the desk membership roster.
    pub fn set_members(&mut self, members: Vec<DeskMember>, clock: &impl Clock) {
        self.members = members;
        self.touch(clock);
    }

    /// Adds a member to the roster.
    pub fn add_member(&mut self, member: DeskMember, clock: &impl Clock) {
        if self
            .members
            .iter()
            .all(|existing| existing.member_id() != member.member_id())
        {
            self.members.push(member);
        }
        self.touch(clock);
    }

    /// Replaces the coverage policy.
    pub fn set_coverage(&mut self, coverage: CoveragePolicy, clock: &impl Clock) {
        self.coverage = coverage;
        self.touch(clock);
    }

    /// Replaces the routing rules.
    pub fn set_routing_rules(&mut self, rules: Vec<RoutingRule>, clock: &impl Clock) {
        self.routing_rules = rules;
        self.touch(clock);
    }

    /// Returns whether the coverage policy is currently satisfied.
    #[must_use]
    pub fn is_covered(&self) -> bool {
        match &self.coverage {
            CoveragePolicy::AnyActiveMember => {
                self.members.iter().any(DeskMember::is_active)
            }
            CoveragePolicy::Members { required } => self.members.iter().any(|member| {
                member.is_active() && required.contains(&member.member_id())
            }),
        }
    }

    /// Returns `true` when any routing rule matches the work item.
    ///
    /// A desk with no rules matches nothing; routing to it must be explicit.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.routing_rules.iter().any(|rule| rule.matches(task))
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}
