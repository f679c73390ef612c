//! Domain model for desk routing and automation rules.

mod automation;
mod condition;
mod desk;
mod error;
mod ids;

pub use automation::{
    AutomationAction, AutomationRule, AutomationTrigger, RolloutStage, RuleDecision,
    rollout_bucket,
};
pub use condition::{Condition, ConditionField, ConditionOperator};
pub use desk::{CoveragePolicy, Desk, DeskMember, RoutingRule};
pub use error::RoutingDomainError;
pub use ids::{DeskId, MemberId, RuleId};
