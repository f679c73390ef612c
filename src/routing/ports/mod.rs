//! Port contracts for routing persistence and audit.

mod audit;
mod repository;

pub use audit::{AutomationAuditSink, RuleDisposition, RuleEvaluation};
pub use repository::{
    AutomationRuleRepository, DeskRepository, DeskRepositoryError, DeskRepositoryResult,
    RuleRepositoryError, RuleRepositoryResult,
};
