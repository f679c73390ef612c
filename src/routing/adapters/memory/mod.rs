//! In-memory adapters for the routing ports.

mod audit;
mod desk;
mod rule;

pub use audit::InMemoryAutomationAuditSink;
pub use desk::InMemoryDeskRepository;
pub use rule::InMemoryRuleRepository;
