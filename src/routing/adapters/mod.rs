//! Adapter implementations for the routing ports.

pub mod memory;

pub use memory::{InMemoryAutomationAuditSink, InMemoryDeskRepository, InMemoryRuleRepository};
