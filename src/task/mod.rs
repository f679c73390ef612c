//! Work-item lifecycle management for Foreman.
//!
//! This module owns the orchestration core proper: creating work items with
//! validated dependencies, enforcing the operational status and workflow
//! phase state machines, claiming items under at-most-once lease semantics,
//! and cascading unblocks through the dependency graph when upstream work
//! completes. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
