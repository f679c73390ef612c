//! Scoped work queues for Foreman.
//!
//! Queues own the membership side of the orchestration core: each work item
//! belongs to at most one queue, and each queue targets exactly one scope
//! (organisation-wide, a team, or a single user). System queues and queues
//! still referenced by tasks are protected from deletion. The module follows
//! hexagonal architecture:
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
