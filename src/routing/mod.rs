//! Desk routing and staged automation for Foreman.
//!
//! Routing assigns unassigned work items to the best-matching desk using
//! declarative first-match rules, skipping desks without coverage. The
//! automation engine evaluates trigger/condition/action rules gated by a
//! rollout stage: `shadow` records matches without side effects, `partial`
//! executes for a deterministic hash bucket of entities, `full` always
//! executes. The module follows hexagonal architecture:
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
