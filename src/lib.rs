//! Foreman: work-item orchestration core.
//!
//! This crate provides the scheduling heart shared by task-queue services:
//! scoped queues with atomic at-most-once checkout, a dual status/phase
//! state model, an acyclic dependency graph with cascading unblock, desk
//! routing with staged automation rules, and stale-lease reclamation.
//!
//! # Architecture
//!
//! Foreman follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (in-memory store, sinks)
//!
//! All shared mutable state lives behind the store ports; every mutation is
//! a single version-guarded read-modify-write, so two racing callers never
//! both win and no in-process lock is held across a store call.
//!
//! # Modules
//!
//! - [`task`]: Work items, state machines, leases, and the dependency graph
//! - [`queue`]: Scoped queues and their administrative guards
//! - [`routing`]: Desk matching and staged automation rules
//! - [`reclaimer`]: Background stale-lease reclamation loop

pub mod queue;
pub mod reclaimer;
pub mod routing;
pub mod task;
