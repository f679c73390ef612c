//! Adapter implementations for queue ports.

pub mod memory;
