//! Application services for routing and automation.

mod automation;
mod matcher;

pub use automation::{
    AutomationResult, AutomationService, AutomationServiceError, TriggerOutcome,
};
pub use matcher::{RoutingResult, RoutingService, RoutingServiceError};
