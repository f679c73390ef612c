//! Application services orchestrating the work-item lifecycle.

mod dependency;
mod lease;
mod lifecycle;

pub use dependency::{
    DependencyCheck, DependencyError, DependencyResult, DependencyService, DependencyView,
};
pub use lease::{HeartbeatReport, LeaseConfig, LeaseError, LeaseResult, LeaseService};
pub use lifecycle::{
    CompleteOutcome, CreateTaskRequest, FailReport, TaskLifecycleError, TaskLifecycleResult,
    TaskLifecycleService,
};
