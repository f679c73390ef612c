//! Domain model for work-item lifecycle management.
//!
//! The task domain models tenant-scoped work items with two independent
//! state axes (operational status and workflow phase), lease bookkeeping,
//! retry budgets, and declared dependencies, while keeping all
//! infrastructure concerns outside of the domain boundary.

mod approval;
mod error;
mod ids;
mod phase;
mod status;
mod task;
mod worker;

pub use approval::{ApprovalRouting, ApproverKind};
pub use error::{ParseTaskPhaseError, ParseTaskStatusError, TaskDomainError};
pub use ids::{TaskId, TenantId, WorkerId};
pub use phase::TaskPhase;
pub use status::TaskStatus;
pub use task::{FailOutcome, PersistedTaskData, Task, TaskRef};
pub use worker::{WorkerKind, WorkerRef};
