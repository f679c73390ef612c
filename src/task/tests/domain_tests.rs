//! Unit tests for the work-item aggregate.

use crate::queue::domain::QueueId;
use crate::routing::domain::DeskId;
use crate::task::domain::{
    FailOutcome, Task, TaskDomainError, TaskPhase, TaskStatus, TenantId, WorkerId,
};
use eyre::{bail, ensure};
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use serde_json::json;
use std::collections::BTreeSet;

#[fixture]
fn clock() -> DefaultClock {
    DefaultClock
}

#[fixture]
fn queued_task(clock: DefaultClock) -> Result<Task, TaskDomainError> {
    Task::new(TenantId::new(), "Reconcile invoices", &clock)
}

#[rstest]
fn new_task_starts_queued_in_planning(
    queued_task: Result<Task, TaskDomainError>,
) -> eyre::Result<()> {
    let task = queued_task?;
    ensure!(task.status() == TaskStatus::Queued);
    ensure!(task.phase() == TaskPhase::Planning);
    ensure!(task.checked_out_by().is_none());
    ensure!(task.version() == 0);
    Ok(())
}

#[rstest]
fn new_task_trims_title(clock: DefaultClock) -> eyre::Result<()> {
    let task = Task::new(TenantId::new(), "  padded title  ", &clock)?;
    ensure!(task.title() == "padded title");
    Ok(())
}

#[rstest]
#[case("")]
#[case("   ")]
fn new_task_rejects_blank_title(clock: DefaultClock, #[case] title: &str) {
    let result = Task::new(TenantId::new(), title, &clock);
    assert_eq!(result, Err(TaskDomainError::EmptyTitle));
}

#[rstest]
fn claim_sets_lease_fields(
    clock: DefaultClock,
    queued_task: Result<Task, TaskDomainError>,
) -> eyre::Result<()> {
    let mut task = queued_task?;
    let worker = WorkerId::new();

    task.claim(worker, &clock)?;

    ensure!(task.status() == TaskStatus::CheckedOut);
    ensure!(task.checked_out_by() == Some(worker));
    ensure!(task.checked_out_at().is_some());
    Ok(())
}

#[rstest]
fn claim_rejected_when_not_queued(
    clock: DefaultClock,
    queued_task: Result<Task, TaskDomainError>,
) -> eyre::Result<()> {
    let mut task = queued_task?;
    let task_id = task.id();
    task.claim(WorkerId::new(), &clock)?;

    let result = task.claim(WorkerId::new(), &clock);
    let expected = Err(TaskDomainError::InvalidTransition {
        task_id,
        from: TaskStatus::CheckedOut,
        to: TaskStatus::CheckedOut,
    });
    if result != expected {
        bail!("expected {expected:?}, got {result:?}");
    }
    Ok(())
}

#[rstest]
fn start_requires_lease_ownership(
    clock: DefaultClock,
    queued_task: Result<Task, TaskDomainError>,
) -> eyre::Result<()> {
    let mut task = queued_task?;
    let holder = WorkerId::new();
    let intruder = WorkerId::new();
    task.claim(holder, &clock)?;

    let result = task.start(intruder, &clock);
    let expected = Err(TaskDomainError::LeaseOwnerMismatch {
        task_id: task.id(),
        held_by: holder,
        caller: intruder,
    });
    if result != expected {
        bail!("expected {expected:?}, got {result:?}");
    }
    ensure!(task.status() == TaskStatus::CheckedOut);
    Ok(())
}

#[rstest]
fn start_rejected_without_checkout(
    clock: DefaultClock,
    queued_task: Result<Task, TaskDomainError>,
) -> eyre::Result<()> {
    let mut task = queued_task?;
    let result = task.start(WorkerId::new(), &clock);
    ensure!(matches!(
        result,
        Err(TaskDomainError::NotCheckedOut { status: TaskStatus::Queued, .. })
    ));
    Ok(())
}

#[rstest]
fn complete_clears_lease_and_stores_output(
    clock: DefaultClock,
    queued_task: Result<Task, TaskDomainError>,
) -> eyre::Result<()> {
    let mut task = queued_task?;
    let worker = WorkerId::new();
    task.claim(worker, &clock)?;
    task.start(worker, &clock)?;

    task.complete(worker, Some(json!({"records": 42})), &clock)?;

    ensure!(task.status() == TaskStatus::Completed);
    ensure!(task.checked_out_by().is_none());
    ensure!(task.checked_out_at().is_none());
    ensure!(task.completed_at().is_some());
    ensure!(task.output() == Some(&json!({"records": 42})));
    Ok(())
}

#[rstest]
fn fail_with_budget_requeues_and_consumes_retry(
    clock: DefaultClock,
    queued_task: Result<Task, TaskDomainError>,
) -> eyre::Result<()> {
    let mut task = queued_task?;
    task.set_max_retries(3, &clock);
    let worker = WorkerId::new();
    task.claim(worker, &clock)?;
    task.start(worker, &clock)?;

    let outcome = task.fail(worker, "transient upstream error", true, &clock)?;

    ensure!(outcome == FailOutcome::Requeued);
    ensure!(task.status() == TaskStatus::Queued);
    ensure!(task.retry_count() == 1);
    ensure!(task.checked_out_by().is_none());
    ensure!(task.failure_reason().is_none());
    Ok(())
}

#[rstest]
fn fourth_failure_exhausts_a_budget_of_three(
    clock: DefaultClock,
    queued_task: Result<Task, TaskDomainError>,
) -> eyre::Result<()> {
    let mut task = queued_task?;
    task.set_max_retries(3, &clock);
    let worker = WorkerId::new();

    for attempt in 1..=3u32 {
        task.claim(worker, &clock)?;
        task.start(worker, &clock)?;
        let outcome = task.fail(worker, "still broken", true, &clock)?;
        ensure!(outcome == FailOutcome::Requeued, "attempt {attempt}");
        ensure!(task.status() == TaskStatus::Queued, "attempt {attempt}");
        ensure!(task.retry_count() == attempt);
    }

    task.claim(worker, &clock)?;
    task.start(worker, &clock)?;
    let outcome = task.fail(worker, "still broken", true, &clock)?;

    ensure!(outcome == FailOutcome::Exhausted);
    ensure!(task.status() == TaskStatus::Failed);
    ensure!(task.retry_count() == 3);
    ensure!(task.failure_reason() == Some("still broken"));
    ensure!(task.failed_at().is_some());
    Ok(())
}

#[rstest]
fn fail_without_retry_is_terminal_even_with_budget(
    clock: DefaultClock,
    queued_task: Result<Task, TaskDomainError>,
) -> eyre::Result<()> {
    let mut task = queued_task?;
    task.set_max_retries(5, &clock);
    let worker = WorkerId::new();
    task.claim(worker, &clock)?;
    task.start(worker, &clock)?;

    let outcome = task.fail(worker, "unrecoverable", false, &clock)?;

    ensure!(outcome == FailOutcome::Exhausted);
    ensure!(task.status() == TaskStatus::Failed);
    ensure!(task.retry_count() == 0);
    Ok(())
}

#[rstest]
fn release_returns_checked_out_task_to_pool(
    clock: DefaultClock,
    queued_task: Result<Task, TaskDomainError>,
) -> eyre::Result<()> {
    let mut task = queued_task?;
    let worker = WorkerId::new();
    task.claim(worker, &clock)?;

    task.release(worker, &clock)?;

    ensure!(task.status() == TaskStatus::Queued);
    ensure!(task.checked_out_by().is_none());
    Ok(())
}

#[rstest]
fn reclaim_needs_no_owner_but_requires_checkout(
    clock: DefaultClock,
    queued_task: Result<Task, TaskDomainError>,
) -> eyre::Result<()> {
    let mut task = queued_task?;
    task.claim(WorkerId::new(), &clock)?;

    task.reclaim(&clock)?;
    ensure!(task.status() == TaskStatus::Queued);
    ensure!(task.checked_out_by().is_none());

    ensure!(task.reclaim(&clock).is_err());
    Ok(())
}

#[rstest]
fn touch_lease_renews_only_for_the_holder(
    clock: DefaultClock,
    queued_task: Result<Task, TaskDomainError>,
) -> eyre::Result<()> {
    let mut task = queued_task?;
    let holder = WorkerId::new();
    task.claim(holder, &clock)?;
    let leased_at = task.checked_out_at();

    ensure!(task.touch_lease(WorkerId::new(), &clock).is_err());
    task.touch_lease(holder, &clock)?;
    ensure!(task.checked_out_at() >= leased_at);
    Ok(())
}

#[rstest]
fn block_clears_lease_and_unblock_requeues(
    clock: DefaultClock,
    queued_task: Result<Task, TaskDomainError>,
) -> eyre::Result<()> {
    let mut task = queued_task?;
    task.claim(WorkerId::new(), &clock)?;

    task.block(&clock)?;
    ensure!(task.status() == TaskStatus::Blocked);
    ensure!(task.checked_out_by().is_none());

    task.unblock(&clock)?;
    ensure!(task.status() == TaskStatus::Queued);
    Ok(())
}

#[rstest]
fn set_dependencies_rejects_self_reference(
    clock: DefaultClock,
    queued_task: Result<Task, TaskDomainError>,
) -> eyre::Result<()> {
    let mut task = queued_task?;
    let deps = BTreeSet::from([task.id()]);
    let result = task.set_dependencies(deps, &clock);
    ensure!(result == Err(TaskDomainError::SelfDependency(task.id())));
    ensure!(task.depends_on().is_empty());
    Ok(())
}

#[rstest]
fn phase_moves_independently_of_status(
    clock: DefaultClock,
    queued_task: Result<Task, TaskDomainError>,
) -> eyre::Result<()> {
    let mut task = queued_task?;
    let worker = WorkerId::new();
    task.claim(worker, &clock)?;
    task.start(worker, &clock)?;

    task.set_phase(TaskPhase::Ready, &clock)?;
    task.set_phase(TaskPhase::InProgress, &clock)?;
    task.set_phase(TaskPhase::PendingReview, &clock)?;
    task.set_phase(TaskPhase::InReview, &clock)?;

    ensure!(task.status() == TaskStatus::InProgress);
    ensure!(task.phase() == TaskPhase::InReview);
    ensure!(task.checked_out_by() == Some(worker));
    Ok(())
}

#[rstest]
fn route_to_inherits_queue_only_when_unset(
    clock: DefaultClock,
    queued_task: Result<Task, TaskDomainError>,
) -> eyre::Result<()> {
    let mut task = queued_task?;
    let desk = DeskId::new();
    let desk_queue = QueueId::new();

    task.route_to(desk, Some(desk_queue), &clock);
    ensure!(task.desk_id() == Some(desk));
    ensure!(task.queue_id() == Some(desk_queue));

    let other_desk = DeskId::new();
    task.route_to(other_desk, Some(QueueId::new()), &clock);
    ensure!(task.desk_id() == Some(other_desk));
    ensure!(task.queue_id() == Some(desk_queue), "existing queue kept");
    Ok(())
}

#[rstest]
fn add_tag_ignores_duplicates(
    clock: DefaultClock,
    queued_task: Result<Task, TaskDomainError>,
) -> eyre::Result<()> {
    let mut task = queued_task?;
    task.add_tag("billing", &clock);
    task.add_tag("billing", &clock);
    ensure!(task.tags() == ["billing".to_owned()]);
    Ok(())
}

#[rstest]
fn claim_order_prefers_lower_priority_then_age(clock: DefaultClock) -> eyre::Result<()> {
    let tenant = TenantId::new();
    let mut urgent = Task::new(tenant, "urgent", &clock)?;
    urgent.set_priority(1, &clock);
    let mut routine = Task::new(tenant, "routine", &clock)?;
    routine.set_priority(5, &clock);

    ensure!(urgent.claim_order_key() < routine.claim_order_key());
    Ok(())
}

#[rstest]
fn tasks_serialize_with_snake_case_states(
    queued_task: Result<Task, TaskDomainError>,
) -> eyre::Result<()> {
    let task = queued_task?;
    let value = serde_json::to_value(&task)?;
    ensure!(value.get("status") == Some(&json!("queued")));
    ensure!(value.get("phase") == Some(&json!("planning")));
    Ok(())
}
