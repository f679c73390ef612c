//! Service tests for dependency validation and cascade-unblock.

use crate::task::adapters::memory::{InMemoryTaskEventSink, InMemoryTaskRepository};
use crate::task::domain::{Task, TaskDomainError, TaskId, TaskStatus, TenantId, WorkerId};
use crate::task::ports::{TaskEventKind, TaskRepository};
use crate::task::services::{DependencyError, DependencyService};
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use std::collections::BTreeSet;
use std::sync::Arc;

type TestDependencyService =
    DependencyService<InMemoryTaskRepository, InMemoryTaskEventSink, DefaultClock>;

struct Harness {
    tasks: Arc<InMemoryTaskRepository>,
    events: Arc<InMemoryTaskEventSink>,
    service: TestDependencyService,
    tenant: TenantId,
}

#[fixture]
fn harness() -> Harness {
    let tasks = Arc::new(InMemoryTaskRepository::new());
    let events = Arc::new(InMemoryTaskEventSink::new());
    let service = DependencyService::new(
        Arc::clone(&tasks),
        Arc::clone(&events),
        Arc::new(DefaultClock),
    );
    Harness {
        tasks,
        events,
        service,
        tenant: TenantId::new(),
    }
}

async fn seed(harness: &Harness, title: &str, depends_on: &[TaskId]) -> Task {
    let clock = DefaultClock;
    let mut task = Task::new(harness.tenant, title, &clock).expect("valid title");
    if !depends_on.is_empty() {
        task.set_dependencies(depends_on.iter().copied().collect(), &clock)
            .expect("no self dependency");
        task.block(&clock).expect("queued task can block");
    }
    harness.tasks.insert(&task).await.expect("insert succeeds");
    task
}

async fn seed_completed(harness: &Harness, title: &str) -> Task {
    let clock = DefaultClock;
    let worker = WorkerId::new();
    let mut task = Task::new(harness.tenant, title, &clock).expect("valid title");
    task.claim(worker, &clock).expect("claim from queued");
    task.start(worker, &clock).expect("start from checked out");
    task.complete(worker, None, &clock).expect("complete from in progress");
    harness.tasks.insert(&task).await.expect("insert succeeds");
    task
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn validate_rejects_dangling_dependency(harness: Harness) {
    let missing = TaskId::new();
    let result = harness
        .service
        .validate(harness.tenant, None, &BTreeSet::from([missing]))
        .await;
    assert!(matches!(
        result,
        Err(DependencyError::DanglingDependency(id)) if id == missing
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn validate_rejects_self_dependency(harness: Harness) {
    let task = seed(&harness, "solo", &[]).await;
    let result = harness
        .service
        .validate(harness.tenant, Some(task.id()), &BTreeSet::from([task.id()]))
        .await;
    assert!(matches!(
        result,
        Err(DependencyError::Domain(TaskDomainError::SelfDependency(id))) if id == task.id()
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn validate_rejects_transitive_cycle_and_leaves_edges_unchanged(harness: Harness) {
    // a depends on b, b depends on c; c proposing a dependency on a closes
    // the loop.
    let c = seed(&harness, "c", &[]).await;
    let b = seed(&harness, "b", &[c.id()]).await;
    let a = seed(&harness, "a", &[b.id()]).await;

    let result = harness
        .service
        .validate(harness.tenant, Some(c.id()), &BTreeSet::from([a.id()]))
        .await;

    assert!(matches!(
        result,
        Err(DependencyError::DependencyCycle { task_id, dependency })
            if task_id == c.id() && dependency == a.id()
    ));
    let stored_c = harness
        .tasks
        .find_by_id(harness.tenant, c.id())
        .await
        .expect("lookup succeeds")
        .expect("task exists");
    assert!(stored_c.depends_on().is_empty(), "validation never writes");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dependencies_met_lists_incomplete_upstreams(harness: Harness) {
    let done = seed_completed(&harness, "done").await;
    let pending = seed(&harness, "pending", &[]).await;
    let subject = seed(&harness, "subject", &[done.id(), pending.id()]).await;

    let check = harness
        .service
        .dependencies_met(harness.tenant, &subject)
        .await
        .expect("check succeeds");

    assert!(!check.all_met);
    assert_eq!(check.incomplete.len(), 1);
    assert_eq!(check.incomplete[0].id, pending.id());
    assert_eq!(check.incomplete[0].status, TaskStatus::Queued);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unblock_waits_for_the_full_dependency_set(harness: Harness) {
    let first = seed_completed(&harness, "first sibling").await;
    let second = seed(&harness, "second sibling", &[]).await;
    let dependent = seed(&harness, "dependent", &[first.id(), second.id()]).await;

    let unblocked = harness
        .service
        .unblock_dependents(harness.tenant, first.id())
        .await
        .expect("cascade succeeds");
    assert_eq!(unblocked, 0, "one sibling still incomplete");

    // Complete the second sibling and cascade from it.
    let clock = DefaultClock;
    let worker = WorkerId::new();
    let mut finishing = harness
        .tasks
        .find_by_id(harness.tenant, second.id())
        .await
        .expect("lookup succeeds")
        .expect("task exists");
    finishing.claim(worker, &clock).expect("claim");
    finishing.start(worker, &clock).expect("start");
    finishing.complete(worker, None, &clock).expect("complete");
    harness.tasks.update(&finishing).await.expect("update succeeds");

    let released = harness
        .service
        .unblock_dependents(harness.tenant, second.id())
        .await
        .expect("cascade succeeds");
    assert_eq!(released, 1);

    let stored = harness
        .tasks
        .find_by_id(harness.tenant, dependent.id())
        .await
        .expect("lookup succeeds")
        .expect("task exists");
    assert_eq!(stored.status(), TaskStatus::Queued);
    assert!(harness.events.recorded().iter().any(|event| {
        event.task_id() == dependent.id()
            && matches!(
                event.kind(),
                TaskEventKind::Unblocked { dependency } if *dependency == second.id()
            )
    }));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cascade_is_idempotent(harness: Harness) {
    let upstream = seed_completed(&harness, "upstream").await;
    seed(&harness, "dependent", &[upstream.id()]).await;

    let first = harness
        .service
        .unblock_dependents(harness.tenant, upstream.id())
        .await
        .expect("cascade succeeds");
    // Repeating through another worker's handle changes nothing.
    let second = harness
        .service
        .clone()
        .unblock_dependents(harness.tenant, upstream.id())
        .await
        .expect("cascade succeeds");

    assert_eq!(first, 1);
    assert_eq!(second, 0, "already-queued dependents are left alone");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dependency_view_reports_both_directions(harness: Harness) {
    let upstream = seed(&harness, "upstream", &[]).await;
    let subject = seed(&harness, "subject", &[upstream.id()]).await;
    let downstream = seed(&harness, "downstream", &[subject.id()]).await;

    let view = harness
        .service
        .dependency_view(harness.tenant, subject.id())
        .await
        .expect("view succeeds");

    assert_eq!(view.upstream.len(), 1);
    assert_eq!(view.upstream[0].id, upstream.id());
    assert_eq!(view.downstream.len(), 1);
    assert_eq!(view.downstream[0].id, downstream.id());
}
