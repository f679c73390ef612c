//! Service tests for atomic claim, heartbeat, and stale-lease recovery.

use crate::queue::adapters::memory::InMemoryQueueRepository;
use crate::queue::domain::{Queue, QueueScope};
use crate::queue::ports::QueueRepository;
use crate::task::adapters::memory::{InMemoryTaskEventSink, InMemoryTaskRepository};
use crate::task::domain::{
    PersistedTaskData, Task, TaskId, TaskPhase, TaskStatus, TenantId, WorkerId, WorkerRef,
};
use crate::task::ports::{TaskEventKind, TaskRepository};
use crate::task::services::{LeaseConfig, LeaseError, LeaseService};
use chrono::{Duration, Utc};
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use std::collections::BTreeSet;
use std::sync::Arc;

type TestLeaseService =
    LeaseService<InMemoryTaskRepository, InMemoryQueueRepository, InMemoryTaskEventSink, DefaultClock>;

struct Harness {
    tasks: Arc<InMemoryTaskRepository>,
    queues: Arc<InMemoryQueueRepository>,
    events: Arc<InMemoryTaskEventSink>,
    lease: TestLeaseService,
    tenant: TenantId,
}

#[fixture]
fn harness() -> Harness {
    let tasks = Arc::new(InMemoryTaskRepository::new());
    let queues = Arc::new(InMemoryQueueRepository::new());
    let events = Arc::new(InMemoryTaskEventSink::new());
    let lease = LeaseService::new(
        Arc::clone(&tasks),
        Arc::clone(&queues),
        Arc::clone(&events),
        Arc::new(DefaultClock),
        LeaseConfig::default(),
    );
    Harness {
        tasks,
        queues,
        events,
        lease,
        tenant: TenantId::new(),
    }
}

async fn seed_task(harness: &Harness, title: &str, priority: i32) -> Task {
    let clock = DefaultClock;
    let mut task = Task::new(harness.tenant, title, &clock).expect("valid title");
    task.set_priority(priority, &clock);
    harness.tasks.insert(&task).await.expect("insert succeeds");
    task
}

/// Reconstructs a checked-out task whose lease is `age` old.
fn leased_task(tenant: TenantId, holder: WorkerId, age: Duration) -> Task {
    let leased_at = Utc::now() - age;
    Task::from_persisted(PersistedTaskData {
        id: TaskId::new(),
        tenant_id: tenant,
        queue_id: None,
        desk_id: None,
        title: "long-running import".to_owned(),
        kind: None,
        tags: Vec::new(),
        customer: None,
        status: TaskStatus::CheckedOut,
        phase: TaskPhase::Planning,
        priority: 0,
        depends_on: BTreeSet::new(),
        assigned_to: None,
        checked_out_by: Some(holder),
        checked_out_at: Some(leased_at),
        retry_count: 0,
        max_retries: 0,
        approval_required: false,
        approval: None,
        output: None,
        failure_reason: None,
        started_at: None,
        completed_at: None,
        failed_at: None,
        created_at: leased_at,
        updated_at: leased_at,
        version: 0,
    })
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn claim_follows_priority_order(harness: Harness) {
    seed_task(&harness, "routine", 5).await;
    seed_task(&harness, "urgent", 1).await;
    seed_task(&harness, "normal", 3).await;
    let worker = WorkerRef::human(WorkerId::new());

    let mut titles = Vec::new();
    while let Some(task) = harness
        .lease
        .claim(harness.tenant, &worker, None)
        .await
        .expect("claim succeeds")
    {
        titles.push(task.title().to_owned());
    }

    assert_eq!(titles, ["urgent", "normal", "routine"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn claim_returns_none_when_pool_is_empty(harness: Harness) {
    let worker = WorkerRef::human(WorkerId::new());
    let claimed = harness
        .lease
        .claim(harness.tenant, &worker, None)
        .await
        .expect("claim succeeds");
    assert!(claimed.is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn claim_skips_tasks_with_unmet_dependencies(harness: Harness) {
    let clock = DefaultClock;
    let upstream = seed_task(&harness, "upstream", 5).await;
    let mut downstream = Task::new(harness.tenant, "downstream", &clock).expect("valid title");
    downstream.set_priority(1, &clock);
    downstream
        .set_dependencies(BTreeSet::from([upstream.id()]), &clock)
        .expect("no self dependency");
    harness
        .tasks
        .insert(&downstream)
        .await
        .expect("insert succeeds");
    let worker = WorkerRef::human(WorkerId::new());

    let claimed = harness
        .lease
        .claim(harness.tenant, &worker, None)
        .await
        .expect("claim succeeds")
        .expect("upstream is eligible");

    assert_eq!(claimed.id(), upstream.id(), "downstream must be skipped");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn bots_claim_only_from_bot_enabled_queues(harness: Harness) {
    let clock = DefaultClock;
    let human_queue = Queue::new(
        harness.tenant,
        "manual review",
        QueueScope::Organization,
        &clock,
    )
    .expect("valid queue");
    let mut bot_queue = Queue::new(
        harness.tenant,
        "bulk imports",
        QueueScope::Organization,
        &clock,
    )
    .expect("valid queue");
    bot_queue.set_allow_bots(true, &clock);
    harness.queues.insert(&human_queue).await.expect("insert succeeds");
    harness.queues.insert(&bot_queue).await.expect("insert succeeds");

    let mut gated = Task::new(harness.tenant, "needs a human", &clock).expect("valid title");
    gated.set_priority(1, &clock);
    gated.set_queue(Some(human_queue.id()), &clock);
    harness.tasks.insert(&gated).await.expect("insert succeeds");

    let mut open = Task::new(harness.tenant, "bulk import", &clock).expect("valid title");
    open.set_priority(5, &clock);
    open.set_queue(Some(bot_queue.id()), &clock);
    harness.tasks.insert(&open).await.expect("insert succeeds");

    let bot = WorkerRef::bot(WorkerId::new());
    let claimed = harness
        .lease
        .claim(harness.tenant, &bot, None)
        .await
        .expect("claim succeeds")
        .expect("bot queue task is eligible");

    assert_eq!(claimed.id(), open.id());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn claim_honours_the_allowed_queue_filter(harness: Harness) {
    let clock = DefaultClock;
    let billing = Queue::new(harness.tenant, "billing", QueueScope::Organization, &clock)
        .expect("valid queue");
    let support = Queue::new(harness.tenant, "support", QueueScope::Organization, &clock)
        .expect("valid queue");
    harness.queues.insert(&billing).await.expect("insert succeeds");
    harness.queues.insert(&support).await.expect("insert succeeds");

    seed_task(&harness, "unrouted", 1).await;
    let mut urgent = Task::new(harness.tenant, "billing escalation", &clock).expect("valid title");
    urgent.set_priority(2, &clock);
    urgent.set_queue(Some(billing.id()), &clock);
    harness.tasks.insert(&urgent).await.expect("insert succeeds");
    let mut other = Task::new(harness.tenant, "support ticket", &clock).expect("valid title");
    other.set_priority(3, &clock);
    other.set_queue(Some(support.id()), &clock);
    harness.tasks.insert(&other).await.expect("insert succeeds");

    let worker = WorkerRef::human(WorkerId::new());
    let claimed = harness
        .lease
        .claim(harness.tenant, &worker, Some(&[support.id()]))
        .await
        .expect("claim succeeds")
        .expect("support task is eligible");

    // Unrouted and billing items are outside the filter, despite priority.
    assert_eq!(claimed.id(), other.id());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn bots_never_claim_unrouted_items(harness: Harness) {
    seed_task(&harness, "unrouted", 1).await;
    let bot = WorkerRef::bot(WorkerId::new());

    let claimed = harness
        .lease
        .claim(harness.tenant, &bot, None)
        .await
        .expect("claim succeeds");

    assert!(claimed.is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn bot_concurrency_limit_yields_backoff_error(harness: Harness) {
    let clock = DefaultClock;
    let mut bot_queue = Queue::new(
        harness.tenant,
        "bulk imports",
        QueueScope::Organization,
        &clock,
    )
    .expect("valid queue");
    bot_queue.set_allow_bots(true, &clock);
    harness.queues.insert(&bot_queue).await.expect("insert succeeds");
    for title in ["first", "second"] {
        let mut task = Task::new(harness.tenant, title, &clock).expect("valid title");
        task.set_queue(Some(bot_queue.id()), &clock);
        harness.tasks.insert(&task).await.expect("insert succeeds");
    }
    let bot = WorkerRef::bot(WorkerId::new());

    harness
        .lease
        .claim(harness.tenant, &bot, None)
        .await
        .expect("claim succeeds")
        .expect("first claim wins a task");
    let second = harness.lease.claim(harness.tenant, &bot, None).await;

    assert!(matches!(
        second,
        Err(LeaseError::ConcurrencyLimitExceeded { held: 1, limit: 1, .. })
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn heartbeat_separates_valid_from_invalid(harness: Harness) {
    let worker = WorkerRef::human(WorkerId::new());
    seed_task(&harness, "mine", 1).await;
    let held = harness
        .lease
        .claim(harness.tenant, &worker, None)
        .await
        .expect("claim succeeds")
        .expect("task available");
    let foreign = leased_task(harness.tenant, WorkerId::new(), Duration::minutes(1));
    harness.tasks.insert(&foreign).await.expect("insert succeeds");
    let unknown = TaskId::new();

    let report = harness
        .lease
        .heartbeat(
            harness.tenant,
            worker.id(),
            &[held.id(), foreign.id(), unknown],
        )
        .await
        .expect("heartbeat succeeds");

    assert_eq!(report.valid, [held.id()]);
    assert_eq!(report.invalid, [foreign.id(), unknown]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn release_requeues_and_records_event(harness: Harness) {
    let worker = WorkerRef::human(WorkerId::new());
    seed_task(&harness, "short-lived", 1).await;
    let held = harness
        .lease
        .claim(harness.tenant, &worker, None)
        .await
        .expect("claim succeeds")
        .expect("task available");

    let released = harness
        .lease
        .release(harness.tenant, worker.id(), held.id())
        .await
        .expect("release succeeds");

    assert_eq!(released.status(), TaskStatus::Queued);
    assert!(released.checked_out_by().is_none());
    let events = harness.events.recorded();
    assert!(events.iter().any(|event| {
        event.task_id() == held.id()
            && matches!(event.kind(), TaskEventKind::Released { .. })
    }));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn release_stale_resets_expired_leases_once(harness: Harness) {
    let stale = leased_task(harness.tenant, WorkerId::new(), Duration::minutes(45));
    let fresh = leased_task(harness.tenant, WorkerId::new(), Duration::minutes(5));
    harness.tasks.insert(&stale).await.expect("insert succeeds");
    harness.tasks.insert(&fresh).await.expect("insert succeeds");

    let first = harness
        .lease
        .release_stale(harness.tenant, Duration::minutes(30))
        .await
        .expect("sweep succeeds");
    assert_eq!(first, 1);

    let reclaimed = harness
        .tasks
        .find_by_id(harness.tenant, stale.id())
        .await
        .expect("lookup succeeds")
        .expect("task exists");
    assert_eq!(reclaimed.status(), TaskStatus::Queued);
    assert!(reclaimed.checked_out_by().is_none());
    assert!(reclaimed.checked_out_at().is_none());

    let untouched = harness
        .tasks
        .find_by_id(harness.tenant, fresh.id())
        .await
        .expect("lookup succeeds")
        .expect("task exists");
    assert_eq!(untouched.status(), TaskStatus::CheckedOut);

    let second = harness
        .lease
        .release_stale(harness.tenant, Duration::minutes(30))
        .await
        .expect("sweep succeeds");
    assert_eq!(second, 0, "already-reclaimed tasks are left alone");
}
