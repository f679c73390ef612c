//! Service tests for trigger-driven automation and rollout gating.

use crate::routing::adapters::memory::{
    InMemoryAutomationAuditSink, InMemoryDeskRepository, InMemoryRuleRepository,
};
use crate::routing::domain::{
    AutomationAction, AutomationRule, AutomationTrigger, Condition, ConditionField,
    ConditionOperator, Desk, RolloutStage, rollout_bucket,
};
use crate::routing::ports::{AutomationRuleRepository, DeskRepository, RuleDisposition};
use crate::routing::services::AutomationService;
use crate::task::adapters::memory::InMemoryTaskRepository;
use crate::task::domain::{Task, TenantId};
use crate::task::ports::TaskRepository;
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use serde_json::json;
use std::sync::Arc;

type TestAutomationService = AutomationService<
    InMemoryRuleRepository,
    InMemoryDeskRepository,
    InMemoryTaskRepository,
    InMemoryAutomationAuditSink,
    DefaultClock,
>;

struct Harness {
    rules: Arc<InMemoryRuleRepository>,
    desks: Arc<InMemoryDeskRepository>,
    tasks: Arc<InMemoryTaskRepository>,
    audit: Arc<InMemoryAutomationAuditSink>,
    service: TestAutomationService,
    tenant: TenantId,
}

#[fixture]
fn harness() -> Harness {
    let rules = Arc::new(InMemoryRuleRepository::new());
    let desks = Arc::new(InMemoryDeskRepository::new());
    let tasks = Arc::new(InMemoryTaskRepository::new());
    let audit = Arc::new(InMemoryAutomationAuditSink::new());
    let service = AutomationService::new(
        Arc::clone(&rules),
        Arc::clone(&desks),
        Arc::clone(&tasks),
        Arc::clone(&audit),
        Arc::new(DefaultClock),
    );
    Harness {
        rules,
        desks,
        tasks,
        audit,
        service,
        tenant: TenantId::new(),
    }
}

async fn seed_rule(harness: &Harness, rollout: RolloutStage) -> AutomationRule {
    let clock = DefaultClock;
    let mut rule = AutomationRule::new(
        harness.tenant,
        "tag refunds",
        AutomationTrigger::TaskCreated,
        vec![Condition::new(
            ConditionField::Kind,
            ConditionOperator::Equals,
            json!("refund"),
        )],
        AutomationAction::AddTag("needs-finance".to_owned()),
        &clock,
    )
    .expect("valid rule");
    rule.set_rollout(rollout, &clock);
    harness.rules.insert(&rule).await.expect("insert succeeds");
    rule
}

async fn seed_refund_task(harness: &Harness, title: &str) -> Task {
    let clock = DefaultClock;
    let mut task = Task::new(harness.tenant, title, &clock).expect("valid title");
    task.set_kind(Some("refund".to_owned()), &clock);
    harness.tasks.insert(&task).await.expect("insert succeeds");
    task
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shadow_rule_records_every_match_and_executes_nothing(harness: Harness) {
    seed_rule(&harness, RolloutStage::Shadow).await;
    let mut seeded = Vec::new();
    for index in 0..100 {
        seeded.push(seed_refund_task(&harness, &format!("refund {index}")).await);
    }

    for task in &seeded {
        let outcome = harness
            .service
            .fire(harness.tenant, AutomationTrigger::TaskCreated, task.id())
            .await
            .expect("trigger fires");
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.executed, 0);
    }

    let evaluations = harness.audit.recorded();
    assert_eq!(evaluations.len(), 100);
    assert!(
        evaluations
            .iter()
            .all(|evaluation| *evaluation.disposition() == RuleDisposition::Shadowed)
    );
    // Zero observable side effects beyond the audit record.
    for task in &seeded {
        let stored = harness
            .tasks
            .find_by_id(harness.tenant, task.id())
            .await
            .expect("lookup succeeds")
            .expect("task exists");
        assert_eq!(&stored, task, "shadow mode must not mutate the item");
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn full_rule_executes_its_action(harness: Harness) {
    seed_rule(&harness, RolloutStage::Full).await;
    let task = seed_refund_task(&harness, "refund").await;

    // Fired through a per-worker handle sharing the fixture's stores.
    let handle = harness.service.clone();
    let outcome = handle
        .fire(harness.tenant, AutomationTrigger::TaskCreated, task.id())
        .await
        .expect("trigger fires");

    assert_eq!(outcome.matched, 1);
    assert_eq!(outcome.executed, 1);
    let stored = harness
        .tasks
        .find_by_id(harness.tenant, task.id())
        .await
        .expect("lookup succeeds")
        .expect("task exists");
    assert!(stored.tags().contains(&"needs-finance".to_owned()));
    let evaluations = harness.audit.recorded();
    assert_eq!(evaluations.len(), 1);
    assert_eq!(*evaluations[0].disposition(), RuleDisposition::Executed);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn partial_rule_executes_only_in_bucket(harness: Harness) {
    let stage = RolloutStage::partial(40).expect("valid percentage");
    let rule = seed_rule(&harness, stage).await;

    let mut executed = 0;
    let mut skipped = 0;
    for index in 0..50 {
        let task = seed_refund_task(&harness, &format!("refund {index}")).await;
        let outcome = harness
            .service
            .fire(harness.tenant, AutomationTrigger::TaskCreated, task.id())
            .await
            .expect("trigger fires");
        let in_bucket = rollout_bucket(rule.id(), task.id()) < 40;
        assert_eq!(outcome.executed, usize::from(in_bucket));

        let stored = harness
            .tasks
            .find_by_id(harness.tenant, task.id())
            .await
            .expect("lookup succeeds")
            .expect("task exists");
        assert_eq!(
            stored.tags().contains(&"needs-finance".to_owned()),
            in_bucket
        );
        if in_bucket {
            executed += 1;
        } else {
            skipped += 1;
        }
    }

    let evaluations = harness.audit.recorded();
    assert_eq!(evaluations.len(), executed + skipped, "every match is recorded");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rules_for_other_triggers_are_ignored(harness: Harness) {
    seed_rule(&harness, RolloutStage::Full).await;
    let task = seed_refund_task(&harness, "refund").await;

    let outcome = harness
        .service
        .fire(harness.tenant, AutomationTrigger::TaskCompleted, task.id())
        .await
        .expect("trigger fires");

    assert_eq!(outcome.matched, 0);
    assert!(harness.audit.recorded().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn assign_desk_action_routes_the_item(harness: Harness) {
    let clock = DefaultClock;
    let desk = Desk::new(harness.tenant, "finance desk", &clock).expect("valid desk");
    harness.desks.insert(&desk).await.expect("insert succeeds");
    let mut rule = AutomationRule::new(
        harness.tenant,
        "route refunds",
        AutomationTrigger::TaskCreated,
        Vec::new(),
        AutomationAction::AssignDesk(desk.id()),
        &clock,
    )
    .expect("valid rule");
    rule.set_rollout(RolloutStage::Full, &clock);
    harness.rules.insert(&rule).await.expect("insert succeeds");
    let task = seed_refund_task(&harness, "refund").await;

    harness
        .service
        .fire(harness.tenant, AutomationTrigger::TaskCreated, task.id())
        .await
        .expect("trigger fires");

    let stored = harness
        .tasks
        .find_by_id(harness.tenant, task.id())
        .await
        .expect("lookup succeeds")
        .expect("task exists");
    assert_eq!(stored.desk_id(), Some(desk.id()));
}
