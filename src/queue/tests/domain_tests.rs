//! Unit tests for the queue aggregate.

use crate::queue::domain::{Queue, QueueDomainError, QueueScope, TeamId, UserId};
use crate::task::domain::TenantId;
use eyre::ensure;
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use serde_json::json;

#[fixture]
fn clock() -> DefaultClock {
    DefaultClock
}

#[rstest]
fn new_queue_trims_name_and_defaults_closed_to_bots(clock: DefaultClock) -> eyre::Result<()> {
    let queue = Queue::new(
        TenantId::new(),
        "  triage  ",
        QueueScope::Organization,
        &clock,
    )?;
    ensure!(queue.name() == "triage");
    ensure!(!queue.allow_bots());
    ensure!(!queue.is_system());
    ensure!(queue.purpose().is_none());
    Ok(())
}

#[rstest]
#[case("")]
#[case("  ")]
fn new_queue_rejects_blank_name(clock: DefaultClock, #[case] name: &str) {
    let result = Queue::new(TenantId::new(), name, QueueScope::Organization, &clock);
    assert_eq!(result.err(), Some(QueueDomainError::EmptyName));
}

#[rstest]
fn scope_serializes_as_tagged_union(clock: DefaultClock) -> eyre::Result<()> {
    let team_id = TeamId::new();
    let queue = Queue::new(
        TenantId::new(),
        "team inbox",
        QueueScope::Team { team_id },
        &clock,
    )?;
    let value = serde_json::to_value(queue.scope())?;
    ensure!(value.get("scope") == Some(&json!("team")));
    ensure!(value.get("team_id").is_some());
    Ok(())
}

#[rstest]
fn user_scope_round_trips_through_serde(clock: DefaultClock) -> eyre::Result<()> {
    let user_id = UserId::new();
    let queue = Queue::new(
        TenantId::new(),
        "personal inbox",
        QueueScope::User { user_id },
        &clock,
    )?;
    let text = serde_json::to_string(&queue)?;
    let restored: Queue = serde_json::from_str(&text)?;
    ensure!(restored == queue);
    Ok(())
}

#[rstest]
fn mutators_advance_updated_at(clock: DefaultClock) -> eyre::Result<()> {
    let mut queue = Queue::new(TenantId::new(), "ops", QueueScope::Organization, &clock)?;
    let created = queue.updated_at();

    queue.set_allow_bots(true, &clock);
    queue.set_purpose(Some("automation overflow".to_owned()), &clock);
    queue.mark_system(&clock);

    ensure!(queue.allow_bots());
    ensure!(queue.purpose() == Some("automation overflow"));
    ensure!(queue.is_system());
    ensure!(queue.updated_at() >= created);
    Ok(())
}
