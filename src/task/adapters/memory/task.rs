//! Thread-safe in-memory work-item repository.
//!
//! Implements the conditional-update contract of the repository port: every
//! `update` compares the stored version against the version the caller read
//! and rejects the write on mismatch, which is what makes concurrent claim,
//! heartbeat, and reclaim sweeps race-safe without in-process coordination.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::queue::domain::QueueId;
use crate::task::domain::{Task, TaskId, TaskStatus, TenantId, WorkerId};
use crate::task::ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult};
use chrono::{DateTime, Utc};

/// Thread-safe in-memory task repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    state: Arc<RwLock<InMemoryTaskState>>,
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    tasks: HashMap<TaskId, Task>,
}

impl InMemoryTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(
        &self,
    ) -> TaskRepositoryResult<std::sync::RwLockReadGuard<'_, InMemoryTaskState>> {
        self.state.read().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write_state(
        &self,
    ) -> TaskRepositoryResult<std::sync::RwLockWriteGuard<'_, InMemoryTaskState>> {
        self.state.write().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn collect_sorted(
        state: &InMemoryTaskState,
        mut predicate: impl FnMut(&Task) -> bool,
    ) -> Vec<Task> {
        let mut matches: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| predicate(task))
            .cloned()
            .collect();
        matches.sort_by_key(Task::claim_order_key);
        matches
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn insert(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut state = self.write_state()?;
        if state.tasks.contains_key(&task.id()) {
            return Err(TaskRepositoryError::DuplicateTask(task.id()));
        }
        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn update(&self, task: &Task) -> TaskRepositoryResult<Task> {
        let mut state = self.write_state()?;
        let stored_version = state
            .tasks
            .get(&task.id())
            .map(Task::version)
            .ok_or(TaskRepositoryError::NotFound(task.id()))?;
        if stored_version != task.version() {
            return Err(TaskRepositoryError::VersionConflict {
                task_id: task.id(),
                expected: task.version(),
            });
        }
        let mut committed = task.clone();
        committed.bump_version();
        state.tasks.insert(committed.id(), committed.clone());
        Ok(committed)
    }

    async fn find_by_id(&self, tenant: TenantId, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        let state = self.read_state()?;
        Ok(state
            .tasks
            .get(&id)
            .filter(|task| task.tenant_id() == tenant)
            .cloned())
    }

    async fn find_claimable(&self, tenant: TenantId) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.read_state()?;
        Ok(Self::collect_sorted(&state, |task| {
            task.tenant_id() == tenant && task.status() == TaskStatus::Queued
        }))
    }

    async fn find_stale(
        &self,
        tenant: TenantId,
        cutoff: DateTime<Utc>,
    ) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.read_state()?;
        Ok(Self::collect_sorted(&state, |task| {
            task.tenant_id() == tenant
                && task.status() == TaskStatus::CheckedOut
                && task
                    .checked_out_at()
                    .is_some_and(|leased_at| leased_at < cutoff)
        }))
    }

    async fn find_blocked_depending_on(
        &self,
        tenant: TenantId,
        dependency: TaskId,
    ) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.read_state()?;
        Ok(Self::collect_sorted(&state, |task| {
            task.tenant_id() == tenant
                && task.status() == TaskStatus::Blocked
                && task.depends_on().contains(&dependency)
        }))
    }

    async fn find_dependents(
        &self,
        tenant: TenantId,
        dependency: TaskId,
    ) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.read_state()?;
        Ok(Self::collect_sorted(&state, |task| {
            task.tenant_id() == tenant && task.depends_on().contains(&dependency)
        }))
    }

    async fn find_unrouted(&self, tenant: TenantId) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.read_state()?;
        Ok(Self::collect_sorted(&state, |task| {
            task.tenant_id() == tenant && task.desk_id().is_none()
        }))
    }

    async fn count_leased_by(
        &self,
        tenant: TenantId,
        worker: WorkerId,
    ) -> TaskRepositoryResult<usize> {
        let state = self.read_state()?;
        Ok(state
            .tasks
            .values()
            .filter(|task| {
                task.tenant_id() == tenant
                    && task.status().is_leased()
                    && task.checked_out_by() == Some(worker)
            })
            .count())
    }

    async fn exists_in_queue(
        &self,
        tenant: TenantId,
        queue: QueueId,
    ) -> TaskRepositoryResult<bool> {
        let state = self.read_state()?;
        Ok(state
            .tasks
            .values()
            .any(|task| task.tenant_id() == tenant && task.queue_id() == Some(queue)))
    }
}
