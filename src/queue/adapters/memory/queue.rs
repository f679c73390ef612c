//! Thread-safe in-memory queue repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::queue::domain::{Queue, QueueId};
use crate::queue::ports::{QueueRepository, QueueRepositoryError, QueueRepositoryResult};
use crate::task::domain::TenantId;

/// Thread-safe in-memory queue repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueueRepository {
    state: Arc<RwLock<HashMap<QueueId, Queue>>>,
}

impl InMemoryQueueRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(
        &self,
    ) -> QueueRepositoryResult<std::sync::RwLockReadGuard<'_, HashMap<QueueId, Queue>>> {
        self.state.read().map_err(|err| {
            QueueRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write_state(
        &self,
    ) -> QueueRepositoryResult<std::sync::RwLockWriteGuard<'_, HashMap<QueueId, Queue>>> {
        self.state.write().map_err(|err| {
            QueueRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

#[async_trait]
impl QueueRepository for InMemoryQueueRepository {
    async fn insert(&self, queue: &Queue) -> QueueRepositoryResult<()> {
        let mut state = self.write_state()?;
        if state.contains_key(&queue.id()) {
            return Err(QueueRepositoryError::DuplicateQueue(queue.id()));
        }
        state.insert(queue.id(), queue.clone());
        Ok(())
    }

    async fn update(&self, queue: &Queue) -> QueueRepositoryResult<()> {
        let mut state = self.write_state()?;
        if !state.contains_key(&queue.id()) {
            return Err(QueueRepositoryError::NotFound(queue.id()));
        }
        state.insert(queue.id(), queue.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        tenant: TenantId,
        id: QueueId,
    ) -> QueueRepositoryResult<Option<Queue>> {
        let state = self.read_state()?;
        Ok(state
            .get(&id)
            .filter(|queue| queue.tenant_id() == tenant)
            .cloned())
    }

    async fn list(&self, tenant: TenantId) -> QueueRepositoryResult<Vec<Queue>> {
        let state = self.read_state()?;
        let mut queues: Vec<Queue> = state
            .values()
            .filter(|queue| queue.tenant_id() == tenant)
            .cloned()
            .collect();
        queues.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(queues)
    }

    async fn delete(&self, tenant: TenantId, id: QueueId) -> QueueRepositoryResult<()> {
        let mut state = self.write_state()?;
        let belongs = state
            .get(&id)
            .is_some_and(|queue| queue.tenant_id() == tenant);
        if !belongs {
            return Err(QueueRepositoryError::NotFound(id));
        }
        state.remove(&id);
        Ok(())
    }
}
