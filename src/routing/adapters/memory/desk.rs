//! Thread-safe in-memory desk repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::routing::domain::{Desk, DeskId};
use crate::routing::ports::{DeskRepository, DeskRepositoryError, DeskRepositoryResult};
use crate::task::domain::TenantId;

/// Thread-safe in-memory desk repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDeskRepository {
    state: Arc<RwLock<HashMap<DeskId, Desk>>>,
}

impl InMemoryDeskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(
        &self,
    ) -> DeskRepositoryResult<std::sync::RwLockReadGuard<'_, HashMap<DeskId, Desk>>> {
        self.state.read().map_err(|err| {
            DeskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write_state(
        &self,
    ) -> DeskRepositoryResult<std::sync::RwLockWriteGuard<'_, HashMap<DeskId, Desk>>> {
        self.state.write().map_err(|err| {
            DeskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

#[async_trait]
impl DeskRepository for InMemoryDeskRepository {
    async fn insert(&self, desk: &Desk) -> DeskRepositoryResult<()> {
        let mut state = self.write_state()?;
        if state.contains_key(&desk.id()) {
            return Err(DeskRepositoryError::DuplicateDesk(desk.id()));
        }
        state.insert(desk.id(), desk.clone());
        Ok(())
    }

    async fn update(&self, desk: &Desk) -> DeskRepositoryResult<()> {
        let mut state = self.write_state()?;
        if !state.contains_key(&desk.id()) {
            return Err(DeskRepositoryError::NotFound(desk.id()));
        }
        state.insert(desk.id(), desk.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        tenant: TenantId,
        id: DeskId,
    ) -> DeskRepositoryResult<Option<Desk>> {
        let state = self.read_state()?;
        Ok(state
            .get(&id)
            .filter(|desk| desk.tenant_id() == tenant)
            .cloned())
    }

    async fn list(&self, tenant: TenantId) -> DeskRepositoryResult<Vec<Desk>> {
        let state = self.read_state()?;
        let mut desks: Vec<Desk> = state
            .values()
            .filter(|desk| desk.tenant_id() == tenant)
            .cloned()
            .collect();
        // Evaluation order: priority descending, id ascending.
        desks.sort_by_key(|desk| (std::cmp::Reverse(desk.priority()), desk.id()));
        Ok(desks)
    }
}
