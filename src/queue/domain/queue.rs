//! Queue aggregate root.

use super::{QueueDomainError, QueueId, TeamId, UserId};
use crate::task::domain::TenantId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Target audience of a queue.
///
/// Every queue belongs to exactly one scope target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum QueueScope {
    /// Visible to the whole organisation.
    Organization,
    /// Visible to one team.
    Team {
        /// Owning team.
        team_id: TeamId,
    },
    /// Visible to one user.
    User {
        /// Owning user.
        user_id: UserId,
    },
}

/// Queue aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queue {
    id: QueueId,
    tenant_id: TenantId,
    name: String,
    purpose: Option<String>,
    scope: QueueScope,
    allow_bots: bool,
    system: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedQueueData {
    /// Persisted queue identifier.
    pub id: QueueId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Persisted name.
    pub name: String,
    /// Persisted purpose label.
    pub purpose: Option<String>,
    /// Persisted scope target.
    pub scope: QueueScope,
    /// Whether automated workers may claim from this queue.
    pub allow_bots: bool,
    /// Whether this is a protected system queue.
    pub system: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Queue {
    /// Creates a new queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::EmptyName`] when the name is blank.
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        scope: QueueScope,
        clock: &impl Clock,
    ) -> Result<Self, QueueDomainError> {
        let trimmed = name.into().trim().to_owned();
        if trimmed.is_empty() {
            return Err(QueueDomainError::EmptyName);
        }
        let timestamp = clock.utc();
        Ok(Self {
            id: QueueId::new(),
            tenant_id,
            name: trimmed,
            purpose: None,
            scope,
            allow_bots: false,
            system: false,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Reconstructs a queue from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedQueueData) -> Self {
        Self {
            id: data.id,
            tenant_id: data.tenant_id,
            name: data.name,
            purpose: data.purpose,
            scope: data.scope,
            allow_bots: data.allow_bots,
            system: data.system,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the queue identifier.
    #[must_use]
    pub const fn id(&self) -> QueueId {
        self.id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the purpose label, if set.
    #[must_use]
    pub fn purpose(&self) -> Option<&str> {
        self.purpose.as_deref()
    }

    /// Returns the scope target.
    #[must_use]
    pub const fn scope(&self) -> QueueScope {
        self.scope
    }

    /// Returns whether automated workers may claim from this queue.
    #[must_use]
    pub const fn allow_bots(&self) -> bool {
        self.allow_bots
    }

    /// Returns whether this is a protected system queue.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        self.system
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Sets the purpose label.
    pub fn set_purpose(&mut self, purpose: Option<String>, clock: &impl Clock) {
        self.purpose = purpose;
        self.touch(clock);
    }

    /// Sets whether automated workers may claim from this queue.
    pub fn set_allow_bots(&mut self, allow_bots: bool, clock: &impl Clock) {
        self.allow_bots = allow_bots;
        self.touch(clock);
    }

    /// Marks this queue as a protected system queue.
    pub fn mark_system(&mut self, clock: &impl Clock) {
        self.system = true;
        self.touch(clock);
    }

    /// Updates the `updated_at` timestamp to the current clock time.
    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}
