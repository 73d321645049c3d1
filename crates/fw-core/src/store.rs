//! The narrow persistence contract the reminder engine reads and writes through.

use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use thiserror::Error;

use crate::baby::FeedingEvent;
use crate::reminder::{ConfigurationUpdate, ReminderConfiguration};
use crate::types::{BabyId, ConfigurationId, Scope, ValidationError};

/// Errors surfaced by a [`ReminderStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend failed (I/O, connection, query).
    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// No configuration with the given ID exists.
    #[error("configuration not found: {0}")]
    NotFound(ConfigurationId),
    /// A batch would create a second configuration for the same baby and scope.
    #[error("configuration already exists for baby {baby_id} scope {scope}")]
    Conflict { baby_id: BabyId, scope: Scope },
    /// A stored or submitted value failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Query contract implemented by the persistence layer.
///
/// Implementations must be safe to call from a blocking worker thread; the
/// scheduler never calls them on the async executor directly.
pub trait ReminderStore: Send + Sync {
    /// All configurations owned by `baby_id`, in scope order.
    fn configurations(&self, baby_id: &BabyId) -> Result<Vec<ReminderConfiguration>, StoreError>;

    /// The latest feeding that counts toward `scope`.
    ///
    /// See [`FeedingEvent::counts_for`] for which feedings count.
    fn most_recent_feeding(
        &self,
        baby_id: &BabyId,
        scope: Scope,
    ) -> Result<Option<FeedingEvent>, StoreError>;

    /// Persists a batch atomically: either every configuration is stored or none.
    fn save_configurations(&self, batch: &[ReminderConfiguration]) -> Result<(), StoreError>;

    /// Applies a partial update and returns the stored result.
    fn update_configuration(
        &self,
        id: &ConfigurationId,
        update: &ConfigurationUpdate,
    ) -> Result<ReminderConfiguration, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    configurations: Vec<ReminderConfiguration>,
    feedings: Vec<FeedingEvent>,
}

/// A [`ReminderStore`] kept entirely in memory.
///
/// Useful for tests and for hosts without durable storage. Batches are
/// checked in full before anything is inserted, so they stay atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a feeding, as the recording subsystem would.
    pub fn record_feeding(&self, event: FeedingEvent) {
        self.lock().feedings.push(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReminderStore for MemoryStore {
    fn configurations(&self, baby_id: &BabyId) -> Result<Vec<ReminderConfiguration>, StoreError> {
        let mut configurations: Vec<_> = self
            .lock()
            .configurations
            .iter()
            .filter(|cfg| &cfg.baby_id == baby_id)
            .cloned()
            .collect();
        configurations.sort_by_key(|cfg| cfg.scope);
        Ok(configurations)
    }

    fn most_recent_feeding(
        &self,
        baby_id: &BabyId,
        scope: Scope,
    ) -> Result<Option<FeedingEvent>, StoreError> {
        Ok(self
            .lock()
            .feedings
            .iter()
            .filter(|event| &event.baby_id == baby_id && event.counts_for(scope))
            .max_by_key(|event| event.occurred_at)
            .cloned())
    }

    fn save_configurations(&self, batch: &[ReminderConfiguration]) -> Result<(), StoreError> {
        let mut state = self.lock();
        for (index, cfg) in batch.iter().enumerate() {
            let clashes = state
                .configurations
                .iter()
                .chain(&batch[..index])
                .any(|existing| existing.baby_id == cfg.baby_id && existing.scope == cfg.scope);
            if clashes {
                return Err(StoreError::Conflict {
                    baby_id: cfg.baby_id.clone(),
                    scope: cfg.scope,
                });
            }
        }
        state.configurations.extend_from_slice(batch);
        Ok(())
    }

    fn update_configuration(
        &self,
        id: &ConfigurationId,
        update: &ConfigurationUpdate,
    ) -> Result<ReminderConfiguration, StoreError> {
        let mut state = self.lock();
        let slot = state
            .configurations
            .iter_mut()
            .find(|cfg| &cfg.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let updated = update.apply(slot, Utc::now())?;
        *slot = updated.clone();
        Ok(updated)
    }
}
