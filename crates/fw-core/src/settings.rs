//! Settings service consumed by the UI/CLI layers.

use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::baby::BabyProfile;
use crate::defaults;
use crate::reminder::{ConfigurationUpdate, ReminderConfiguration};
use crate::store::{ReminderStore, StoreError};
use crate::types::{BabyId, ConfigurationId, ValidationError};

/// Errors from settings operations.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The update was rejected before reaching the store.
    #[error("invalid setting: {0}")]
    Invalid(#[from] ValidationError),
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reads and edits reminder configurations, caching the last loaded set.
pub struct ReminderSettings {
    store: Arc<dyn ReminderStore>,
    cache: RwLock<Vec<ReminderConfiguration>>,
}

impl ReminderSettings {
    pub fn new(store: Arc<dyn ReminderStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(Vec::new()),
        }
    }

    /// Loads a baby's configurations into the cache.
    pub fn load(&self, baby_id: &BabyId) -> Result<Vec<ReminderConfiguration>, StoreError> {
        let configurations = self.store.configurations(baby_id)?;
        self.replace_cache(configurations.clone());
        Ok(configurations)
    }

    /// Loads a baby's configurations, creating the default set on first access.
    pub fn ensure_defaults(
        &self,
        baby: &BabyProfile,
    ) -> Result<Vec<ReminderConfiguration>, StoreError> {
        let configurations = defaults::ensure_defaults(self.store.as_ref(), &baby.id, baby.is_twins)?;
        self.replace_cache(configurations.clone());
        Ok(configurations)
    }

    /// Validates and persists an update, then refreshes the cached entry.
    pub fn update_setting(
        &self,
        id: &ConfigurationId,
        update: &ConfigurationUpdate,
    ) -> Result<ReminderConfiguration, SettingsError> {
        update.validate()?;
        let updated = self.store.update_configuration(id, update)?;
        tracing::info!(config_id = %id, ?update, "reminder setting updated");

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = cache.iter_mut().find(|cfg| cfg.id == updated.id) {
            *slot = updated.clone();
        }
        Ok(updated)
    }

    /// The configurations from the most recent load.
    pub fn cached(&self) -> Vec<ReminderConfiguration> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_cache(&self, configurations: Vec<ReminderConfiguration>) {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = configurations;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::Interval;
    use crate::store::MemoryStore;
    use crate::types::{ChannelPolicy, Scope};

    fn twins() -> BabyProfile {
        BabyProfile {
            id: BabyId::new("baby-1").unwrap(),
            name: "Mia".to_string(),
            is_twins: true,
        }
    }

    #[test]
    fn update_refreshes_cached_entry() {
        let settings = ReminderSettings::new(Arc::new(MemoryStore::new()));
        let configs = settings.ensure_defaults(&twins()).unwrap();
        let twin_b = configs.iter().find(|c| c.scope == Scope::TwinB).unwrap();

        let update = ConfigurationUpdate {
            interval_hours: Some(2),
            interval_minutes: Some(15),
            channel_policy: Some(ChannelPolicy::Haptic),
            ..ConfigurationUpdate::default()
        };
        settings.update_setting(&twin_b.id, &update).unwrap();

        let cached = settings.cached();
        let cached_b = cached.iter().find(|c| c.id == twin_b.id).unwrap();
        assert_eq!(cached_b.interval, Interval { hours: 2, minutes: 15 });
        assert_eq!(cached_b.channel_policy, ChannelPolicy::Haptic);
        assert_eq!(cached.len(), 3);
    }

    #[test]
    fn negative_interval_is_rejected_before_store() {
        let store = Arc::new(MemoryStore::new());
        let settings = ReminderSettings::new(store.clone());
        let configs = settings.ensure_defaults(&twins()).unwrap();

        let update = ConfigurationUpdate {
            interval_hours: Some(-2),
            ..ConfigurationUpdate::default()
        };
        let err = settings.update_setting(&configs[0].id, &update).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)));

        let stored = store.configurations(&twins().id).unwrap();
        assert_eq!(stored[0].interval_total_minutes(), 180);
    }

    #[test]
    fn load_replaces_cache_for_new_baby() {
        let settings = ReminderSettings::new(Arc::new(MemoryStore::new()));
        settings.ensure_defaults(&twins()).unwrap();
        let other = BabyId::new("baby-2").unwrap();

        assert!(settings.load(&other).unwrap().is_empty());
        assert!(settings.cached().is_empty());
    }
}
