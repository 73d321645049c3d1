//! Canonical reminder configurations for babies that have none yet.

use chrono::Utc;

use crate::reminder::ReminderConfiguration;
use crate::store::{ReminderStore, StoreError};
use crate::types::{BabyId, Scope};

/// Builds the canonical configuration set without persisting it.
///
/// One `Unified` configuration, plus `TwinA` and `TwinB` for twins.
pub fn default_configurations(baby_id: &BabyId, is_twins: bool) -> Vec<ReminderConfiguration> {
    let now = Utc::now();
    let scopes: &[Scope] = if is_twins { &Scope::ALL } else { &[Scope::Unified] };
    scopes
        .iter()
        .map(|scope| ReminderConfiguration::with_defaults(baby_id.clone(), *scope, now))
        .collect()
}

/// Returns the baby's configurations, creating the canonical set if none exist.
///
/// Existing configurations are returned untouched with no writes. The
/// default set is saved as one atomic batch. If another writer creates the
/// set between our read and our write, the store reports a conflict and
/// the winner's set is returned instead.
pub fn ensure_defaults(
    store: &dyn ReminderStore,
    baby_id: &BabyId,
    is_twins: bool,
) -> Result<Vec<ReminderConfiguration>, StoreError> {
    let existing = store.configurations(baby_id)?;
    if !existing.is_empty() {
        return Ok(existing);
    }

    let batch = default_configurations(baby_id, is_twins);
    match store.save_configurations(&batch) {
        Ok(()) => {
            tracing::info!(baby_id = %baby_id, count = batch.len(), "created default reminder settings");
            Ok(batch)
        }
        Err(StoreError::Conflict { .. }) => {
            tracing::debug!(baby_id = %baby_id, "default settings created concurrently, re-reading");
            store.configurations(baby_id)
        }
        Err(err) => Err(err),
    }
}
